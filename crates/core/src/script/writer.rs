//! Per-product script generation with throttling and template fallback.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::metrics::SCRIPT_GENERATIONS;
use crate::session::{AIScript, LiveProduct, LiveSessionStore, SessionError};

use super::{render_fallback, render_script, ScriptConfig, TextGenerator};

/// Outcome of a script generation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptReport {
    /// Scripts produced by the generator.
    pub generated: usize,
    /// Scripts filled from the template.
    pub fallback: usize,
}

/// Writes one narration script per product.
pub struct ScriptWriter {
    generator: Option<Arc<dyn TextGenerator>>,
    config: ScriptConfig,
}

impl ScriptWriter {
    pub fn new(config: ScriptConfig, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator, config }
    }

    /// Produce scripts in product order. Never returns an empty script.
    pub async fn write(&self, products: &[LiveProduct]) -> (Vec<AIScript>, ScriptReport) {
        let mut scripts = Vec::with_capacity(products.len());
        let mut report = ScriptReport::default();
        let delay = Duration::from_millis(self.config.inter_call_delay_ms);

        for (idx, product) in products.iter().enumerate() {
            let generated = match &self.generator {
                Some(generator) => {
                    if idx > 0 && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let prompt = render_fallback(&self.config.prompt, Some(product));
                    match generator.generate(&prompt).await {
                        Ok(text) if !text.trim().is_empty() => Some(text),
                        Ok(_) => {
                            warn!("Generator {} returned empty text for {}", generator.name(), product.sku);
                            None
                        }
                        Err(e) => {
                            warn!("Script generation failed for {}: {}", product.sku, e);
                            None
                        }
                    }
                }
                None => None,
            };

            let content = match generated {
                Some(text) => {
                    report.generated += 1;
                    SCRIPT_GENERATIONS.with_label_values(&["generator"]).inc();
                    text
                }
                None => {
                    report.fallback += 1;
                    SCRIPT_GENERATIONS.with_label_values(&["fallback"]).inc();
                    render_script(&self.config.template, Some(product))
                }
            };

            scripts.push(AIScript {
                id: uuid::Uuid::new_v4().to_string(),
                content,
                related_product_id: product.sku.clone(),
            });
            debug!("Script {}/{} ready", idx + 1, products.len());
        }

        (scripts, report)
    }

    /// Generate scripts for the active session's products and store them on
    /// that session, even if another one is activated meanwhile.
    pub async fn generate_for_active(
        &self,
        store: &LiveSessionStore,
    ) -> Result<ScriptReport, SessionError> {
        let session = store
            .active_session()
            .await
            .ok_or(SessionError::NoActiveSession)?;

        info!(
            "Generating scripts for {} products in session {}",
            session.products.len(),
            session.id
        );
        let (scripts, report) = self.write(&session.products).await;
        store.set_scripts(&session.id, scripts).await?;
        info!(
            "Scripts ready: {} generated, {} from template",
            report.generated, report.fallback
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BroadcastBus;
    use crate::session::LiveSession;
    use crate::testing::{fixtures, MockTextGenerator};

    fn config() -> ScriptConfig {
        ScriptConfig {
            inter_call_delay_ms: 0,
            template: "Template for {title}".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_without_generator_uses_template() {
        let writer = ScriptWriter::new(config(), None);
        let products = vec![fixtures::product("1"), fixtures::product("2")];

        let (scripts, report) = writer.write(&products).await;
        assert_eq!(scripts.len(), 2);
        assert_eq!(report.fallback, 2);
        assert_eq!(scripts[1].content, "Template for Product 2");
        assert_eq!(scripts[1].related_product_id, "2");
    }

    #[tokio::test]
    async fn test_generator_failure_falls_back() {
        let generator = Arc::new(MockTextGenerator::new());
        generator.push_response(Ok("Great kettle".to_string()));
        generator.push_response(Err(crate::script::TextGenError::Empty));
        let writer = ScriptWriter::new(config(), Some(generator.clone()));

        let products = vec![fixtures::product("1"), fixtures::product("2")];
        let (scripts, report) = writer.write(&products).await;

        assert_eq!(report.generated, 1);
        assert_eq!(report.fallback, 1);
        assert_eq!(scripts[0].content, "Great kettle");
        assert_eq!(scripts[1].content, "Template for Product 2");
        assert_eq!(generator.prompts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_calls_are_throttled() {
        let generator = Arc::new(MockTextGenerator::new());
        let writer = ScriptWriter::new(
            ScriptConfig {
                inter_call_delay_ms: 1000,
                ..config()
            },
            Some(generator.clone()),
        );
        let products = vec![
            fixtures::product("1"),
            fixtures::product("2"),
            fixtures::product("3"),
        ];

        let started = tokio::time::Instant::now();
        writer.write(&products).await;
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_generate_for_active_stores_scripts() {
        let store = LiveSessionStore::new(5, Arc::new(BroadcastBus::default()));
        store
            .create_session(LiveSession::new("live-1", "Show", "acct", None))
            .await;
        store
            .append_products("live-1", vec![fixtures::product("1")])
            .await
            .unwrap();

        let writer = ScriptWriter::new(config(), None);
        let report = writer.generate_for_active(&store).await.unwrap();
        assert_eq!(report.fallback, 1);

        let session = store.active_session().await.unwrap();
        assert_eq!(session.scripts.len(), 1);
        assert!(!session.scripts[0].content.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripts_land_on_session_they_were_written_for() {
        let store = LiveSessionStore::new(5, Arc::new(BroadcastBus::default()));
        store
            .create_session(LiveSession::new("a", "Show A", "acct", None))
            .await;
        store
            .append_products("a", vec![fixtures::product("1"), fixtures::product("2")])
            .await
            .unwrap();

        let writer = Arc::new(ScriptWriter::new(
            ScriptConfig {
                inter_call_delay_ms: 1000,
                ..config()
            },
            Some(Arc::new(MockTextGenerator::new())),
        ));
        let task = {
            let writer = Arc::clone(&writer);
            let store = store.clone();
            tokio::spawn(async move { writer.generate_for_active(&store).await })
        };

        // Switch sessions while the writer waits between generator calls
        tokio::time::sleep(Duration::from_millis(500)).await;
        store
            .create_session(LiveSession::new("b", "Show B", "acct", None))
            .await;

        task.await.unwrap().unwrap();
        assert_eq!(store.get("a").await.unwrap().scripts.len(), 2);
        assert!(store.get("b").await.unwrap().scripts.is_empty());
        assert_eq!(store.active_id().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_blank_template_falls_back_to_default() {
        let writer = ScriptWriter::new(
            ScriptConfig {
                template: String::new(),
                ..config()
            },
            None,
        );
        let (scripts, _) = writer.write(&[fixtures::product("1")]).await;
        assert!(scripts[0].content.contains("Product 1"));
    }
}
