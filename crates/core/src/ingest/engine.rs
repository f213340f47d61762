//! Batch ingestion: product files in, cart-added products out.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::ProductFile;
use crate::gateway::{CommerceGateway, GatewayError, ProductDetail};
use crate::metrics::{INGEST_FAILURES, INGEST_INVALID_IDS, INGEST_PRODUCTS_ADDED, INGEST_RUNS};
use crate::session::{LiveProduct, LiveSessionStore};

use super::{FileReport, IngestConfig, IngestError, IngestFailure, IngestStage, IngestionReport};

/// Turns ordered product files into products in the active session's cart.
///
/// Files are processed in order and every backend call is awaited before
/// the next one is issued, so per-file counters are deterministic. A failed
/// lookup or cart add is retried per [`super::RetryPolicy`] and then
/// skipped; it never aborts the run.
///
/// The run is bound to the session active when it starts. Products are
/// appended to that session even if another one is activated meanwhile; if
/// it is deleted, the run stops and returns what it has.
pub struct BatchIngestionEngine {
    gateway: Arc<dyn CommerceGateway>,
    store: LiveSessionStore,
    config: IngestConfig,
}

impl BatchIngestionEngine {
    pub fn new(
        gateway: Arc<dyn CommerceGateway>,
        store: LiveSessionStore,
        config: IngestConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            config,
        }
    }

    /// Ingest up to `target` products from `files` into the active session.
    pub async fn ingest(
        &self,
        files: &[ProductFile],
        target: usize,
    ) -> Result<IngestionReport, IngestError> {
        let session_id = self
            .store
            .active_id()
            .await
            .ok_or(IngestError::NoActiveSession)?;

        info!(
            "Ingesting up to {} products from {} files into session {}",
            target,
            files.len(),
            session_id
        );

        let mut report = IngestionReport {
            session_id: session_id.clone(),
            target,
            ..Default::default()
        };

        for file in files {
            let (file_report, flow) = self
                .ingest_file(&session_id, file, target, &mut report)
                .await;
            info!(
                "File {}: {} added, {} invalid ({} of {} ids fetched)",
                file_report.file_name,
                file_report.success,
                file_report.invalid,
                file_report.fetched,
                file_report.selected
            );
            report.files.push(file_report);
            if flow.is_break() {
                warn!(
                    "Session {} no longer exists, stopping ingestion",
                    session_id
                );
                break;
            }
        }

        report.partial = report.success < target;
        if report.partial {
            warn!(
                "Ingestion for session {} reached {}/{} products after exhausting all files",
                session_id, report.success, target
            );
            INGEST_RUNS.with_label_values(&["partial"]).inc();
        } else {
            info!(
                "Ingestion for session {} complete: {}/{} products",
                session_id, report.success, target
            );
            INGEST_RUNS.with_label_values(&["complete"]).inc();
        }

        Ok(report)
    }

    async fn ingest_file(
        &self,
        live_id: &str,
        file: &ProductFile,
        target: usize,
        report: &mut IngestionReport,
    ) -> (FileReport, ControlFlow<()>) {
        let ids = file.selected_ids();
        let mut file_report = FileReport {
            file_id: file.id.clone(),
            file_name: file.name.clone(),
            selected: ids.len(),
            ..Default::default()
        };
        let mut cursor = 0;

        while report.success < target && cursor < ids.len() {
            let remaining = target - report.success;
            let available = ids.len() - cursor;
            let margin = if file_report.invalid > 0 {
                self.config.overfetch_margin
            } else {
                0
            };
            let chunk_size = (remaining + margin)
                .min(available)
                .min(self.config.max_fetch_size.max(1));
            let chunk = &ids[cursor..cursor + chunk_size];
            cursor += chunk_size;
            file_report.fetched += chunk_size;

            debug!(
                "{}: fetching details for {} ids ({} remaining to target)",
                file.name, chunk_size, remaining
            );

            let details = match self
                .with_retry(IngestStage::FetchDetails, || {
                    self.gateway.fetch_details(live_id, chunk)
                })
                .await
            {
                Ok(details) => details,
                Err((error, attempts)) => {
                    warn!(
                        "{}: skipping {} ids after failed detail lookup: {}",
                        file.name, chunk_size, error
                    );
                    report.failures.push(IngestFailure {
                        file_name: file.name.clone(),
                        stage: IngestStage::FetchDetails,
                        product_ids: chunk.to_vec(),
                        attempts,
                        message: error.to_string(),
                    });
                    continue;
                }
            };

            let invalid = chunk_size.saturating_sub(details.len());
            if invalid > 0 {
                debug!("{}: {} invalid ids in chunk", file.name, invalid);
                file_report.invalid += invalid;
                INGEST_INVALID_IDS.inc_by(invalid as u64);
            }
            if details.is_empty() {
                continue;
            }

            let flow = self
                .add_details(live_id, file, &details, target, report, &mut file_report)
                .await;
            if flow.is_break() {
                return (file_report, flow);
            }
        }

        (file_report, ControlFlow::Continue(()))
    }

    /// Add validated details in sub-batches until they run out or the target
    /// is reached. Breaks when the session to append to is gone.
    async fn add_details(
        &self,
        live_id: &str,
        file: &ProductFile,
        details: &[ProductDetail],
        target: usize,
        report: &mut IngestionReport,
        file_report: &mut FileReport,
    ) -> ControlFlow<()> {
        let mut offset = 0;

        while offset < details.len() && report.success < target {
            let remaining = target - report.success;
            let batch_size = remaining
                .min(self.config.max_batch_size.max(1))
                .min(details.len() - offset);
            let batch = &details[offset..offset + batch_size];
            offset += batch_size;

            let outcome = match self
                .with_retry(IngestStage::AddToCart, || {
                    self.gateway.add_to_cart(live_id, batch)
                })
                .await
            {
                Ok(outcome) => outcome,
                Err((error, attempts)) => {
                    warn!(
                        "{}: skipping batch of {} after failed cart add: {}",
                        file.name, batch_size, error
                    );
                    report.failures.push(IngestFailure {
                        file_name: file.name.clone(),
                        stage: IngestStage::AddToCart,
                        product_ids: batch.iter().map(|d| d.sku.clone()).collect(),
                        attempts,
                        message: error.to_string(),
                    });
                    continue;
                }
            };

            let added = outcome.success_count.min(batch_size).min(remaining);
            if added < batch_size {
                warn!(
                    "{}: only {}/{} products added to cart{}",
                    file.name,
                    added,
                    batch_size,
                    outcome
                        .error_message
                        .as_deref()
                        .map(|m| format!(": {}", m))
                        .unwrap_or_default()
                );
            }
            if added == 0 {
                continue;
            }

            let products: Vec<LiveProduct> = batch[..added]
                .iter()
                .cloned()
                .map(LiveProduct::from)
                .collect();
            if let Err(e) = self.store.append_products(live_id, products).await {
                warn!(
                    "{}: {} cart-added products could not be recorded: {}",
                    file.name, added, e
                );
                INGEST_FAILURES
                    .with_label_values(&[IngestStage::AppendToSession.as_str()])
                    .inc();
                report.failures.push(IngestFailure {
                    file_name: file.name.clone(),
                    stage: IngestStage::AppendToSession,
                    product_ids: batch[..added].iter().map(|d| d.sku.clone()).collect(),
                    attempts: 1,
                    message: e.to_string(),
                });
                return ControlFlow::Break(());
            }

            file_report.success += added;
            report.success += added;
            INGEST_PRODUCTS_ADDED.inc_by(added as u64);
        }

        ControlFlow::Continue(())
    }

    /// Run `op` under the configured retry policy. On final failure returns
    /// the last error and the number of attempts made.
    async fn with_retry<T, F, Fut>(
        &self,
        stage: IngestStage,
        mut op: F,
    ) -> Result<T, (GatewayError, u32)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        stage.as_str(),
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    INGEST_FAILURES.with_label_values(&[stage.as_str()]).inc();
                    return Err((e, attempt));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Quota;
    use crate::events::BroadcastBus;
    use crate::gateway::GatewayError;
    use crate::ingest::RetryPolicy;
    use crate::session::LiveSession;
    use crate::testing::{fixtures, MockGateway};

    async fn setup(gateway: Arc<MockGateway>, config: IngestConfig) -> (BatchIngestionEngine, LiveSessionStore) {
        let store = LiveSessionStore::new(5, Arc::new(BroadcastBus::default()));
        store
            .create_session(LiveSession::new("live-1", "Show", "acct", None))
            .await;
        let engine = BatchIngestionEngine::new(gateway, store.clone(), config);
        (engine, store)
    }

    #[tokio::test]
    async fn test_two_files_with_quotas_stop_at_target() {
        let gateway = Arc::new(MockGateway::new());
        gateway.mark_invalid(&["1003"]).await;
        let (engine, store) = setup(gateway.clone(), IngestConfig::default()).await;

        let files = vec![
            fixtures::product_file("a.csv", &["1001", "1002", "1003", "1004", "1005"], Quota::Limit(5)),
            fixtures::product_file("b.csv", &["2001", "2002", "2003", "2004", "2005"], Quota::Limit(5)),
        ];

        let report = engine.ingest(&files, 8).await.unwrap();

        assert_eq!(report.success, 8);
        assert!(!report.partial);
        assert_eq!(report.files[0].success, 4);
        assert_eq!(report.files[0].invalid, 1);
        assert_eq!(report.files[1].success, 4);
        assert_eq!(report.files[1].invalid, 0);
        assert_eq!(report.files[1].fetched, 4);

        let fetched: Vec<String> = gateway.fetch_calls().await.concat();
        assert!(!fetched.contains(&"2005".to_string()));

        let session = store.active_session().await.unwrap();
        assert_eq!(session.products.len(), 8);
        assert_eq!(session.products[4].sku, "2001");
    }

    #[tokio::test]
    async fn test_quota_limits_ids_taken_from_file() {
        let gateway = Arc::new(MockGateway::new());
        let (engine, _store) = setup(gateway.clone(), IngestConfig::default()).await;

        let files = vec![fixtures::product_file("a.csv", &["1", "2", "3", "4"], Quota::Limit(2))];
        let report = engine.ingest(&files, 10).await.unwrap();

        assert_eq!(report.success, 2);
        assert!(report.partial);
        assert_eq!(report.files[0].selected, 2);
    }

    #[tokio::test]
    async fn test_overfetch_after_invalid_ids() {
        let gateway = Arc::new(MockGateway::new());
        let ids: Vec<String> = (1000..1060).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        gateway.mark_invalid(&refs[..5]).await;
        let (engine, _store) = setup(gateway.clone(), IngestConfig::default()).await;

        let files = vec![fixtures::product_file("a.csv", &refs, Quota::All)];
        let report = engine.ingest(&files, 10).await.unwrap();

        let calls = gateway.fetch_calls().await;
        // 10 requested, 5 invalid; next chunk asks for 5 remaining + 20 margin.
        assert_eq!(calls[0].len(), 10);
        assert_eq!(calls[1].len(), 25);
        assert_eq!(report.success, 10);
        assert_eq!(report.files[0].invalid, 5);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_chunk() {
        let gateway = Arc::new(MockGateway::new());
        gateway
            .push_fetch_error(GatewayError::Decode("bad body".into()))
            .await;
        let config = IngestConfig {
            max_fetch_size: 2,
            ..IngestConfig::default()
        };
        let (engine, store) = setup(gateway.clone(), config).await;

        let files = vec![fixtures::product_file("a.csv", &["1", "2", "3", "4"], Quota::All)];
        let report = engine.ingest(&files, 4).await.unwrap();

        assert_eq!(report.success, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, IngestStage::FetchDetails);
        assert_eq!(report.failures[0].product_ids, vec!["1", "2"]);
        assert_eq!(report.failures[0].attempts, 1);
        assert_eq!(store.active_session().await.unwrap().products.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_retries_cart_add() {
        let gateway = Arc::new(MockGateway::new());
        gateway
            .push_cart_error(GatewayError::Timeout(std::time::Duration::from_secs(1)))
            .await;
        let config = IngestConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                backoff_ms: 10,
            },
            ..IngestConfig::default()
        };
        let (engine, _store) = setup(gateway.clone(), config).await;

        let files = vec![fixtures::product_file("a.csv", &["1", "2"], Quota::All)];
        let report = engine.ingest(&files, 2).await.unwrap();

        assert_eq!(report.success, 2);
        assert!(report.failures.is_empty());
        assert_eq!(gateway.cart_calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_partial_cart_add_appends_prefix() {
        let gateway = Arc::new(MockGateway::new());
        gateway.set_cart_limit(Some(1)).await;
        let (engine, store) = setup(gateway.clone(), IngestConfig::default()).await;

        let files = vec![fixtures::product_file("a.csv", &["1", "2", "3"], Quota::All)];
        let report = engine.ingest(&files, 3).await.unwrap();

        assert_eq!(report.success, 1);
        let session = store.active_session().await.unwrap();
        assert_eq!(session.products.len(), 1);
        assert_eq!(session.products[0].sku, "1");
    }

    #[tokio::test]
    async fn test_batches_respect_max_batch_size() {
        let gateway = Arc::new(MockGateway::new());
        let config = IngestConfig {
            max_batch_size: 2,
            ..IngestConfig::default()
        };
        let (engine, _store) = setup(gateway.clone(), config).await;

        let files = vec![fixtures::product_file("a.csv", &["1", "2", "3", "4", "5"], Quota::All)];
        let report = engine.ingest(&files, 5).await.unwrap();

        let sizes: Vec<usize> = gateway.cart_calls().await.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(report.success, 5);
    }

    #[tokio::test]
    async fn test_zero_target_fetches_nothing() {
        let gateway = Arc::new(MockGateway::new());
        let (engine, _store) = setup(gateway.clone(), IngestConfig::default()).await;

        let files = vec![fixtures::product_file("a.csv", &["1"], Quota::All)];
        let report = engine.ingest(&files, 0).await.unwrap();

        assert_eq!(report.success, 0);
        assert!(gateway.fetch_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_products_stay_with_session_ingestion_started_on() {
        let gateway = Arc::new(MockGateway::new());
        let (engine, store) = setup(gateway.clone(), IngestConfig::default()).await;
        store
            .create_session(LiveSession::new("other", "Other", "acct", None))
            .await;
        store.activate("live-1").await.unwrap();

        let switcher = store.clone();
        gateway
            .on_cart_add(move || {
                let store = switcher.clone();
                async move {
                    let _ = store.activate("other").await;
                }
            })
            .await;

        let files = vec![fixtures::product_file("a.csv", &["1", "2"], Quota::All)];
        let report = engine.ingest(&files, 2).await.unwrap();

        assert_eq!(report.session_id, "live-1");
        assert_eq!(report.success, 2);
        assert_eq!(store.get("live-1").await.unwrap().products.len(), 2);
        assert!(store.get("other").await.unwrap().products.is_empty());
        assert_eq!(store.active_id().await.as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn test_deleted_session_stops_run_with_report() {
        let gateway = Arc::new(MockGateway::new());
        let config = IngestConfig {
            max_batch_size: 2,
            ..IngestConfig::default()
        };
        let (engine, store) = setup(gateway.clone(), config).await;

        let deleter = store.clone();
        gateway
            .on_cart_add(move || {
                let store = deleter.clone();
                async move {
                    let _ = store.delete("live-1").await;
                }
            })
            .await;

        let files = vec![
            fixtures::product_file("a.csv", &["1", "2", "3", "4"], Quota::All),
            fixtures::product_file("b.csv", &["5", "6"], Quota::All),
        ];
        let report = engine.ingest(&files, 6).await.unwrap();

        assert_eq!(report.success, 0);
        assert!(report.partial);
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, IngestStage::AppendToSession);
        assert_eq!(report.failures[0].product_ids, vec!["1", "2"]);
        // Nothing more is sent to the cart once the session is gone
        assert_eq!(gateway.cart_calls().await.len(), 1);
    }

    /// One row of scripted backend outcomes.
    struct Case {
        name: &'static str,
        invalid: &'static [&'static str],
        fetch_failures: &'static [bool],
        cart_failures: &'static [bool],
        cart_limit: Option<usize>,
        max_fetch_size: usize,
        max_batch_size: usize,
        target: usize,
    }

    #[tokio::test]
    async fn test_reported_success_matches_appended() {
        let cases = [
            Case {
                name: "clean",
                invalid: &[],
                fetch_failures: &[],
                cart_failures: &[],
                cart_limit: None,
                max_fetch_size: 100,
                max_batch_size: 150,
                target: 7,
            },
            Case {
                name: "invalid ids and failed first lookup",
                invalid: &["1002", "2001", "2004"],
                fetch_failures: &[true, false],
                cart_failures: &[],
                cart_limit: None,
                max_fetch_size: 3,
                max_batch_size: 2,
                target: 6,
            },
            Case {
                name: "alternating cart failures",
                invalid: &["1003"],
                fetch_failures: &[],
                cart_failures: &[false, true, false, true],
                cart_limit: None,
                max_fetch_size: 4,
                max_batch_size: 2,
                target: 8,
            },
            Case {
                name: "partial cart adds",
                invalid: &[],
                fetch_failures: &[false, true],
                cart_failures: &[true],
                cart_limit: Some(1),
                max_fetch_size: 3,
                max_batch_size: 3,
                target: 5,
            },
            Case {
                name: "everything fails",
                invalid: &["1001"],
                fetch_failures: &[true; 8],
                cart_failures: &[true; 8],
                cart_limit: None,
                max_fetch_size: 2,
                max_batch_size: 2,
                target: 4,
            },
            Case {
                name: "target beyond supply",
                invalid: &["1001", "1005", "2002"],
                fetch_failures: &[false, false, true],
                cart_failures: &[false, true],
                cart_limit: Some(2),
                max_fetch_size: 2,
                max_batch_size: 5,
                target: 50,
            },
        ];

        for case in cases {
            let gateway = Arc::new(MockGateway::new());
            gateway.mark_invalid(case.invalid).await;
            gateway.set_cart_limit(case.cart_limit).await;
            for &fail in case.fetch_failures {
                if fail {
                    gateway
                        .push_fetch_error(GatewayError::Decode("lookup failed".into()))
                        .await;
                } else {
                    gateway.push_fetch_ok().await;
                }
            }
            for &fail in case.cart_failures {
                if fail {
                    gateway
                        .push_cart_error(GatewayError::Decode("cart failed".into()))
                        .await;
                } else {
                    gateway.push_cart_ok().await;
                }
            }
            let config = IngestConfig {
                max_fetch_size: case.max_fetch_size,
                max_batch_size: case.max_batch_size,
                ..IngestConfig::default()
            };
            let (engine, store) = setup(gateway.clone(), config).await;

            let files = vec![
                fixtures::product_file(
                    "a.csv",
                    &["1001", "1002", "1003", "1004", "1005", "1006"],
                    Quota::Limit(5),
                ),
                fixtures::product_file(
                    "b.csv",
                    &["2001", "2002", "2003", "2004", "2005", "2006"],
                    Quota::All,
                ),
            ];
            let report = engine.ingest(&files, case.target).await.unwrap();
            let appended = store.get("live-1").await.unwrap().products;

            let per_file: usize = report.files.iter().map(|f| f.success).sum();
            assert_eq!(per_file, report.success, "{}", case.name);
            assert_eq!(appended.len(), report.success, "{}", case.name);
            assert!(report.success <= case.target, "{}", case.name);
            assert_eq!(report.partial, report.success < case.target, "{}", case.name);
            assert!(
                appended.iter().all(|p| !case.invalid.contains(&p.sku.as_str())),
                "{}",
                case.name
            );
            assert!(
                appended.iter().all(|p| p.sku != "1006"),
                "{}: quota exceeded",
                case.name
            );
        }
    }

    #[tokio::test]
    async fn test_requires_active_session() {
        let gateway = Arc::new(MockGateway::new());
        let store = LiveSessionStore::new(5, Arc::new(BroadcastBus::default()));
        let engine = BatchIngestionEngine::new(gateway, store, IngestConfig::default());

        let result = engine.ingest(&[], 5).await;
        assert!(matches!(result, Err(IngestError::NoActiveSession)));
    }
}
