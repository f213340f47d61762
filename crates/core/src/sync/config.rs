use serde::{Deserialize, Serialize};

/// Display surface sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Outbound queue per surface; pushes beyond it are dropped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Page a surface window loads; `{surface_id}` is substituted.
    #[serde(default = "default_surface_url")]
    pub surface_url: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            surface_url: default_surface_url(),
        }
    }
}

fn default_channel_capacity() -> usize {
    64
}

fn default_surface_url() -> String {
    "http://127.0.0.1:8080/surface/{surface_id}".to_string()
}

impl SyncConfig {
    /// Surface page URL with the percent-encoded id substituted.
    pub fn surface_url_for(&self, surface_id: &str) -> String {
        self.surface_url
            .replace("{surface_id}", &urlencoding::encode(surface_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_url_substitution() {
        let config = SyncConfig::default();
        assert_eq!(
            config.surface_url_for("main"),
            "http://127.0.0.1:8080/surface/main"
        );
        assert_eq!(
            config.surface_url_for("side screen/2"),
            "http://127.0.0.1:8080/surface/side%20screen%2F2"
        );
    }
}
