/// Client configuration.
/// Reads client.json from ~/.config/leadboard/client.json (or platform equivalent).
use leadboard_core::config::{ActivityCacheConfig, SearchConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sent as `X-Account-Id` on every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub activity: ActivityCacheConfig,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            account_id: None,
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            search: SearchConfig::default(),
            activity: ActivityCacheConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Default config path: ~/.config/leadboard/client.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("leadboard")
        .join("client.json")
}

/// Load config from path. Returns default if the file doesn't exist or
/// can't be parsed.
pub fn load_config(path: &Path) -> ClientConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(target: "leadboard.config", "Failed to parse config {}: {}", path.display(), e);
            ClientConfig::default()
        }),
        Err(_) => {
            log::info!(target: "leadboard.config", "No config at {}, using defaults", path.display());
            ClientConfig::default()
        }
    }
}
