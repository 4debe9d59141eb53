use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub(super) const CONFIG_FILE_NAME: &str = "lostify_config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_USER_SEARCH_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub(super) struct AppConfig {
    pub(super) api_base_url: Option<String>,
    pub(super) request_timeout_secs: Option<u64>,
    pub(super) user_search_debounce_ms: Option<u64>,
}

pub(super) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    match serde_json::from_slice::<AppConfig>(&bytes) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), %e, "config: unreadable, using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn default_app_config_json() -> String {
    let defaults = AppConfig {
        api_base_url: Some(DEFAULT_API_BASE_URL.to_string()),
        request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
        user_search_debounce_ms: Some(DEFAULT_USER_SEARCH_DEBOUNCE_MS),
    };
    serde_json::to_string_pretty(&defaults).unwrap_or_else(|_| "{}".to_string())
}

impl AppConfig {
    pub(super) fn api_base_url(&self) -> String {
        if let Some(url) = &self.api_base_url {
            if !url.trim().is_empty() {
                return url.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var("LOSTIFY_API_BASE_URL") {
            if !url.trim().is_empty() {
                return url.trim().to_string();
            }
        }
        DEFAULT_API_BASE_URL.to_string()
    }

    pub(super) fn request_timeout(&self) -> Duration {
        let secs = self
            .request_timeout_secs
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub(super) fn user_search_debounce(&self) -> Duration {
        Duration::from_millis(
            self.user_search_debounce_ms
                .unwrap_or(DEFAULT_USER_SEARCH_DEBOUNCE_MS),
        )
    }
}
