use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

const CONFIG_FILE: &str = "config.json";

/// Remote store endpoint configuration. Sync engages only when both fields are present;
/// otherwise the application runs local-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfig {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
}

impl RemoteConfig {
    /// Reads the config file and applies `ONTO_API_URL`/`ONTO_API_TOKEN` overrides. A missing
    /// or corrupted file is treated as unconfigured.
    pub fn load(app_dir: &Path) -> Self {
        let path = app_dir.join(CONFIG_FILE);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<RemoteConfig>(&raw).unwrap_or_else(|e| {
                warn!("Config at {path:?} is not valid json, ignoring it: {e}");
                RemoteConfig::default()
            }),
            Err(_) => RemoteConfig::default(),
        };

        if let Ok(url) = std::env::var("ONTO_API_URL") {
            config.api_url = Some(url);
        }
        if let Ok(token) = std::env::var("ONTO_API_TOKEN") {
            config.api_token = Some(token);
        }
        config.normalize();
        config
    }

    pub fn save(&self, app_dir: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(app_dir.join(CONFIG_FILE), raw)?;
        Ok(())
    }

    /// Returns `(url, token)` when sync is fully configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_url.as_deref(), self.api_token.as_deref()) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => {
                Some((url, token))
            }
            _ => None,
        }
    }

    fn normalize(&mut self) {
        for field in [&mut self.api_url, &mut self.api_token] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
    }
}
