use serde::{Deserialize, Serialize};
use std::path::Path;
use xgpo_platform::AppPaths;

use crate::messages::Language;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub language: Option<Language>,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole-transfer deadline for the update payload.
    #[serde(default = "default_update_timeout")]
    pub update_timeout_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_category_concurrency")]
    pub category_concurrency: usize,

    #[serde(default = "default_extract_concurrency")]
    pub extract_concurrency: usize,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_http_timeout() -> u64 {
    20
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_update_timeout() -> u64 {
    15 * 60
}

fn default_probe_timeout() -> u64 {
    8
}

fn default_category_concurrency() -> usize {
    3
}

fn default_extract_concurrency() -> usize {
    4
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            language: None,
            debug_logging: false,
            http_timeout_secs: default_http_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            update_timeout_secs: default_update_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            category_concurrency: default_category_concurrency(),
            extract_concurrency: default_extract_concurrency(),
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl AppSettings {
    pub fn load() -> Self {
        let Ok(paths) = AppPaths::new() else {
            return Self::default();
        };
        Self::load_from(&paths.settings_file())
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load_from(settings_path: &Path) -> Self {
        if !settings_path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(settings_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        let paths = AppPaths::new().map_err(std::io::Error::other)?;
        paths.ensure_dirs()?;
        self.save_to(&paths.settings_file())
    }

    pub fn save_to(&self, settings_path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(settings_path, content)
    }
}
