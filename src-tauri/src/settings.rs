use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::ModelTable;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub models: ModelTable,
    pub request_timeout_secs: Option<u64>,
    pub voice: Option<String>,
}

impl Settings {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(|s| s.trim_end_matches('/'))
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    /// Settings value first, then the environment. Blank values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        let non_blank = |k: String| {
            let k = k.trim().to_string();
            (!k.is_empty()).then_some(k)
        };
        self.api_key
            .clone()
            .and_then(non_blank)
            .or_else(|| API_KEY_ENV_VARS.iter().find_map(|name| env(name).and_then(non_blank)))
    }
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

pub fn load_settings_from_dir(data_dir: &Path) -> Settings {
    let path = settings_path(data_dir);
    if let Ok(bytes) = fs::read(&path) {
        match serde_json::from_slice::<Settings>(&bytes) {
            Ok(s) => return s,
            Err(e) => warn!(error = %e, path = %path.display(), "ignoring unreadable settings"),
        }
    }
    Settings::default()
}

pub fn save_settings_to_dir(data_dir: &Path, s: &Settings) -> Result<()> {
    let path = settings_path(data_dir);
    let json = serde_json::to_vec_pretty(s)?;
    fs::write(path, json).context("write settings")?;
    Ok(())
}
