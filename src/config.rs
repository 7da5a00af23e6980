// src/config.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use crate::classification::TableVariant;

fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_retries() -> u32 {
    5
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_table() -> TableVariant {
    TableVariant::Standard
}

/// Explicit configuration for the classification executor. Passed in by the
/// caller; nothing here is read from process-wide mutable state after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Kept low: classification must be deterministic, not creative.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Rate-limit retry ceiling per classify call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// "ENV" means: read from GROQ_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Which embedded classification table to use when no
    /// CLASSIFICATION_TABLE_PATH override is set.
    #[serde(default = "default_table")]
    pub table: TableVariant,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            api_key: default_api_key(),
            table: default_table(),
        }
    }
}

impl ClassifierConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: ClassifierConfig = serde_json::from_str(&data)?;

        // Resolve api key if "ENV"
        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = env::var("GROQ_API_KEY")
                .map_err(|_| anyhow::anyhow!("Missing GROQ_API_KEY env var"))?;
        }

        // Sanitize temperature: low by design, clamp rather than reject.
        if !(0.0..=1.0).contains(&cfg.temperature) {
            cfg.temperature = default_temperature();
        }
        if cfg.max_retries == 0 {
            cfg.max_retries = default_max_retries();
        }

        Ok(cfg)
    }

    /// `config/classifier.json` if present, defaults otherwise. The api key
    /// still resolves from the environment in the default path. A file that
    /// exists but cannot be loaded is logged, so a misconfigured deployment
    /// is diagnosable instead of silently running on defaults.
    pub fn load_default() -> Self {
        let path = Path::new("config/classifier.json");
        match Self::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(
                        error = %e,
                        "config/classifier.json present but unusable, falling back to defaults"
                    );
                }
                let mut cfg = Self::default();
                cfg.api_key = env::var("GROQ_API_KEY").unwrap_or_default();
                cfg
            }
        }
    }
}
