//! classification.rs — the severity classification table.
//!
//! A table maps a severity name ("High", "Low", ...) to the criteria that
//! justify flagging at that level, example triggers, and the action the
//! monitoring team must take. Two variants ship embedded in the binary; any
//! other variant can be loaded from a JSON or TOML file, so the executor
//! never hardcodes a vocabulary.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

const ENV_TABLE_PATH: &str = "CLASSIFICATION_TABLE_PATH";

static STANDARD: Lazy<ClassificationTable> = Lazy::new(|| {
    let raw = include_str!("../classification_standard.json");
    ClassificationTable::from_json(raw).expect("valid embedded standard table")
});

static ESCALATION: Lazy<ClassificationTable> = Lazy::new(|| {
    let raw = include_str!("../classification_escalation.json");
    ClassificationTable::from_json(raw).expect("valid embedded escalation table")
});

/// One severity level: why it gets flagged, what it looks like, what to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationLevel {
    pub criteria: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    pub action: String,
}

/// Which embedded table to use when no file path is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableVariant {
    /// {High, Medium, Low} with triage actions ("Action Required" / "Assess" / "No Action Needed").
    Standard,
    /// {Urgent, High, Moderate, Low} with escalation-channel actions.
    Escalation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationTable {
    levels: BTreeMap<String, ClassificationLevel>,
}

impl ClassificationTable {
    /// Embedded variant. Cheap clone of a process-lifetime constant.
    pub fn embedded(variant: TableVariant) -> Self {
        match variant {
            TableVariant::Standard => STANDARD.clone(),
            TableVariant::Escalation => ESCALATION.clone(),
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let levels: BTreeMap<String, ClassificationLevel> =
            serde_json::from_str(s).context("parsing classification table JSON")?;
        Self::validate(levels)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let levels: BTreeMap<String, ClassificationLevel> =
            toml::from_str(s).context("parsing classification table TOML")?;
        Self::validate(levels)
    }

    /// Load a table from an explicit path. Format is chosen by extension,
    /// with a JSON fallback for unknown extensions.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading classification table from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Self::from_toml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Resolve the table for this process:
    /// 1) $CLASSIFICATION_TABLE_PATH, if set (must exist);
    /// 2) the requested embedded variant.
    pub fn load_default(variant: TableVariant) -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_TABLE_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "CLASSIFICATION_TABLE_PATH points to non-existent path"
                ));
            }
            return Self::load_from(&pb);
        }
        Ok(Self::embedded(variant))
    }

    fn validate(levels: BTreeMap<String, ClassificationLevel>) -> Result<Self> {
        if levels.is_empty() {
            return Err(anyhow!("classification table has no levels"));
        }
        for (name, level) in &levels {
            if name.trim().is_empty() {
                return Err(anyhow!("classification table has an empty level name"));
            }
            if level.action.trim().is_empty() {
                return Err(anyhow!("level {name:?} has an empty action"));
            }
        }
        Ok(Self { levels })
    }

    /// Case-sensitive exact lookup. Callers normalize first (see
    /// [`Self::canonical_flag`]).
    pub fn lookup(&self, level_name: &str) -> Option<&ClassificationLevel> {
        self.levels.get(level_name)
    }

    /// Map an arbitrarily-cased flag onto this table's exact key, if any.
    pub fn canonical_flag(&self, flag: &str) -> Option<&str> {
        self.levels
            .keys()
            .find(|k| k.eq_ignore_ascii_case(flag))
            .map(|k| k.as_str())
    }

    /// Severity names in this table, in stable order.
    pub fn level_names(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(|k| k.as_str())
    }

    /// JSON rendering of the whole table, embedded into the model prompt.
    pub fn prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.levels).unwrap_or_else(|_| "{}".to_string())
    }
}
