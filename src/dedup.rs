//! dedup.rs — persisted "already sent" markers for the dispatch gate.
//!
//! One source (URL, else title) is never alerted twice, across process
//! restarts. The ledger is a small JSON map on disk, rewritten atomically
//! via a tmp file + rename.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SentEntry {
    sent_at: DateTime<Utc>,
    level: String,
}

#[derive(Debug)]
pub struct SentLedger {
    path: PathBuf,
    inner: Mutex<HashMap<String, SentEntry>>,
}

impl SentLedger {
    /// Open (or start) a ledger at `path`. A missing file is an empty
    /// ledger; a corrupt file is an error so history is not silently lost.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let map = match fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing sent ledger {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading sent ledger {}", path.display()))
            }
        };
        Ok(Self {
            path,
            inner: Mutex::new(map),
        })
    }

    pub fn already_sent(&self, key: &str) -> bool {
        self.inner.lock().expect("ledger mutex poisoned").contains_key(key)
    }

    /// Record a successful dispatch and persist immediately.
    pub fn mark_sent(&self, key: &str, level: &str) -> Result<()> {
        let snapshot = {
            let mut map = self.inner.lock().expect("ledger mutex poisoned");
            map.insert(
                key.to_string(),
                SentEntry {
                    sent_at: Utc::now(),
                    level: level.to_string(),
                },
            );
            map.clone()
        };
        save_atomic(&self.path, &snapshot)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("ledger mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn save_atomic(path: &Path, map: &HashMap<String, SentEntry>) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(map).context("serializing sent ledger")?;
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_empty_ledger() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = SentLedger::open(tmp.path().join("sent.json")).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.already_sent("https://example.com/a"));
    }

    #[test]
    fn marks_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sent.json");

        let ledger = SentLedger::open(&path).unwrap();
        ledger.mark_sent("https://example.com/a", "High").unwrap();
        assert!(ledger.already_sent("https://example.com/a"));

        let reopened = SentLedger::open(&path).unwrap();
        assert!(reopened.already_sent("https://example.com/a"));
        assert!(!reopened.already_sent("https://example.com/b"));
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn corrupt_ledger_is_an_error_not_a_wipe() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sent.json");
        fs::write(&path, "not json").unwrap();
        assert!(SentLedger::open(&path).is_err());
    }
}
