//! alert.rs — joining a validated record with its severity-table entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::ClassificationTable;
use crate::record::{AlertRecord, Sentiment};

/// Action reported when the record's flag has no entry in the table in use.
/// Formatting degrades gracefully instead of dropping the alert.
pub const NO_ACTION_DEFINED: &str = "No specific action defined";

/// Caller-supplied identity of the source article/post, when known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SourceMeta {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            title: Some(title.into()),
        }
    }

    /// Stable identity for the dedup gate: URL when present, else title.
    pub fn dedup_key(&self) -> Option<&str> {
        self.url.as_deref().or(self.title.as_deref())
    }
}

/// The externally visible unit: one classified, action-annotated alert.
/// Serializes in the "Alert Analysis" envelope downstream channels expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedAlert {
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "Overall Sentiment")]
    pub sentiment: Sentiment,
    #[serde(rename = "Alert Level")]
    pub level: String,
    #[serde(rename = "Criteria")]
    pub criteria: Vec<String>,
    #[serde(rename = "Required Action")]
    pub required_action: String,
    #[serde(rename = "URL", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "Title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Classified At")]
    pub classified_at: DateTime<Utc>,
}

/// Pure composition: record + table entry + source metadata.
///
/// A flag missing from `table` substitutes an empty-criteria placeholder
/// with [`NO_ACTION_DEFINED`]; this never fails.
pub fn format_alert(
    record: &AlertRecord,
    table: &ClassificationTable,
    meta: &SourceMeta,
) -> FormattedAlert {
    let (criteria, required_action) = match table.lookup(&record.severity_flag) {
        Some(level) => (level.criteria.clone(), level.action.clone()),
        None => (Vec::new(), NO_ACTION_DEFINED.to_string()),
    };

    FormattedAlert {
        summary: record.summary.clone(),
        sentiment: record.sentiment,
        level: record.severity_flag.clone(),
        criteria,
        required_action,
        url: meta.url.clone(),
        title: meta.title.clone(),
        classified_at: Utc::now(),
    }
}

impl FormattedAlert {
    /// Human-readable rendering for chat channels.
    pub fn to_message(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("*Alert Level:* {}\n", self.level));
        out.push_str(&format!("*Sentiment:* {}\n", self.sentiment.as_str()));
        out.push_str(&format!("*Summary:* {}\n", self.summary));
        out.push_str(&format!("*Required Action:* {}\n", self.required_action));
        if let Some(title) = &self.title {
            out.push_str(&format!("*Title:* {title}\n"));
        }
        if let Some(url) = &self.url {
            out.push_str(&format!("*URL:* {url}\n"));
        }
        out
    }
}
