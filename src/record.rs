//! record.rs — the validated output of one classification call.
//!
//! The model is instructed to answer with exactly three fields. That payload
//! is deserialized at the boundary into [`RawAnalysis`] and then checked
//! here; business logic only ever sees a well-formed [`AlertRecord`].

use serde::{Deserialize, Serialize};

use crate::classification::ClassificationTable;

/// Minimum summary length, in characters after trimming.
pub const MIN_SUMMARY_LEN: usize = 10;

/// The structured payload the model is asked to produce. Unknown fields are
/// rejected so a drifting prompt fails loudly instead of half-parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawAnalysis {
    /// Concise, factual summary of the media alert.
    pub summarization: String,
    /// Alert sentiment (Positive / Negative / Neutral, any case).
    pub sentiment: String,
    /// Classification level; vocabulary comes from the table in use.
    pub flag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
        }
    }

    /// Case-insensitive parse ("positive" -> Positive).
    fn parse(s: &str) -> Option<Self> {
        match capitalize(s.trim()).as_str() {
            "Positive" => Some(Sentiment::Positive),
            "Negative" => Some(Sentiment::Negative),
            "Neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

/// A single field violation. All three checks run independently, so one bad
/// payload can carry several of these at once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("summary must be at least {MIN_SUMMARY_LEN} characters long (got {len})")]
    TooShort { len: usize },
    #[error("sentiment must be one of Positive/Negative/Neutral (got {got:?})")]
    InvalidSentiment { got: String },
    #[error("flag {got:?} is not a level of the classification table in use")]
    InvalidFlag { got: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid model response: {}", issues_summary(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn issues_summary(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// One validated classification result, ready for formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub summary: String,
    pub sentiment: Sentiment,
    /// Canonical severity name, matching the table's exact key casing.
    pub severity_flag: String,
}

impl AlertRecord {
    /// Validate one raw payload against the injected table's vocabulary.
    ///
    /// Pure: the same payload and table always yield the same record or the
    /// same set of issues. Every violation is reported, not just the first,
    /// so the caller can decide whether the response is salvageable.
    pub fn from_raw(raw: &RawAnalysis, table: &ClassificationTable) -> Result<Self, ValidationError> {
        let mut issues = Vec::new();

        let summary = raw.summarization.trim().to_string();
        if summary.chars().count() < MIN_SUMMARY_LEN {
            issues.push(ValidationIssue::TooShort {
                len: summary.chars().count(),
            });
        }

        let sentiment = Sentiment::parse(&raw.sentiment);
        if sentiment.is_none() {
            issues.push(ValidationIssue::InvalidSentiment {
                got: raw.sentiment.clone(),
            });
        }

        let flag = table
            .canonical_flag(raw.flag.trim())
            .map(|k| k.to_string());
        if flag.is_none() {
            issues.push(ValidationIssue::InvalidFlag {
                got: raw.flag.clone(),
            });
        }

        match (sentiment, flag) {
            (Some(sentiment), Some(severity_flag)) if issues.is_empty() => Ok(Self {
                summary,
                sentiment,
                severity_flag,
            }),
            _ => Err(ValidationError { issues }),
        }
    }
}

/// First letter uppercased, the rest lowercased ("URGENT" -> "Urgent").
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}
