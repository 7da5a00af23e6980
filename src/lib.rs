// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod alert;
pub mod classification;
pub mod config;
pub mod dedup;
pub mod executor;
pub mod pipeline;
pub mod ratelimit;
pub mod record;

// Dispatch channels
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::alert::{format_alert, FormattedAlert, SourceMeta};
pub use crate::classification::{ClassificationLevel, ClassificationTable, TableVariant};
pub use crate::executor::{Classifier, ClassifyError, ModelClient, ModelResponse};
pub use crate::pipeline::{AlertPipeline, DispatchOutcome};
pub use crate::record::{AlertRecord, Sentiment};
