//! pipeline.rs — composition root: executor → formatter → dedup gate → channel.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::alert::{format_alert, FormattedAlert, SourceMeta};
use crate::dedup::SentLedger;
use crate::executor::{Classifier, ClassifyError};
use crate::notify::Notifier;

/// What happened to one source at the dispatch boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent(FormattedAlert),
    /// The dedup ledger already holds this source's identity.
    DuplicateSkipped,
}

pub struct AlertPipeline {
    classifier: Classifier,
    ledger: SentLedger,
    notifier: Box<dyn Notifier>,
}

impl AlertPipeline {
    pub fn new(classifier: Classifier, ledger: SentLedger, notifier: Box<dyn Notifier>) -> Self {
        Self {
            classifier,
            ledger,
            notifier,
        }
    }

    /// Classify and format one text, without touching the dispatch boundary.
    pub async fn process(
        &self,
        text: &str,
        meta: &SourceMeta,
    ) -> Result<FormattedAlert, ClassifyError> {
        let record = self.classifier.classify(text).await?;
        Ok(format_alert(&record, self.classifier.table(), meta))
    }

    /// Full path: dedup gate → classify → format → deliver → mark sent.
    ///
    /// The gate runs before the model call, so an already-sent source costs
    /// no quota. A source without any identity (no URL, no title) cannot be
    /// deduplicated and is always dispatched.
    pub async fn process_and_dispatch(
        &self,
        text: &str,
        meta: &SourceMeta,
    ) -> Result<DispatchOutcome> {
        if let Some(key) = meta.dedup_key() {
            if self.ledger.already_sent(key) {
                info!(key, "source already alerted, skipping");
                return Ok(DispatchOutcome::DuplicateSkipped);
            }
        }

        let alert = self
            .process(text, meta)
            .await
            .with_context(|| format!("classifying source {:?}", meta.dedup_key().unwrap_or("<unknown>")))?;

        self.notifier
            .send(&alert)
            .await
            .with_context(|| format!("dispatching via {}", self.notifier.name()))?;

        if let Some(key) = meta.dedup_key() {
            self.ledger.mark_sent(key, &alert.level)?;
        }
        info!(level = %alert.level, "alert dispatched");
        Ok(DispatchOutcome::Sent(alert))
    }

    /// Batch entrypoint: one failed source never halts the rest; failures
    /// are logged with the source identity and skipped.
    pub async fn process_batch(&self, items: &[(String, SourceMeta)]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for (text, meta) in items {
            match self.process_and_dispatch(text, meta).await {
                Ok(DispatchOutcome::Sent(_)) => summary.sent += 1,
                Ok(DispatchOutcome::DuplicateSkipped) => summary.duplicates += 1,
                Err(e) => {
                    warn!(
                        source = meta.dedup_key().unwrap_or("<unknown>"),
                        error = %e,
                        "source failed, continuing batch"
                    );
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub sent: usize,
    pub duplicates: usize,
    pub failed: usize,
}
