// tests/pipeline_e2e.rs
// End-to-end: stub model -> validator -> formatter -> dedup gate -> channel.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use media_alert_analyzer::alert::FormattedAlert;
use media_alert_analyzer::classification::{ClassificationTable, TableVariant};
use media_alert_analyzer::dedup::SentLedger;
use media_alert_analyzer::executor::{
    Classifier, ModelClient, ModelError, ModelResponse,
};
use media_alert_analyzer::notify::Notifier;
use media_alert_analyzer::pipeline::{AlertPipeline, DispatchOutcome};
use media_alert_analyzer::record::RawAnalysis;
use media_alert_analyzer::{Sentiment, SourceMeta};

/// Always answers with the same fixed payload.
struct StubModel {
    payload: RawAnalysis,
    fail: bool,
}

#[async_trait]
impl ModelClient for StubModel {
    async fn complete(&self, _prompt: &str) -> Result<ModelResponse, ModelError> {
        if self.fail {
            return Err(ModelError::Transport("stub outage".into()));
        }
        Ok(ModelResponse {
            payload: self.payload.clone(),
            telemetry: None,
        })
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Records every delivered alert instead of hitting a real channel.
#[derive(Default)]
struct MemoryChannel {
    sent: Mutex<Vec<FormattedAlert>>,
}

#[async_trait]
impl Notifier for MemoryChannel {
    async fn send(&self, alert: &FormattedAlert) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn partnership_payload() -> RawAnalysis {
    RawAnalysis {
        summarization: "Company and XYZ partnership announced in major press.".into(),
        sentiment: "positive".into(),
        flag: "Low".into(),
    }
}

fn pipeline_with(
    payload: RawAnalysis,
    fail: bool,
    ledger_path: &std::path::Path,
) -> (AlertPipeline, Arc<MemoryChannel>) {
    let table = ClassificationTable::embedded(TableVariant::Standard);
    let classifier = Classifier::new(Arc::new(StubModel { payload, fail }), table, 5);
    let ledger = SentLedger::open(ledger_path).unwrap();
    let channel = Arc::new(MemoryChannel::default());
    // The pipeline owns its notifier; keep a second handle for assertions.
    struct Fwd(Arc<MemoryChannel>);
    #[async_trait]
    impl Notifier for Fwd {
        async fn send(&self, alert: &FormattedAlert) -> anyhow::Result<()> {
            self.0.send(alert).await
        }
        fn name(&self) -> &'static str {
            self.0.name()
        }
    }
    let pipeline = AlertPipeline::new(classifier, ledger, Box::new(Fwd(channel.clone())));
    (pipeline, channel)
}

#[tokio::test]
async fn partnership_news_classifies_low_with_table_action() {
    let tmp = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline_with(partnership_payload(), false, &tmp.path().join("sent.json"));

    let meta = SourceMeta::new("https://news.example/partnership", "Partnership announced");
    let alert = pipeline
        .process(
            "Aramco announces new partnership with XYZ in top-tier media",
            &meta,
        )
        .await
        .unwrap();

    assert_eq!(alert.level, "Low");
    assert_eq!(alert.sentiment, Sentiment::Positive);
    assert_eq!(alert.required_action, "No Action Needed");
    assert_eq!(
        alert.summary,
        "Company and XYZ partnership announced in major press."
    );
    assert!(!alert.criteria.is_empty());
    assert_eq!(alert.url.as_deref(), Some("https://news.example/partnership"));
}

#[tokio::test]
async fn same_source_is_never_alerted_twice() {
    let tmp = tempfile::tempdir().unwrap();
    let (pipeline, channel) =
        pipeline_with(partnership_payload(), false, &tmp.path().join("sent.json"));

    let meta = SourceMeta::new("https://news.example/partnership", "Partnership announced");
    let text = "Aramco announces new partnership with XYZ in top-tier media";

    let first = pipeline.process_and_dispatch(text, &meta).await.unwrap();
    assert!(matches!(first, DispatchOutcome::Sent(_)));

    let second = pipeline.process_and_dispatch(text, &meta).await.unwrap();
    assert_eq!(second, DispatchOutcome::DuplicateSkipped);

    assert_eq!(channel.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn dedup_survives_pipeline_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let ledger_path = tmp.path().join("sent.json");
    let meta = SourceMeta::new("https://news.example/partnership", "Partnership announced");
    let text = "Aramco announces new partnership with XYZ in top-tier media";

    {
        let (pipeline, _) = pipeline_with(partnership_payload(), false, &ledger_path);
        pipeline.process_and_dispatch(text, &meta).await.unwrap();
    }

    let (pipeline, channel) = pipeline_with(partnership_payload(), false, &ledger_path);
    let outcome = pipeline.process_and_dispatch(text, &meta).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::DuplicateSkipped);
    assert!(channel.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn batch_logs_and_skips_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let (ok_pipeline, channel) =
        pipeline_with(partnership_payload(), false, &tmp.path().join("sent.json"));

    let items = vec![
        (
            "Aramco announces new partnership with XYZ in top-tier media".to_string(),
            SourceMeta::new("https://news.example/a", "A"),
        ),
        (
            "Same story again".to_string(),
            SourceMeta::new("https://news.example/a", "A"),
        ),
    ];
    let summary = ok_pipeline.process_batch(&items).await;
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(channel.sent.lock().unwrap().len(), 1);

    // A broken model fails that source but the batch keeps going.
    let tmp2 = tempfile::tempdir().unwrap();
    let (bad_pipeline, channel2) =
        pipeline_with(partnership_payload(), true, &tmp2.path().join("sent.json"));
    let summary = bad_pipeline.process_batch(&items).await;
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.failed, 2);
    assert!(channel2.sent.lock().unwrap().is_empty());
}
