//! Media Alert Analyzer — Binary Entrypoint
//! Reads one already-translated text (file argument or stdin), classifies it,
//! prints the formatted alert as JSON, and dispatches it to Telegram when
//! credentials are configured.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use media_alert_analyzer::classification::ClassificationTable;
use media_alert_analyzer::config::ClassifierConfig;
use media_alert_analyzer::dedup::SentLedger;
use media_alert_analyzer::executor::{Classifier, GroqClient};
use media_alert_analyzer::notify::telegram::TelegramNotifier;
use media_alert_analyzer::pipeline::{AlertPipeline, DispatchOutcome};
use media_alert_analyzer::SourceMeta;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("media_alert_analyzer=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let text = match args.next() {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading alert text from {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading alert text from stdin")?;
            buf
        }
    };
    let meta = SourceMeta {
        url: std::env::var("ALERT_SOURCE_URL").ok(),
        title: std::env::var("ALERT_SOURCE_TITLE").ok(),
    };

    let config = ClassifierConfig::load_default();
    let table = ClassificationTable::load_default(config.table)?;
    let client = Arc::new(GroqClient::new(&config)?);
    let classifier = Classifier::new(client, table, config.max_retries);

    let notifier = TelegramNotifier::from_env();
    let ledger = SentLedger::open("cache/sent_alerts.json")?;

    let dispatch = notifier.is_configured();
    let pipeline = AlertPipeline::new(classifier, ledger, Box::new(notifier));

    if dispatch {
        match pipeline.process_and_dispatch(&text, &meta).await? {
            DispatchOutcome::Sent(alert) => {
                println!("{}", serde_json::to_string_pretty(&alert)?);
            }
            DispatchOutcome::DuplicateSkipped => {
                println!("already alerted for this source, nothing sent");
            }
        }
    } else {
        let alert = pipeline.process(&text, &meta).await?;
        println!("{}", serde_json::to_string_pretty(&alert)?);
    }

    Ok(())
}
