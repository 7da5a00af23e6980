use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Serialize;

use super::Notifier;
use crate::alert::FormattedAlert;

/// Telegram Bot API channel.
///
/// Retry policy: HTTP 503 (the Bot API's transient overload answer) retries
/// with a fixed delay up to the attempt ceiling; any other failure gives up
/// immediately and reports the error without crashing the caller.
pub struct TelegramNotifier {
    token: Option<String>,
    chat_id: Option<String>,
    client: Client,
    retry_delay: Duration,
    max_retries: u8,
}

impl TelegramNotifier {
    pub fn from_env() -> Self {
        Self {
            token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            chat_id: std::env::var("TELEGRAM_CHAT_ID").ok(),
            client: Client::new(),
            retry_delay: Duration::from_secs(2),
            max_retries: 3,
        }
    }

    /// Builder for tests/tools.
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            token: Some(token),
            chat_id: Some(chat_id),
            client: Client::new(),
            retry_delay: Duration::from_secs(2),
            max_retries: 3,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_retries(mut self, n: u8) -> Self {
        self.max_retries = n;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'a str,
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, alert: &FormattedAlert) -> Result<()> {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            tracing::debug!("Telegram disabled (no TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID)");
            return Ok(());
        };

        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let payload = SendMessage {
            chat_id,
            text: alert.to_message(),
            parse_mode: "Markdown",
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let rsp = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .context("telegram sendMessage request")?;

            match rsp.status() {
                s if s.is_success() => return Ok(()),
                s if s == reqwest::StatusCode::SERVICE_UNAVAILABLE
                    && attempt < self.max_retries =>
                {
                    tracing::warn!(
                        attempt,
                        delay_secs = self.retry_delay.as_secs_f64(),
                        "telegram 503, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                s => {
                    let body = rsp.text().await.unwrap_or_default();
                    return Err(anyhow!("telegram sendMessage failed with {s}: {body}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
