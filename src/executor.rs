//! executor.rs — the classification request executor.
//!
//! One `classify` call: clean the input, prompt the model with the table's
//! criteria and a strict output schema, pause if quota telemetry says we are
//! close to the limit, validate the payload. Only rate-limit rejections are
//! retried; they are expected and self-healing. A malformed response or a
//! transport failure escalates on first occurrence, because retrying a
//! prompt/model problem blindly will not fix it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classification::ClassificationTable;
use crate::config::ClassifierConfig;
use crate::ratelimit::{QuotaTelemetry, DEFAULT_RESET_SECS};
use crate::record::{AlertRecord, RawAnalysis, ValidationError};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Failure of one model call, before validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Provider signalled "too many requests". The only retryable kind.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },
    /// Network/HTTP-level failure.
    #[error("model transport error: {0}")]
    Transport(String),
    /// The call succeeded but the body did not match the requested schema.
    #[error("malformed model payload: {0}")]
    MalformedPayload(String),
}

/// Why a whole `classify` call failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifyError {
    #[error("exceeded {attempts} attempts due to rate limiting")]
    RetriesExhausted { attempts: u32 },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Model(ModelError),
}

/// One successful model response: the schema'd payload plus whatever quota
/// telemetry the provider attached (absence is normal).
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub payload: RawAnalysis,
    pub telemetry: Option<QuotaTelemetry>,
}

/// The seam between the executor and a concrete model endpoint. Production
/// uses [`GroqClient`]; tests script their own implementations.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<ModelResponse, ModelError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynModelClient = Arc<dyn ModelClient>;

/// Collapse runs of whitespace and trim, so the prompt never carries
/// scraped/transcribed formatting noise.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Build the classification prompt: criteria JSON + the alert text + a strict
/// three-field output schema.
pub fn build_prompt(table: &ClassificationTable, cleaned_alert: &str) -> String {
    format!(
        "Strictly analyze the media alert using the classification criteria below.\n\
         \n\
         Classification Levels: {levels}\n\
         \n\
         Media Alert: {alert}\n\
         \n\
         Analysis Guidelines:\n\
         1. Summarize key points objectively\n\
         2. Determine precise sentiment\n\
         3. Classify alert level rigorously\n\
         4. Avoid speculation\n\
         5. Focus on verifiable information\n\
         \n\
         Respond with a single JSON object and nothing else, exactly this schema:\n\
         {{\"summarization\": \"<concise factual summary>\", \
         \"sentiment\": \"<Positive|Negative|Neutral>\", \
         \"flag\": \"<one of: {flags}>\"}}",
        levels = table.prompt_json(),
        alert = cleaned_alert,
        flags = table.level_names().collect::<Vec<_>>().join("|"),
    )
}

/// Transient per-call counters; discarded when `classify` returns.
#[derive(Debug, Default)]
struct RetryState {
    attempts: u32,
    slept: Duration,
}

pub struct Classifier {
    client: DynModelClient,
    table: ClassificationTable,
    max_retries: u32,
}

impl Classifier {
    pub fn new(client: DynModelClient, table: ClassificationTable, max_retries: u32) -> Self {
        Self {
            client,
            table,
            max_retries,
        }
    }

    pub fn table(&self) -> &ClassificationTable {
        &self.table
    }

    /// Classify one piece of already-translated text into an [`AlertRecord`].
    ///
    /// Attempts are strictly sequential; each blocks (on the async clock)
    /// until the previous completes. All waits are `tokio::time::sleep`, so
    /// a caller wanting a hard deadline can wrap this in
    /// `tokio::time::timeout`.
    pub async fn classify(&self, text: &str) -> Result<AlertRecord, ClassifyError> {
        let cleaned = clean_text(text);
        let prompt = build_prompt(&self.table, &cleaned);
        let mut state = RetryState::default();

        while state.attempts < self.max_retries {
            match self.client.complete(&prompt).await {
                Ok(resp) => {
                    // Advisory pause before anyone issues the next call.
                    if let Some(pause) = resp.telemetry.as_ref().and_then(|t| t.advisory_pause()) {
                        info!(
                            provider = self.client.name(),
                            pause_secs = pause.as_secs_f64(),
                            "approaching rate limit, waiting for quota reset"
                        );
                        tokio::time::sleep(pause).await;
                        state.slept += pause;
                    }
                    debug!(
                        provider = self.client.name(),
                        attempts = state.attempts + 1,
                        slept_secs = state.slept.as_secs_f64(),
                        "model call succeeded"
                    );
                    return AlertRecord::from_raw(&resp.payload, &self.table)
                        .map_err(ClassifyError::from);
                }
                Err(ModelError::RateLimited { retry_after_secs }) => {
                    let wait = Duration::from_secs_f64(retry_after_secs.max(0.0));
                    state.attempts += 1;
                    warn!(
                        provider = self.client.name(),
                        attempt = state.attempts,
                        retry_after_secs,
                        "rate limit hit, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    state.slept += wait;
                }
                // Anything else is not self-healing; surface it immediately.
                Err(other) => return Err(ClassifyError::Model(other)),
            }
        }

        Err(ClassifyError::RetriesExhausted {
            attempts: state.attempts,
        })
    }
}

// ------------------------------------------------------------
// Production client (Groq, OpenAI-compatible chat completions)
// ------------------------------------------------------------

const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

pub struct GroqClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GroqClient {
    pub fn new(config: &ClassifierConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("media-alert-analyzer/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ModelClient for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<ModelResponse, ModelError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat<'a> {
            #[serde(rename = "type")]
            kind: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            response_format: ResponseFormat<'a>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let resp = self
            .http
            .post(GROQ_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<f64>().ok())
                .unwrap_or(DEFAULT_RESET_SECS);
            return Err(ModelError::RateLimited { retry_after_secs });
        }
        if !resp.status().is_success() {
            return Err(ModelError::Transport(format!(
                "model endpoint returned {}",
                resp.status()
            )));
        }

        let telemetry = telemetry_from_headers(resp.headers());

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ModelError::MalformedPayload(e.to_string()))?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ModelError::MalformedPayload("response has no choices".into()))?;

        let payload = parse_model_payload(content)?;
        Ok(ModelResponse { payload, telemetry })
    }

    fn name(&self) -> &'static str {
        "groq"
    }
}

/// Read the four quota headers, if present. Missing or unreadable headers
/// are a normal, typed outcome (`None`), never an error.
fn telemetry_from_headers(headers: &reqwest::header::HeaderMap) -> Option<QuotaTelemetry> {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };
    let t = QuotaTelemetry {
        remaining_requests: get("x-ratelimit-remaining-requests").and_then(|s| s.parse().ok()),
        remaining_tokens: get("x-ratelimit-remaining-tokens").and_then(|s| s.parse().ok()),
        reset_requests: get("x-ratelimit-reset-requests"),
        reset_tokens: get("x-ratelimit-reset-tokens"),
    };
    if t == QuotaTelemetry::default() {
        None
    } else {
        Some(t)
    }
}

/// Deserialize the model's message content into the strict three-field
/// schema. Models occasionally wrap JSON in a code fence; tolerate that one
/// decoration, nothing else.
pub fn parse_model_payload(content: &str) -> Result<RawAnalysis, ModelError> {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);
    serde_json::from_str(trimmed).map_err(|e| ModelError::MalformedPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::TableVariant;

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a\n\n b\t\tc  "), "a b c");
        assert_eq!(clean_text("already clean"), "already clean");
    }

    #[test]
    fn prompt_embeds_criteria_and_alert() {
        let table = ClassificationTable::embedded(TableVariant::Standard);
        let p = build_prompt(&table, "Refinery outage reported");
        assert!(p.contains("Refinery outage reported"));
        assert!(p.contains("No Action Needed"));
        assert!(p.contains("\"flag\""));
        assert!(p.contains("High|Low|Medium"));
    }

    #[test]
    fn payload_parses_plain_and_fenced_json() {
        let raw = r#"{"summarization": "Something happened somewhere.", "sentiment": "Neutral", "flag": "Low"}"#;
        let parsed = parse_model_payload(raw).unwrap();
        assert_eq!(parsed.flag, "Low");

        let fenced = format!("```json\n{raw}\n```");
        let parsed = parse_model_payload(&fenced).unwrap();
        assert_eq!(parsed.sentiment, "Neutral");
    }

    #[test]
    fn extra_fields_are_rejected_at_the_boundary() {
        let raw = r#"{"summarization": "s", "sentiment": "Neutral", "flag": "Low", "confidence": 0.9}"#;
        assert!(matches!(
            parse_model_payload(raw),
            Err(ModelError::MalformedPayload(_))
        ));
    }
}
