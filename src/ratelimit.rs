//! ratelimit.rs — best-effort parsing of provider quota telemetry.
//!
//! The model provider reports remaining quota and reset times in response
//! headers ("x-ratelimit-remaining-requests", "x-ratelimit-reset-tokens",
//! ...). Reset times come as compact duration tokens like "2m59.56s" or
//! "7.66s". Everything here feeds sleep decisions, not correctness, so
//! parsing never fails: a token we cannot read resolves to a conservative
//! default.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fallback when a reset token is absent or unreadable.
pub const DEFAULT_RESET_SECS: f64 = 2.0;

/// Pause proactively when this few requests remain in the window.
pub const MIN_REMAINING_REQUESTS: u64 = 2;
/// Pause proactively when this few tokens remain in the window.
pub const MIN_REMAINING_TOKENS: u64 = 500;

static RESET_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(\d+)m)?(\d+(?:\.\d+)?)s").expect("valid reset-token regex"));

/// Parse a reset token ("2m59.56s", "7.66s", bare "5") into seconds.
///
/// Never errors: unparseable input yields [`DEFAULT_RESET_SECS`].
pub fn parse_reset_duration(token: &str) -> f64 {
    let token = token.trim();
    if token.is_empty() {
        return DEFAULT_RESET_SECS;
    }
    if let Some(caps) = RESET_TOKEN.captures(token) {
        let minutes: f64 = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0.0);
        if let Some(seconds) = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok()) {
            return minutes * 60.0 + seconds;
        }
    }
    token.parse::<f64>().unwrap_or(DEFAULT_RESET_SECS)
}

/// Quota telemetry attached to a successful model response.
///
/// All fields are optional on the wire; a response without telemetry is
/// normal and simply skips the proactive pause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaTelemetry {
    pub remaining_requests: Option<u64>,
    pub remaining_tokens: Option<u64>,
    pub reset_requests: Option<String>,
    pub reset_tokens: Option<String>,
}

impl QuotaTelemetry {
    /// Advisory pause before the next call, if the remaining quota is close
    /// to exhaustion. Requests take precedence over tokens, matching the
    /// provider's stricter per-request window.
    pub fn advisory_pause(&self) -> Option<Duration> {
        if let (Some(remaining), Some(reset)) = (self.remaining_requests, &self.reset_requests) {
            if remaining <= MIN_REMAINING_REQUESTS {
                return Some(Duration::from_secs_f64(parse_reset_duration(reset)));
            }
        }
        if let (Some(remaining), Some(reset)) = (self.remaining_tokens, &self.reset_tokens) {
            if remaining <= MIN_REMAINING_TOKENS {
                return Some(Duration::from_secs_f64(parse_reset_duration(reset)));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_and_seconds_composite() {
        assert!((parse_reset_duration("2m59.56s") - 179.56).abs() < 1e-9);
        assert!((parse_reset_duration("1m0s") - 60.0).abs() < 1e-9);
    }

    #[test]
    fn plain_seconds_suffix() {
        assert_eq!(parse_reset_duration("7.66s"), 7.66);
    }

    #[test]
    fn bare_float_without_suffix() {
        assert_eq!(parse_reset_duration("5"), 5.0);
        assert_eq!(parse_reset_duration("0.25"), 0.25);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        assert_eq!(parse_reset_duration("garbage"), DEFAULT_RESET_SECS);
        assert_eq!(parse_reset_duration(""), DEFAULT_RESET_SECS);
        assert_eq!(parse_reset_duration("m5s"), DEFAULT_RESET_SECS);
    }

    #[test]
    fn pause_when_requests_nearly_exhausted() {
        let t = QuotaTelemetry {
            remaining_requests: Some(2),
            remaining_tokens: Some(100_000),
            reset_requests: Some("7.66s".into()),
            reset_tokens: Some("1m0s".into()),
        };
        assert_eq!(t.advisory_pause(), Some(Duration::from_secs_f64(7.66)));
    }

    #[test]
    fn token_pressure_checked_after_requests() {
        let t = QuotaTelemetry {
            remaining_requests: Some(50),
            remaining_tokens: Some(499),
            reset_requests: Some("7.66s".into()),
            reset_tokens: Some("2m59.56s".into()),
        };
        let pause = t.advisory_pause().expect("token pressure pauses");
        assert!((pause.as_secs_f64() - 179.56).abs() < 1e-6);
    }

    #[test]
    fn healthy_quota_means_no_pause() {
        let t = QuotaTelemetry {
            remaining_requests: Some(100),
            remaining_tokens: Some(10_000),
            reset_requests: Some("7.66s".into()),
            reset_tokens: Some("7.66s".into()),
        };
        assert_eq!(t.advisory_pause(), None);
    }

    #[test]
    fn missing_telemetry_is_not_an_error() {
        assert_eq!(QuotaTelemetry::default().advisory_pause(), None);
        // Low quota but no reset token: nothing to wait on.
        let t = QuotaTelemetry {
            remaining_requests: Some(0),
            ..Default::default()
        };
        assert_eq!(t.advisory_pause(), None);
    }
}
