//! Upstream API error taxonomy
//!
//! Quota exhaustion is distinguished from every other upstream failure
//! because the two are handled differently downstream: quota errors carry
//! the reset time and are retryable after waiting, everything else is not
//! retried at all.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The upstream request quota is exhausted. Retryable once `reset_at`
    /// has passed; never retried automatically by this crate.
    #[error("rate limit reached, please try again in {wait_secs} seconds")]
    QuotaExceeded {
        reset_at: DateTime<Utc>,
        wait_secs: i64,
    },

    /// Any other non-2xx upstream response.
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The request never produced a response (connection, TLS, timeout).
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status the (out-of-scope) front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::QuotaExceeded { .. } => 403,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Transport { .. } | ApiError::Decode { .. } => 502,
        }
    }

    /// Structured JSON payload for the error body.
    pub fn payload(&self) -> Value {
        match self {
            ApiError::QuotaExceeded { reset_at, .. } => json!({
                "message": self.to_string(),
                "reset_at": reset_at.timestamp(),
                "reset_utc": reset_at.to_rfc3339(),
            }),
            _ => json!({ "message": self.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn quota_payload_carries_reset_time() {
        let reset_at = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let err = ApiError::QuotaExceeded {
            reset_at,
            wait_secs: 90,
        };

        assert_eq!(err.status_code(), 403);
        let payload = err.payload();
        assert_eq!(payload["reset_at"], reset_at.timestamp());
        assert!(payload["message"]
            .as_str()
            .unwrap()
            .contains("90 seconds"));
    }

    #[test]
    fn upstream_payload_keeps_status() {
        let err = ApiError::Upstream {
            status: 422,
            message: "validation failed".into(),
        };
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.payload()["message"], "upstream returned 422: validation failed");
    }
}
