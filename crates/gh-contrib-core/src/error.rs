//! Aggregation-layer error taxonomy
//!
//! Quota and upstream failures pass through unmodified so the boundary can
//! map them faithfully; a failed contributor reload is wrapped with the
//! repository it belongs to. No layer here retries anything.

use gh_contrib_client::ApiError;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A contributor reload failed after it started. Not retryable by this
    /// layer; the repository keeps its previous cached state.
    #[error("failed to load contributors for repository: {repo}")]
    RepositoryLoad {
        repo: String,
        #[source]
        source: ApiError,
    },

    /// The upstream reports no such organization.
    #[error("organization not found: {org}")]
    OrganizationNotFound { org: String },

    /// Quota or upstream failure, propagated unmodified.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CoreError {
    /// HTTP status the front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::RepositoryLoad { .. } => 502,
            CoreError::OrganizationNotFound { .. } => 404,
            CoreError::Api(err) => err.status_code(),
        }
    }

    /// Structured JSON payload for the error body.
    pub fn payload(&self) -> Value {
        match self {
            CoreError::Api(err) => err.payload(),
            _ => json!({ "message": self.to_string() }),
        }
    }

    /// True for quota exhaustion, which aborts whole fan-out rounds.
    pub fn is_quota(&self) -> bool {
        matches!(self, CoreError::Api(ApiError::QuotaExceeded { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_per_kind() {
        let not_found = CoreError::OrganizationNotFound { org: "acme".into() };
        assert_eq!(not_found.status_code(), 404);
        assert_eq!(not_found.payload()["message"], "organization not found: acme");

        let load = CoreError::RepositoryLoad {
            repo: "widget".into(),
            source: ApiError::Upstream {
                status: 500,
                message: "boom".into(),
            },
        };
        assert_eq!(load.status_code(), 502);

        let quota = CoreError::Api(ApiError::QuotaExceeded {
            reset_at: chrono::Utc::now(),
            wait_secs: 10,
        });
        assert_eq!(quota.status_code(), 403);
        assert!(quota.is_quota());
        assert!(quota.payload().get("reset_at").is_some());
    }
}
