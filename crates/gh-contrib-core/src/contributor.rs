//! Contributor domain model
//!
//! The same shape serves three purposes: per-repository state, the merged
//! organization ranking, and the persisted cache record. `avatar_url`
//! serializes as `image`, which is the name the response format and the
//! snapshot files use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastCommit {
    pub message: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub username: String,
    pub email: Option<String>,
    #[serde(rename = "image")]
    pub avatar_url: String,
    /// Count reported by the upstream for one repository; the sum across
    /// repositories at the organization level.
    pub contributions: u64,
    /// Unresolved until a commit scan or a targeted search finds it.
    pub last_commit: Option<LastCommit>,
}

impl Contributor {
    /// A contributor fresh from the upstream listing, last commit unknown.
    pub fn new(username: impl Into<String>, avatar_url: impl Into<String>, contributions: u64) -> Self {
        Self {
            username: username.into(),
            email: None,
            avatar_url: avatar_url.into(),
            contributions,
            last_commit: None,
        }
    }
}
