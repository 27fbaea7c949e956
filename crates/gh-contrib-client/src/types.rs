//! Upstream API data transfer objects
//!
//! These mirror the wire shapes of the consumed endpoints and are kept
//! separate from the domain model in `gh-contrib-core`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One repository from the organization listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoSummary {
    pub name: String,

    /// Canonical API URL of the repository; the unique key everywhere.
    pub url: String,

    /// Empty repositories have never been pushed to.
    pub pushed_at: Option<DateTime<Utc>>,
}

/// One entry from the contributor listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributorRecord {
    pub login: String,
    pub avatar_url: String,
    pub contributions: u64,
}

/// A commit from the history listing or from commit search.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitRecord {
    /// Platform account of the author; null for unmapped emails.
    pub author: Option<ActorRef>,
    /// Platform account of the committer; null for unmapped emails.
    pub committer: Option<ActorRef>,
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorRef {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub author: CommitSig,
    pub committer: CommitSig,
    pub message: String,
}

/// The git-level signature inside a commit object.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitSig {
    pub date: DateTime<Utc>,
    pub email: Option<String>,
}

/// Envelope of the commit search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResults {
    pub items: Vec<CommitRecord>,
}

/// The resolved "most recent commit" of one contributor.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitHit {
    pub message: String,
    pub date: DateTime<Utc>,
    pub email: Option<String>,
}
