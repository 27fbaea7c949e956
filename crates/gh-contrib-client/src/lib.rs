//! Rate-limit-aware client for organization contributor statistics
//!
//! This crate provides the upstream-facing half of the system: a
//! trait-based seam over the hosting platform's API and a GitHub-backed
//! implementation that tracks the request quota process-wide.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               ContribHost trait                  │
//! │  - list_repositories()                           │
//! │  - list_contributors()                           │
//! │  - commit_page()                                 │
//! │  - search_last_commit()                          │
//! └─────────────────────────────────────────────────┘
//!                        │
//!                        ▼
//!               ┌─────────────────┐
//!               │    GithubApi    │──── RateState (one lock,
//!               │  (reqwest GET)  │      shared by all clones)
//!               └─────────────────┘
//! ```
//!
//! The aggregation core in `gh-contrib-core` only ever sees the trait, so
//! tests drive it with in-memory hosts and never touch the network.

pub mod error;
pub mod github;
pub mod host;
pub mod rate;
pub mod types;

/// Default upstream API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

pub use error::ApiError;
pub use github::GithubApi;
pub use host::{CommitScan, ContribHost};
pub use rate::{RateSnapshot, RateState};
pub use types::{
    ActorRef, CommitDetail, CommitHit, CommitRecord, CommitSig, ContributorRecord, RepoSummary,
    SearchResults,
};
