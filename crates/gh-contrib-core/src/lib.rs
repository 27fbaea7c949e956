//! Staleness-aware contributor aggregation and ranking
//!
//! The engine behind the organization statistics service: per-repository
//! contributor state seeded from a persistent cache, concurrent fan-out
//! across all repositories of an organization, merged ranking with lazy
//! last-commit resolution, and a supervised background pre-loader.
//!
//! # Data flow
//!
//! ```text
//! Organization::load ──> Repository::new (staleness from push timestamps)
//!        │
//!        ▼
//! load_contributors ──> fan-out barrier ──> merge + rank
//!        │
//!        ▼
//! get_top_contributors ──> fan-out "last commits for page slice"
//!                              │
//!                              ├─ commit history scan (resumable)
//!                              └─ direct search fallback + lookup cache
//! ```
//!
//! Everything long-lived (hosting client, caches, daemon registry) is
//! bundled in [`Services`] and injected, never ambient.

pub mod contributor;
pub mod error;
pub mod loader;
pub mod organization;
pub mod repository;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use contributor::{Contributor, LastCommit};
pub use error::CoreError;
pub use loader::{run_for_all, RepoTask, FANOUT_CAP};
pub use organization::Organization;
pub use repository::Repository;
pub use services::{
    CachedCommit, CachedRepo, CommitLookupCache, DaemonRegistry, RepoCache, Services,
    COMMIT_CACHE_BUDGET, COMMIT_CACHE_FILE, REPO_CACHE_BUDGET, REPO_CACHE_FILE,
};
