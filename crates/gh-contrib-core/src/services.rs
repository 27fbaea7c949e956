//! Long-lived shared services
//!
//! Everything with process lifetime lives here and is passed by handle into
//! `Repository`/`Organization` constructors: the hosting client, the two
//! persistent caches, and the background pre-loader registry. No ambient
//! singletons, so tests build isolated instances.

use crate::contributor::{Contributor, LastCommit};
use chrono::{DateTime, Utc};
use gh_contrib_cache::StoredLruCache;
use gh_contrib_client::ContribHost;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Weight budget of the repository contributor cache, measured in stored
/// contributors.
pub const REPO_CACHE_BUDGET: usize = 10_000;

/// Entry budget of the commit lookup cache.
pub const COMMIT_CACHE_BUDGET: usize = 100_000;

/// Snapshot file names under the data directory.
pub const REPO_CACHE_FILE: &str = "repository.cache";
pub const COMMIT_CACHE_FILE: &str = "org.cache";

/// Cached state of one repository: the push timestamp the contributors were
/// loaded under, plus the contributors themselves in upstream order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRepo {
    pub last_push: DateTime<Utc>,
    pub contributors: Vec<Contributor>,
}

/// Cached result of one targeted commit search, keyed `org/username`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCommit {
    pub email: Option<String>,
    pub last_commit: LastCommit,
}

pub type RepoCache = StoredLruCache<CachedRepo>;
pub type CommitLookupCache = StoredLruCache<CachedCommit>;

/// Slot cost of a repository record is its data volume, not one unit.
fn cached_repo_weight(record: &CachedRepo) -> usize {
    record.contributors.len()
}

/// Registry of background pre-loader tasks, at most one per organization
/// name. Handles are supervised: a force refresh aborts the stale task
/// instead of leaking it.
#[derive(Debug, Default)]
pub struct DaemonRegistry {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl DaemonRegistry {
    pub fn contains(&self, org: &str) -> bool {
        self.tasks.lock().unwrap().contains_key(org)
    }

    /// Register a running pre-loader. A concurrently registered task for
    /// the same name is replaced and detached (it runs to completion, its
    /// registration is simply superseded).
    pub fn register(&self, org: String, handle: JoinHandle<()>) {
        self.tasks.lock().unwrap().insert(org, handle);
    }

    /// Abort and forget the pre-loader for `org`, if any.
    pub fn cancel(&self, org: &str) {
        if let Some(handle) = self.tasks.lock().unwrap().remove(org) {
            debug!("cancelling background pre-loader for {org}");
            handle.abort();
        }
    }
}

/// Handle bundle injected into `Repository` and `Organization`.
#[derive(Clone)]
pub struct Services {
    pub host: Arc<dyn ContribHost>,
    pub repo_cache: Arc<Mutex<RepoCache>>,
    pub commit_cache: Arc<Mutex<CommitLookupCache>>,
    pub daemons: Arc<DaemonRegistry>,
}

impl Services {
    /// Services with persistent caches snapshotted under `data_dir`.
    pub fn new(host: Arc<dyn ContribHost>, data_dir: &Path) -> Self {
        let repo_cache = RepoCache::with_snapshot(
            data_dir.join(REPO_CACHE_FILE),
            REPO_CACHE_BUDGET,
            cached_repo_weight,
        );
        let commit_cache = CommitLookupCache::with_snapshot(
            data_dir.join(COMMIT_CACHE_FILE),
            COMMIT_CACHE_BUDGET,
            |_| 1,
        );
        Self::assemble(host, repo_cache, commit_cache)
    }

    /// Services with purely in-memory caches; used by tests and useful for
    /// ephemeral deployments.
    pub fn in_memory(host: Arc<dyn ContribHost>) -> Self {
        let repo_cache = RepoCache::with_weigher(REPO_CACHE_BUDGET, cached_repo_weight);
        let commit_cache = CommitLookupCache::new(COMMIT_CACHE_BUDGET);
        Self::assemble(host, repo_cache, commit_cache)
    }

    fn assemble(
        host: Arc<dyn ContribHost>,
        repo_cache: RepoCache,
        commit_cache: CommitLookupCache,
    ) -> Self {
        Self {
            host,
            repo_cache: Arc::new(Mutex::new(repo_cache)),
            commit_cache: Arc::new(Mutex::new(commit_cache)),
            daemons: Arc::new(DaemonRegistry::default()),
        }
    }

    /// Key of the commit lookup cache.
    pub fn commit_key(org: &str, username: &str) -> String {
        format!("{org}/{username}")
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("repo_cache", &self.repo_cache)
            .field("commit_cache", &self.commit_cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Repository;
    use crate::testing::{day, record, MockHost, REPO_URL};

    #[tokio::test]
    async fn snapshots_survive_a_process_restart() {
        let dir = tempfile::tempdir().unwrap();
        let host = MockHost::new().with_contributors(REPO_URL, vec![record("alice", 5)]);

        {
            let services = Services::new(Arc::new(host.clone()), dir.path());
            let mut repo =
                Repository::new(services, "acme", "widget", REPO_URL, day(10), false);
            repo.load_contributors().await.unwrap();
        }

        // A second service instance reads the snapshot back from disk, so
        // the warm repository has nothing to fetch.
        let services = Services::new(Arc::new(host.clone()), dir.path());
        let repo = Repository::new(services, "acme", "widget", REPO_URL, day(10), false);
        assert!(!repo.needs_load());
        assert_eq!(repo.contributors().len(), 1);
        assert_eq!(host.contributor_lists(), 1);
    }

    #[tokio::test]
    async fn daemon_registry_tracks_one_task_per_org() {
        let registry = DaemonRegistry::default();
        assert!(!registry.contains("acme"));

        registry.register("acme".into(), tokio::spawn(std::future::pending::<()>()));
        assert!(registry.contains("acme"));
        assert!(!registry.contains("globex"));

        registry.cancel("acme");
        assert!(!registry.contains("acme"));
        // Cancelling an unknown name is a no-op.
        registry.cancel("acme");
    }
}
