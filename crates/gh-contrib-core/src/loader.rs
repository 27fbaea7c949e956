//! Concurrent per-repository fan-out
//!
//! One worker per repository, bounded by a semaphore so very large
//! organizations cannot spawn unbounded work. Workers never share a
//! repository; distinct repositories only meet in the internally
//! synchronized caches. Draining the set is the synchronization barrier
//! callers rely on ("all repositories reached this stage").

use crate::error::CoreError;
use crate::repository::Repository;
use log::{debug, error, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Upper bound on concurrently running repository workers.
pub const FANOUT_CAP: usize = 32;

/// One operation applied to every repository of an organization.
#[derive(Debug, Clone)]
pub enum RepoTask {
    /// Refresh the contributor list (no-op for fresh repositories).
    Contributors,
    /// Resolve last commits, restricted to the given usernames.
    LastCommits(HashSet<String>),
}

/// Apply `task` to every repository in parallel and wait for all of them.
///
/// Repositories come back in input order together with the first failure,
/// if any; quota exhaustion wins over other failures so the caller aborts
/// the round with the right signal. Work already persisted by individual
/// workers stays valid either way.
pub async fn run_for_all(
    repos: Vec<Repository>,
    task: RepoTask,
) -> (Vec<Repository>, Result<(), CoreError>) {
    if repos.is_empty() {
        return (repos, Ok(()));
    }
    let cap = repos.len().min(FANOUT_CAP);
    let semaphore = Arc::new(Semaphore::new(cap));
    let task = Arc::new(task);

    let mut workers: JoinSet<(usize, Repository, Result<(), CoreError>)> = JoinSet::new();
    for (index, mut repo) in repos.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let task = Arc::clone(&task);
        workers.spawn(async move {
            // The semaphore is never closed; a failed acquire only means
            // this worker runs unthrottled.
            let _permit = semaphore.acquire_owned().await.ok();
            let result = match task.as_ref() {
                RepoTask::Contributors => repo.load_contributors().await,
                RepoTask::LastCommits(only) => repo.load_last_commits(Some(only)).await,
            };
            (index, repo, result)
        });
    }

    let mut finished: Vec<(usize, Repository)> = Vec::with_capacity(workers.len());
    let mut failure: Option<CoreError> = None;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((index, repo, result)) => {
                debug!("repository {} finished its fan-out task", repo.name());
                if let Err(err) = result {
                    match &mut failure {
                        None => failure = Some(err),
                        Some(existing) if err.is_quota() && !existing.is_quota() => {
                            *existing = err;
                        }
                        Some(_) => warn!("suppressing additional fan-out failure: {err}"),
                    }
                }
                finished.push((index, repo));
            }
            Err(join_err) => {
                // A panicked worker loses its repository for this round;
                // the next construction restores it from the cache.
                error!("fan-out worker panicked: {join_err}");
            }
        }
    }
    finished.sort_by_key(|(index, _)| *index);
    let repos = finished.into_iter().map(|(_, repo)| repo).collect();
    match failure {
        Some(err) => (repos, Err(err)),
        None => (repos, Ok(())),
    }
}
