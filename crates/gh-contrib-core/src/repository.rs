//! Per-repository contributor state
//!
//! A `Repository` decides staleness from the organization-reported push
//! timestamp, reloads its contributor list when stale, and backfills each
//! contributor's most recent commit incrementally: a resumable newest-first
//! history scan that switches to targeted per-contributor search once the
//! scan stops paying for itself.

use crate::contributor::{Contributor, LastCommit};
use crate::error::CoreError;
use crate::services::{CachedCommit, CachedRepo, Services};
use chrono::{DateTime, Utc};
use gh_contrib_client::{ApiError, CommitHit, CommitScan};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Commits per scan window when judging the hit ratio.
const SCAN_WINDOW: u64 = 100;

/// The history scan is abandoned once resolutions per window drop below
/// this ratio. Empirically tuned together with [`DIRECT_SEARCH_LIMIT`]; do
/// not retune one without the other.
const MIN_HIT_RATIO: f64 = 0.25;

/// Direct search only takes over while this few usernames remain, since
/// the search endpoint has a far stricter quota than the bulk listings.
const DIRECT_SEARCH_LIMIT: usize = 10;

pub struct Repository {
    name: String,
    url: String,
    org: String,
    last_push: DateTime<Utc>,
    needs_load: bool,
    /// Upstream order (most contributions first).
    contributors: Vec<Contributor>,
    /// Usernames whose `last_commit` is still unresolved. Shrinks only as
    /// commits are discovered or the direct-search fallback drains it.
    pending_update: HashSet<String>,
    /// Survives across `load_last_commits` calls so a later call continues
    /// where the previous one stopped.
    scan: Option<CommitScan>,
    services: Services,
}

impl Repository {
    /// Seed the repository from the persistent cache and decide staleness:
    /// the cached contributor set is current exactly when the cached push
    /// timestamp matches the organization-reported one.
    pub fn new(
        services: Services,
        org: &str,
        name: &str,
        url: &str,
        last_push: DateTime<Utc>,
        force_refresh: bool,
    ) -> Self {
        let cached: Option<CachedRepo> = {
            let mut cache = services.repo_cache.lock().unwrap();
            if force_refresh {
                cache.remove(url);
                None
            } else {
                cache.get(url).cloned()
            }
        };
        let (cached_push, contributors) = match cached {
            Some(record) => (Some(record.last_push), record.contributors),
            None => (None, Vec::new()),
        };
        let needs_load = cached_push != Some(last_push);
        let mut pending_update = HashSet::new();
        if !needs_load {
            for contributor in &contributors {
                if contributor.last_commit.is_none() {
                    pending_update.insert(contributor.username.clone());
                }
            }
        }

        Self {
            name: name.to_string(),
            url: url.to_string(),
            org: org.to_string(),
            last_push,
            needs_load,
            contributors,
            pending_update,
            scan: None,
            services,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn last_push(&self) -> DateTime<Utc> {
        self.last_push
    }

    pub fn needs_load(&self) -> bool {
        self.needs_load
    }

    /// Nothing left to fetch: contributors are current and every last
    /// commit is resolved.
    pub fn fully_loaded(&self) -> bool {
        !self.needs_load && self.pending_update.is_empty()
    }

    pub fn contributors(&self) -> &[Contributor] {
        &self.contributors
    }

    pub fn contributor(&self, username: &str) -> Option<&Contributor> {
        self.contributors.iter().find(|c| c.username == username)
    }

    pub fn pending_update(&self) -> &HashSet<String> {
        &self.pending_update
    }

    /// Persist `(last_push, contributors)` to the repository cache.
    fn store(&self) {
        let mut cache = self.services.repo_cache.lock().unwrap();
        cache.set(
            self.url.clone(),
            CachedRepo {
                last_push: self.last_push,
                contributors: self.contributors.clone(),
            },
        );
        cache.save();
    }

    /// Fetch the full contributor list if the cached one is stale.
    ///
    /// Contributors whose contribution count is unchanged keep their cached
    /// email and last commit; everyone else starts unresolved. On a fresh
    /// repository this only recomputes `pending_update`.
    pub async fn load_contributors(&mut self) -> Result<(), CoreError> {
        if !self.needs_load {
            self.pending_update = self
                .contributors
                .iter()
                .filter(|c| c.last_commit.is_none())
                .map(|c| c.username.clone())
                .collect();
            return Ok(());
        }

        let fetched = self
            .services
            .host
            .list_contributors(&self.url)
            .await
            .map_err(|err| match err {
                ApiError::QuotaExceeded { .. } => CoreError::Api(err),
                other => CoreError::RepositoryLoad {
                    repo: self.name.clone(),
                    source: other,
                },
            })?;

        let mut fresh = Vec::with_capacity(fetched.len());
        let mut pending = HashSet::new();
        for record in fetched {
            let carried = self
                .contributor(&record.login)
                .filter(|previous| previous.contributions == record.contributions);
            let (email, last_commit) = match carried {
                Some(previous) => (previous.email.clone(), previous.last_commit.clone()),
                None => (None, None),
            };
            if last_commit.is_none() {
                pending.insert(record.login.clone());
            }
            fresh.push(Contributor {
                username: record.login,
                email,
                avatar_url: record.avatar_url,
                contributions: record.contributions,
                last_commit,
            });
        }

        debug!(
            "loaded {} contributors for {}, {} need a last commit",
            fresh.len(),
            self.name,
            pending.len()
        );
        self.contributors = fresh;
        self.pending_update = pending;
        self.needs_load = false;
        self.store();
        Ok(())
    }

    /// Resolve last commits for `pending_update`, optionally restricted to
    /// `only`, by scanning the commit history newest-first.
    ///
    /// The scan stops as soon as the targeted set is drained, and abandons
    /// history in favor of direct per-contributor search once the hit ratio
    /// falls under [`MIN_HIT_RATIO`] with at most [`DIRECT_SEARCH_LIMIT`]
    /// names outstanding. State is persisted whether the call succeeds,
    /// short-circuits, or fails partway.
    pub async fn load_last_commits(
        &mut self,
        only: Option<&HashSet<String>>,
    ) -> Result<(), CoreError> {
        if self.pending_update.is_empty()
            || only.is_some_and(|o| o.is_disjoint(&self.pending_update))
        {
            return Ok(());
        }

        let host = Arc::clone(&self.services.host);
        let mut scan = self
            .scan
            .take()
            .unwrap_or_else(|| CommitScan::new(self.url.clone()));
        let mut count: u64 = 0;
        // Seeded at 1 so the ratio is defined before the first resolution.
        let mut found: u64 = 1;

        let outcome = loop {
            if self.needed_count(only) == 0 {
                break Ok(());
            }
            let commit = match scan.next(host.as_ref()).await {
                Ok(Some(commit)) => commit,
                Ok(None) => break Ok(()),
                Err(err) => {
                    error!(
                        "commit scan of {} failed after {count} commits, \
                         {} contributors unresolved: {err}",
                        self.name,
                        self.pending_update.len()
                    );
                    break Err(CoreError::Api(err));
                }
            };
            count += 1;

            let matched = if let Some(author) = commit
                .author
                .as_ref()
                .filter(|a| self.pending_update.contains(&a.login))
            {
                Some((author.login.clone(), &commit.commit.author))
            } else {
                commit
                    .committer
                    .as_ref()
                    .filter(|c| self.pending_update.contains(&c.login))
                    .map(|c| (c.login.clone(), &commit.commit.committer))
            };

            if let Some((login, sig)) = matched {
                let last_commit = LastCommit {
                    message: commit.commit.message.clone(),
                    date: sig.date,
                };
                self.apply_resolution(&login, sig.email.clone(), last_commit);
                self.pending_update.remove(&login);
                if only.is_none_or(|o| o.contains(&login)) {
                    found += 1;
                }
            }

            let needed = self.needed_count(only);
            if needed == 0 {
                break Ok(());
            }
            let windows = count.div_ceil(SCAN_WINDOW);
            if (found as f64) / (windows as f64) < MIN_HIT_RATIO && needed <= DIRECT_SEARCH_LIMIT {
                info!(
                    "hit ratio {found}/{windows} below threshold scanning {}, \
                     switching to direct search for {needed} contributors",
                    self.name
                );
                break self.direct_search(only).await;
            }
        };

        self.scan = Some(scan);
        self.store();
        outcome
    }

    /// Usernames still targeted by this call.
    fn needed_count(&self, only: Option<&HashSet<String>>) -> usize {
        match only {
            Some(o) => self.pending_update.iter().filter(|u| o.contains(*u)).count(),
            None => self.pending_update.len(),
        }
    }

    fn apply_resolution(&mut self, username: &str, email: Option<String>, last_commit: LastCommit) {
        if let Some(entry) = self.contributors.iter_mut().find(|c| c.username == username) {
            entry.email = email;
            entry.last_commit = Some(last_commit);
        }
    }

    /// Resolve the remaining targeted usernames with one targeted search
    /// query each, issued concurrently, consulting the organization-level
    /// commit lookup cache first.
    async fn direct_search(&mut self, only: Option<&HashSet<String>>) -> Result<(), CoreError> {
        let targets: Vec<String> = match only {
            Some(o) => self
                .pending_update
                .iter()
                .filter(|u| o.contains(*u))
                .cloned()
                .collect(),
            None => self.pending_update.iter().cloned().collect(),
        };

        let mut misses = Vec::new();
        for username in &targets {
            let cached = {
                let mut cache = self.services.commit_cache.lock().unwrap();
                cache.get(&Services::commit_key(&self.org, username)).cloned()
            };
            match cached {
                Some(record) => {
                    debug!("commit lookup cache hit for {}/{username}", self.org);
                    self.apply_resolution(username, record.email, record.last_commit);
                }
                None => misses.push(username.clone()),
            }
            self.pending_update.remove(username);
        }
        if misses.is_empty() {
            return Ok(());
        }

        info!(
            "direct search for {} contributors of {}",
            misses.len(),
            self.name
        );
        let mut workers: JoinSet<(String, Result<Option<CommitHit>, ApiError>)> = JoinSet::new();
        for username in misses {
            let host = Arc::clone(&self.services.host);
            let org = self.org.clone();
            workers.spawn(async move {
                let hit = host.search_last_commit(&org, &username).await;
                (username, hit)
            });
        }

        let mut first_err: Option<ApiError> = None;
        while let Some(joined) = workers.join_next().await {
            let Ok((username, outcome)) = joined else {
                error!("direct search worker for {} panicked", self.name);
                continue;
            };
            match outcome {
                Ok(Some(hit)) => {
                    let last_commit = LastCommit {
                        message: hit.message,
                        date: hit.date,
                    };
                    let record = CachedCommit {
                        email: hit.email.clone(),
                        last_commit: last_commit.clone(),
                    };
                    self.apply_resolution(&username, hit.email, last_commit);
                    let mut cache = self.services.commit_cache.lock().unwrap();
                    cache.set(Services::commit_key(&self.org, &username), record);
                    cache.save();
                }
                Ok(None) => debug!("no commits found for {username} in {}", self.org),
                Err(err) => {
                    warn!("direct search for {username} in {} failed: {err}", self.org);
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
        match first_err {
            Some(err) => Err(CoreError::Api(err)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("last_push", &self.last_push)
            .field("needs_load", &self.needs_load)
            .field("contributors", &self.contributors.len())
            .field("pending_update", &self.pending_update.len())
            .finish_non_exhaustive()
    }
}
