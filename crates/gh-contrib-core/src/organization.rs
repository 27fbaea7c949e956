//! Organization-level aggregation
//!
//! An `Organization` owns the repository list for one named organization,
//! merges per-repository contributor maps into a single ranked list, and
//! resolves last commits lazily: only for the page of contributors actually
//! being returned. Full resolution can be delegated to a background
//! pre-loader that warms the persistent caches.

use crate::contributor::Contributor;
use crate::error::CoreError;
use crate::loader::{run_for_all, RepoTask};
use crate::repository::Repository;
use crate::services::Services;
use chrono::{DateTime, Utc};
use gh_contrib_client::ApiError;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct Organization {
    name: String,
    force_refresh: bool,
    repositories: Vec<Repository>,
    /// Ranked list, valid once `contributors_loaded` is true.
    contributors: Vec<Contributor>,
    contributors_loaded: bool,
    services: Services,
}

impl Organization {
    /// Fetch the organization's repository list and seed a `Repository` for
    /// every repository that has ever been pushed to.
    ///
    /// A refresh drops the registered background pre-loader and bypasses
    /// the per-repository caches. Commit-lookup entries of contributors in
    /// stale repositories are invalidated, since their last-commit data may
    /// no longer be current.
    pub async fn load(
        services: Services,
        name: &str,
        force_refresh: bool,
    ) -> Result<Self, CoreError> {
        if force_refresh {
            services.daemons.cancel(name);
        }

        let summaries = services
            .host
            .list_repositories(name)
            .await
            .map_err(|err| match err {
                ApiError::Upstream { status: 404, .. } => CoreError::OrganizationNotFound {
                    org: name.to_string(),
                },
                other => CoreError::Api(other),
            })?;

        let mut repositories = Vec::new();
        for summary in summaries {
            if let Some(last_push) = summary.pushed_at {
                repositories.push(Repository::new(
                    services.clone(),
                    name,
                    &summary.name,
                    &summary.url,
                    last_push,
                    force_refresh,
                ));
            }
        }
        debug!("{name}: {} repositories with push history", repositories.len());

        {
            let mut cache = services.commit_cache.lock().unwrap();
            let mut invalidated = false;
            for repo in &repositories {
                if repo.needs_load() && !repo.contributors().is_empty() {
                    for contributor in repo.contributors() {
                        invalidated |= cache
                            .remove(&Services::commit_key(name, &contributor.username))
                            .is_some();
                    }
                }
            }
            if invalidated {
                cache.save();
            }
        }

        Ok(Self {
            name: name.to_string(),
            force_refresh,
            repositories,
            contributors: Vec::new(),
            contributors_loaded: false,
            services,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn force_refresh(&self) -> bool {
        self.force_refresh
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// Ranked contributors; empty until the first load.
    pub fn contributors(&self) -> &[Contributor] {
        &self.contributors
    }

    pub fn total_contributors(&self) -> usize {
        self.contributors.len()
    }

    /// The most recent push across all repositories.
    pub fn last_changed(&self) -> Option<DateTime<Utc>> {
        self.repositories.iter().map(|r| r.last_push()).max()
    }

    /// Whether any repository has been pushed since `dt`.
    pub fn changed_since(&self, dt: DateTime<Utc>) -> bool {
        self.last_changed().is_some_and(|last| last > dt)
    }

    /// Load and rank the contributors of every repository. Memoized; last
    /// commits are left unresolved here so that ordering a ranking stays
    /// cheap and per-page resolution can happen lazily.
    pub async fn load_contributors(&mut self) -> Result<(), CoreError> {
        if self.contributors_loaded {
            return Ok(());
        }

        // The fan-out is purely a barrier: every repository is current when
        // it returns, and the merge below walks them in input order so that
        // ranking ties are deterministic.
        let repos = std::mem::take(&mut self.repositories);
        let (repos, outcome) = run_for_all(repos, RepoTask::Contributors).await;
        self.repositories = repos;
        outcome?;

        let mut merged: Vec<Contributor> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for repo in &self.repositories {
            for contributor in repo.contributors() {
                match index.get(&contributor.username) {
                    Some(&at) => merged[at].contributions += contributor.contributions,
                    None => {
                        index.insert(contributor.username.clone(), merged.len());
                        merged.push(Contributor {
                            last_commit: None,
                            ..contributor.clone()
                        });
                    }
                }
            }
        }
        merged.sort_by(|a, b| a.contributions.cmp(&b.contributions));
        merged.reverse();

        debug!("{}: merged {} contributors", self.name, merged.len());
        self.contributors = merged;
        self.contributors_loaded = true;
        Ok(())
    }

    /// One page of the ranking, `count` contributors per page, pages
    /// starting at 1. `count = 0` means the whole ranking.
    ///
    /// Last commits are resolved for the returned slice only: one fan-out
    /// restricted to the sliced usernames, then the most recent commit
    /// observed across repositories wins for each contributor.
    pub async fn get_top_contributors(
        &mut self,
        count: usize,
        page: usize,
    ) -> Result<(Vec<Contributor>, usize), CoreError> {
        self.load_contributors().await?;

        let total = self.contributors.len();
        let count = if count == 0 { total } else { count };
        if total == 0 || count == 0 {
            return Ok((Vec::new(), 0));
        }
        let num_pages = total.div_ceil(count);
        if page < 1 || page > num_pages {
            return Ok((Vec::new(), num_pages));
        }
        let start = (page - 1) * count;
        let end = (page * count).min(total);

        let wanted: HashSet<String> = self.contributors[start..end]
            .iter()
            .filter(|c| c.last_commit.is_none())
            .map(|c| c.username.clone())
            .collect();
        if !wanted.is_empty() {
            let repos = std::mem::take(&mut self.repositories);
            let (repos, outcome) = run_for_all(repos, RepoTask::LastCommits(wanted)).await;
            self.repositories = repos;
            outcome?;

            for at in start..end {
                let username = self.contributors[at].username.clone();
                let mut best = self.contributors[at]
                    .last_commit
                    .clone()
                    .map(|last| (self.contributors[at].email.clone(), last));
                for repo in &self.repositories {
                    let Some(candidate) = repo.contributor(&username) else {
                        continue;
                    };
                    let Some(last) = &candidate.last_commit else {
                        continue;
                    };
                    if best.as_ref().is_none_or(|(_, current)| last.date > current.date) {
                        best = Some((candidate.email.clone(), last.clone()));
                    }
                }
                if let Some((email, last)) = best {
                    let entry = &mut self.contributors[at];
                    entry.email = email;
                    entry.last_commit = Some(last);
                }
            }
        }

        Ok((self.contributors[start..end].to_vec(), num_pages))
    }

    /// Start a best-effort background task that resolves everything this
    /// organization still misses, warming the persistent caches for later
    /// requests. At most one pre-loader runs per organization name; a
    /// subsequent force refresh cancels it.
    pub fn daemon_loader(self) {
        let all_loaded = self.repositories.iter().all(|r| r.fully_loaded());
        if all_loaded || self.services.daemons.contains(&self.name) {
            return;
        }
        let registry = Arc::clone(&self.services.daemons);
        let name = self.name.clone();
        let mut org = self;
        let handle = tokio::spawn(async move {
            debug!("background pre-load for {} starting", org.name);
            if let Err(err) = org.get_top_contributors(0, 1).await {
                warn!("background pre-load for {} failed: {err}", org.name);
            }
        });
        registry.register(name, handle);
    }
}

impl std::fmt::Debug for Organization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Organization")
            .field("name", &self.name)
            .field("repositories", &self.repositories.len())
            .field("contributors_loaded", &self.contributors_loaded)
            .finish_non_exhaustive()
    }
}
