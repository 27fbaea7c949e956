//! Shared in-memory host fixture for the crate's tests.
//!
//! `MockHost` is cheap to clone and shares its interior, so a test keeps a
//! handle for assertions (request counters, live data swaps) after handing
//! a clone to [`Services`].

use crate::services::Services;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use gh_contrib_client::{
    ActorRef, ApiError, CommitDetail, CommitHit, CommitRecord, CommitSig, ContribHost,
    ContributorRecord, RepoSummary,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) const REPO_URL: &str = "https://api.example.com/repos/acme/widget";

const PAGE_SIZE: usize = 100;

pub(crate) fn repo_url(name: &str) -> String {
    format!("https://api.example.com/repos/acme/{name}")
}

pub(crate) fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

pub(crate) fn record(login: &str, contributions: u64) -> ContributorRecord {
    ContributorRecord {
        login: login.to_string(),
        avatar_url: format!("https://avatars.example.com/{login}"),
        contributions,
    }
}

fn sig(login: &str, date: DateTime<Utc>) -> CommitSig {
    CommitSig {
        date,
        email: Some(format!("{login}@example.com")),
    }
}

/// A commit whose platform author is `login`.
pub(crate) fn authored(login: &str, date: DateTime<Utc>, message: &str) -> CommitRecord {
    CommitRecord {
        author: Some(ActorRef {
            login: login.to_string(),
        }),
        committer: None,
        commit: CommitDetail {
            author: sig(login, date),
            committer: sig(login, date),
            message: message.to_string(),
        },
    }
}

/// A commit whose platform committer is `login` and whose author account is
/// unmapped.
pub(crate) fn committed(login: &str, date: DateTime<Utc>, message: &str) -> CommitRecord {
    CommitRecord {
        author: None,
        committer: Some(ActorRef {
            login: login.to_string(),
        }),
        commit: CommitDetail {
            author: sig("unmapped", date),
            committer: sig(login, date),
            message: message.to_string(),
        },
    }
}

enum Failure {
    Quota,
    Status(u16),
}

impl Failure {
    fn to_error(&self) -> ApiError {
        match self {
            Failure::Quota => ApiError::QuotaExceeded {
                reset_at: Utc::now() + chrono::Duration::seconds(60),
                wait_secs: 60,
            },
            Failure::Status(status) => ApiError::Upstream {
                status: *status,
                message: "injected failure".into(),
            },
        }
    }
}

#[derive(Default)]
struct Inner {
    repos: Mutex<Vec<RepoSummary>>,
    contributors: Mutex<HashMap<String, Vec<ContributorRecord>>>,
    commits: Mutex<HashMap<String, Vec<CommitRecord>>>,
    search_hits: Mutex<HashMap<String, CommitHit>>,
    repo_list_failure: Mutex<Option<Failure>>,
    contributor_failures: Mutex<HashMap<String, Failure>>,
    commit_page_failures: Mutex<HashMap<String, usize>>,
    repo_lists: AtomicUsize,
    contributor_lists: AtomicUsize,
    commit_pages: AtomicUsize,
    searches: AtomicUsize,
}

#[derive(Clone, Default)]
pub(crate) struct MockHost {
    inner: Arc<Inner>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Services backed by a clone of this host and in-memory caches.
    pub fn services(&self) -> Services {
        Services::in_memory(Arc::new(self.clone()))
    }

    pub fn with_repo(self, name: &str, pushed: DateTime<Utc>) -> Self {
        self.inner.repos.lock().unwrap().push(RepoSummary {
            name: name.to_string(),
            url: repo_url(name),
            pushed_at: Some(pushed),
        });
        self
    }

    pub fn with_unpushed_repo(self, name: &str) -> Self {
        self.inner.repos.lock().unwrap().push(RepoSummary {
            name: name.to_string(),
            url: repo_url(name),
            pushed_at: None,
        });
        self
    }

    pub fn with_contributors(self, url: &str, records: Vec<ContributorRecord>) -> Self {
        self.set_contributors(url, records);
        self
    }

    pub fn set_contributors(&self, url: &str, records: Vec<ContributorRecord>) {
        self.inner
            .contributors
            .lock()
            .unwrap()
            .insert(url.to_string(), records);
    }

    pub fn with_commits(self, url: &str, commits: Vec<CommitRecord>) -> Self {
        self.inner
            .commits
            .lock()
            .unwrap()
            .insert(url.to_string(), commits);
        self
    }

    pub fn with_search_hit(self, login: &str, date: DateTime<Utc>, message: &str) -> Self {
        self.inner.search_hits.lock().unwrap().insert(
            login.to_string(),
            CommitHit {
                message: message.to_string(),
                date,
                email: Some(format!("{login}@example.com")),
            },
        );
        self
    }

    pub fn with_repo_list_failure(self, status: u16) -> Self {
        *self.inner.repo_list_failure.lock().unwrap() = Some(Failure::Status(status));
        self
    }

    pub fn with_contributors_failure(self, url: &str, status: u16) -> Self {
        self.inner
            .contributor_failures
            .lock()
            .unwrap()
            .insert(url.to_string(), Failure::Status(status));
        self
    }

    pub fn with_contributors_quota_failure(self, url: &str) -> Self {
        self.inner
            .contributor_failures
            .lock()
            .unwrap()
            .insert(url.to_string(), Failure::Quota);
        self
    }

    pub fn with_commit_page_failure(self, url: &str, page: usize) -> Self {
        self.inner
            .commit_page_failures
            .lock()
            .unwrap()
            .insert(url.to_string(), page);
        self
    }

    pub fn repo_lists(&self) -> usize {
        self.inner.repo_lists.load(Ordering::SeqCst)
    }

    pub fn contributor_lists(&self) -> usize {
        self.inner.contributor_lists.load(Ordering::SeqCst)
    }

    pub fn commit_pages(&self) -> usize {
        self.inner.commit_pages.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.inner.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContribHost for MockHost {
    async fn list_repositories(&self, _org: &str) -> Result<Vec<RepoSummary>, ApiError> {
        self.inner.repo_lists.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &*self.inner.repo_list_failure.lock().unwrap() {
            return Err(failure.to_error());
        }
        Ok(self.inner.repos.lock().unwrap().clone())
    }

    async fn list_contributors(&self, repo_url: &str) -> Result<Vec<ContributorRecord>, ApiError> {
        self.inner.contributor_lists.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.inner.contributor_failures.lock().unwrap().get(repo_url) {
            return Err(failure.to_error());
        }
        Ok(self
            .inner
            .contributors
            .lock()
            .unwrap()
            .get(repo_url)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit_page(
        &self,
        repo_url: &str,
        cursor: Option<&str>,
    ) -> Result<(Vec<CommitRecord>, Option<String>), ApiError> {
        self.inner.commit_pages.fetch_add(1, Ordering::SeqCst);
        let page_index: usize = cursor.map_or(0, |c| c.parse().expect("numeric cursor"));
        if self
            .inner
            .commit_page_failures
            .lock()
            .unwrap()
            .get(repo_url)
            == Some(&page_index)
        {
            return Err(ApiError::Upstream {
                status: 500,
                message: "injected page failure".into(),
            });
        }
        let all = self
            .inner
            .commits
            .lock()
            .unwrap()
            .get(repo_url)
            .cloned()
            .unwrap_or_default();
        let start = page_index * PAGE_SIZE;
        let page: Vec<CommitRecord> = all.iter().skip(start).take(PAGE_SIZE).cloned().collect();
        let next = if start + PAGE_SIZE < all.len() {
            Some((page_index + 1).to_string())
        } else {
            None
        };
        Ok((page, next))
    }

    async fn search_last_commit(
        &self,
        _org: &str,
        username: &str,
    ) -> Result<Option<CommitHit>, ApiError> {
        self.inner.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.search_hits.lock().unwrap().get(username).cloned())
    }
}
