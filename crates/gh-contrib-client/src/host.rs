//! Hosting-platform seam
//!
//! `ContribHost` is the interface the aggregation core consumes. The real
//! implementation is [`crate::GithubApi`]; tests substitute in-memory
//! hosts. Any source-control hosting API exposing these four operations can
//! back the system.

use crate::error::ApiError;
use crate::types::{CommitHit, CommitRecord, ContributorRecord, RepoSummary};
use async_trait::async_trait;
use std::collections::VecDeque;

/// Upstream operations needed to aggregate contributor statistics.
///
/// List operations return fully flattened results (every continuation page
/// already followed). Commit history is paged explicitly through
/// [`ContribHost::commit_page`] so callers can stop scanning early.
#[async_trait]
pub trait ContribHost: Send + Sync {
    /// All repositories of `org`. A 404 means the organization does not
    /// exist; callers translate that into their own error kind.
    async fn list_repositories(&self, org: &str) -> Result<Vec<RepoSummary>, ApiError>;

    /// All contributors of the repository at `repo_url`, in upstream order
    /// (most contributions first).
    async fn list_contributors(&self, repo_url: &str) -> Result<Vec<ContributorRecord>, ApiError>;

    /// One page of commit history, newest first. `cursor` is `None` for the
    /// first page, afterwards the opaque cursor returned alongside the
    /// previous page. A `None` result cursor means the history is
    /// exhausted.
    async fn commit_page(
        &self,
        repo_url: &str,
        cursor: Option<&str>,
    ) -> Result<(Vec<CommitRecord>, Option<String>), ApiError>;

    /// The most recent commit authored by `username` anywhere in `org`.
    /// Served by a targeted search endpoint with a far stricter quota than
    /// the bulk listings.
    async fn search_last_commit(
        &self,
        org: &str,
        username: &str,
    ) -> Result<Option<CommitHit>, ApiError>;
}

/// A resumable newest-first walk over one repository's commit history.
///
/// The scan buffers one upstream page at a time and survives across calls,
/// so a caller that stops early continues from the same position later
/// instead of re-reading the head of the history.
#[derive(Debug)]
pub struct CommitScan {
    repo_url: String,
    buffer: VecDeque<CommitRecord>,
    cursor: Option<String>,
    started: bool,
}

impl CommitScan {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            buffer: VecDeque::new(),
            cursor: None,
            started: false,
        }
    }

    /// The next commit, fetching the next page when the buffer runs dry.
    /// `Ok(None)` means the history is exhausted.
    pub async fn next(&mut self, host: &dyn ContribHost) -> Result<Option<CommitRecord>, ApiError> {
        loop {
            if let Some(commit) = self.buffer.pop_front() {
                return Ok(Some(commit));
            }
            if self.started && self.cursor.is_none() {
                return Ok(None);
            }
            let cursor = self.cursor.take();
            let (page, next) = host.commit_page(&self.repo_url, cursor.as_deref()).await?;
            self.started = true;
            self.cursor = next;
            if page.is_empty() && self.cursor.is_none() {
                return Ok(None);
            }
            self.buffer.extend(page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommitDetail, CommitSig};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn commit(n: usize) -> CommitRecord {
        CommitRecord {
            author: None,
            committer: None,
            commit: CommitDetail {
                author: CommitSig {
                    date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    email: None,
                },
                committer: CommitSig {
                    date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    email: None,
                },
                message: format!("commit {n}"),
            },
        }
    }

    /// Serves fixed pages and records how often each cursor was requested.
    struct PagedHost {
        pages: Vec<Vec<CommitRecord>>,
        fetches: Mutex<usize>,
    }

    #[async_trait]
    impl ContribHost for PagedHost {
        async fn list_repositories(&self, _org: &str) -> Result<Vec<RepoSummary>, ApiError> {
            unimplemented!("not used by commit scans")
        }

        async fn list_contributors(
            &self,
            _repo_url: &str,
        ) -> Result<Vec<ContributorRecord>, ApiError> {
            unimplemented!("not used by commit scans")
        }

        async fn commit_page(
            &self,
            _repo_url: &str,
            cursor: Option<&str>,
        ) -> Result<(Vec<CommitRecord>, Option<String>), ApiError> {
            *self.fetches.lock().unwrap() += 1;
            let index: usize = cursor.map_or(0, |c| c.parse().unwrap());
            let page = self.pages.get(index).cloned().unwrap_or_default();
            let next = if index + 1 < self.pages.len() {
                Some((index + 1).to_string())
            } else {
                None
            };
            Ok((page, next))
        }

        async fn search_last_commit(
            &self,
            _org: &str,
            _username: &str,
        ) -> Result<Option<CommitHit>, ApiError> {
            unimplemented!("not used by commit scans")
        }
    }

    #[tokio::test]
    async fn scan_walks_pages_in_order_and_terminates() {
        let host = PagedHost {
            pages: vec![vec![commit(1), commit(2)], vec![commit(3)]],
            fetches: Mutex::new(0),
        };
        let mut scan = CommitScan::new("https://api.example.com/repos/acme/widget");

        let mut messages = Vec::new();
        while let Some(c) = scan.next(&host).await.unwrap() {
            messages.push(c.commit.message);
        }

        assert_eq!(messages, vec!["commit 1", "commit 2", "commit 3"]);
        assert_eq!(*host.fetches.lock().unwrap(), 2);
        // Exhausted scans stay exhausted without refetching.
        assert!(scan.next(&host).await.unwrap().is_none());
        assert_eq!(*host.fetches.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn scan_resumes_where_it_stopped() {
        let host = PagedHost {
            pages: vec![vec![commit(1)], vec![commit(2)]],
            fetches: Mutex::new(0),
        };
        let mut scan = CommitScan::new("https://api.example.com/repos/acme/widget");

        let first = scan.next(&host).await.unwrap().unwrap();
        assert_eq!(first.commit.message, "commit 1");

        // A later call picks up with the second page, not the first commit.
        let second = scan.next(&host).await.unwrap().unwrap();
        assert_eq!(second.commit.message, "commit 2");
    }

    #[tokio::test]
    async fn empty_history_yields_nothing() {
        let host = PagedHost {
            pages: vec![vec![]],
            fetches: Mutex::new(0),
        };
        let mut scan = CommitScan::new("https://api.example.com/repos/acme/empty");
        assert!(scan.next(&host).await.unwrap().is_none());
    }
}
