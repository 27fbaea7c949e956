//! GitHub-backed implementation of the hosting seam
//!
//! A thin transport over the REST API that tracks the request quota from
//! every response's rate-limit headers and follows RFC 5988 `Link`
//! continuation until a listing is exhausted. The typed GitHub clients hide
//! exactly these two things, which is why this crate talks HTTP directly.

use crate::error::ApiError;
use crate::host::ContribHost;
use crate::rate::{RateSnapshot, RateState};
use crate::types::{CommitHit, CommitRecord, ContributorRecord, RepoSummary, SearchResults};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// v3 media type plus the commit-search preview type.
const ACCEPT_MEDIA: &str =
    "application/vnd.github.v3+json, application/vnd.github.cloak-preview+json";

const USER_AGENT: &str = concat!("gh-contrib/", env!("CARGO_PKG_VERSION"));

const PER_PAGE: &str = "100";

/// Rate-limit-aware GitHub API client.
///
/// Cheap to clone; all clones share one [`RateState`].
#[derive(Debug, Clone)]
pub struct GithubApi {
    http: reqwest::Client,
    base_url: String,
    rate: Arc<RateState>,
}

impl GithubApi {
    /// Build a client against `base_url` (e.g. `https://api.github.com`),
    /// authenticating with `token` when given.
    pub fn new(base_url: &str, token: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("token {token}"))
                .context("GITHUB_TOKEN contains invalid header characters")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate: Arc::new(RateState::default()),
        })
    }

    /// Current quota and request-counter values.
    pub fn rate(&self) -> RateSnapshot {
        self.rate.snapshot()
    }

    /// Issue one GET, update the shared rate state from the response
    /// headers, and classify any non-2xx status.
    async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, ApiError> {
        self.rate.count_request();
        debug!("GET {url}");

        let mut request = self.http.get(url);
        if !params.is_empty() {
            request = request.query(params);
        }
        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        let headers = response.headers();
        self.rate.record(
            header_num(headers, "x-ratelimit-remaining"),
            header_num(headers, "x-ratelimit-reset"),
        );

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("message").and_then(|m| m.as_str()).map(String::from));
            return Err(classify_failure(
                url,
                status,
                self.rate.remaining(),
                self.rate.reset_at(),
                message,
            ));
        }
        Ok(response)
    }

    /// One page of a listing plus the continuation link, if any.
    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<(Vec<T>, Option<String>), ApiError> {
        let response = self.get(url, params).await?;
        let next = next_link(response.headers());
        let body = response.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        // The upstream answers 202 with an empty body while contributor
        // statistics are still being computed; an undecodable page counts
        // as empty.
        let items = match serde_json::from_str(&body) {
            Ok(items) => items,
            Err(err) => {
                debug!("undecodable page from {url}: {err}");
                Vec::new()
            }
        };
        Ok((items, next))
    }

    /// Follow continuation links until the listing is exhausted.
    async fn fetch_all<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, ApiError> {
        let params = [("per_page", PER_PAGE.to_string())];
        let (mut items, mut next) = self.get_page(url, &params).await?;
        while let Some(page_url) = next {
            let (mut page, cursor) = self.get_page(&page_url, &[]).await?;
            items.append(&mut page);
            next = cursor;
        }
        Ok(items)
    }
}

#[async_trait]
impl ContribHost for GithubApi {
    async fn list_repositories(&self, org: &str) -> Result<Vec<RepoSummary>, ApiError> {
        self.fetch_all(&format!("{}/orgs/{org}/repos", self.base_url))
            .await
    }

    async fn list_contributors(&self, repo_url: &str) -> Result<Vec<ContributorRecord>, ApiError> {
        self.fetch_all(&format!("{repo_url}/contributors")).await
    }

    async fn commit_page(
        &self,
        repo_url: &str,
        cursor: Option<&str>,
    ) -> Result<(Vec<CommitRecord>, Option<String>), ApiError> {
        match cursor {
            Some(next) => self.get_page(next, &[]).await,
            None => {
                let params = [("per_page", PER_PAGE.to_string())];
                self.get_page(&format!("{repo_url}/commits"), &params).await
            }
        }
    }

    async fn search_last_commit(
        &self,
        org: &str,
        username: &str,
    ) -> Result<Option<CommitHit>, ApiError> {
        let url = format!("{}/search/commits", self.base_url);
        let params = [
            ("q", format!("author:{username} org:{org}")),
            ("sort", "author-date".to_string()),
            ("order", "desc".to_string()),
            ("per_page", "1".to_string()),
        ];
        let response = self.get(&url, &params).await?;
        let body = response.text().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
        let results: SearchResults =
            serde_json::from_str(&body).map_err(|source| ApiError::Decode {
                url: url.clone(),
                source,
            })?;
        Ok(results.items.into_iter().next().map(|hit| CommitHit {
            message: hit.commit.message,
            date: hit.commit.author.date,
            email: hit.commit.author.email,
        }))
    }
}

/// Map a non-2xx response to the error taxonomy: a throttling status with
/// the quota exactly exhausted is `QuotaExceeded`, anything else is
/// `Upstream` with the upstream-provided message or a synthesized one.
fn classify_failure(
    url: &str,
    status: u16,
    remaining: u64,
    reset_at: DateTime<Utc>,
    message: Option<String>,
) -> ApiError {
    let throttled = status == 403 || status == 429;
    if throttled && remaining == 0 {
        let wait_secs = (reset_at - Utc::now()).num_seconds().max(0);
        return ApiError::QuotaExceeded { reset_at, wait_secs };
    }
    let message = message.unwrap_or_else(|| {
        format!("an unknown error occurred; request to {url} returned status {status}")
    });
    ApiError::Upstream { status, message }
}

fn header_num<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Extract the `rel="next"` target from an RFC 5988 `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(LINK)?.to_str().ok()?;
    for part in value.split(',') {
        let mut pieces = part.trim().splitn(2, ';');
        let target = pieces.next().unwrap_or("").trim();
        let rel = pieces.next().unwrap_or("");
        if rel.contains(r#"rel="next""#) {
            return Some(
                target
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string(),
            );
        }
    }
    None
}
