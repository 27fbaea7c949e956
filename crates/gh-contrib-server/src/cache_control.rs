//! Request cache-directive parsing and HTTP date handling
//!
//! Precedence: the `cache` query parameter wins, then the `Cache-Control`
//! header; `If-Modified-Since` only takes effect when no `Cache-Control`
//! header is present at all.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, NaiveDateTime, Utc};

pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDirective {
    /// Bypass every cache and refresh from the upstream.
    NoCache,
    /// Skip the response cache but keep the persistent caches.
    Revalidate,
    /// Conditional GET: answer 304 when nothing changed since the given
    /// date.
    IfUnchangedSince,
    /// Plain cacheable request.
    CacheOk,
}

impl CacheDirective {
    pub fn parse(cache_param: Option<&str>, headers: &HeaderMap) -> Self {
        if let Some(value) = cache_param {
            match value.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => return CacheDirective::CacheOk,
                "false" | "no" | "0" => return CacheDirective::NoCache,
                "revalidate" | "validate" => return CacheDirective::Revalidate,
                _ => {}
            }
        }
        if let Some(value) = headers
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
        {
            match value.to_ascii_lowercase().as_str() {
                "no-cache" => return CacheDirective::NoCache,
                "must-revalidate" => return CacheDirective::Revalidate,
                _ => {}
            }
        } else if headers.contains_key(header::IF_MODIFIED_SINCE) {
            return CacheDirective::IfUnchangedSince;
        }
        CacheDirective::CacheOk
    }
}

pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

pub fn parse_if_modified_since(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let value = headers.get(header::IF_MODIFIED_SINCE)?.to_str().ok()?;
    NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
