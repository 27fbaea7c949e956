//! HTTP handlers
//!
//! `GET /{orgname}` is the whole public surface: paginated, freshness-aware
//! contributor rankings with conditional-GET support. The handler stays
//! thin glue over `gh_contrib_core::Organization`.

use crate::cache_control::{format_http_date, parse_if_modified_since, CacheDirective};
use crate::error::Result;
use crate::response_cache::ResponseCache;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use gh_contrib_core::{Contributor, Organization};
use log::debug;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_PER_PAGE: usize = 20;
const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct OrgQuery {
    per_page: Option<usize>,
    page: Option<usize>,
    cache: Option<String>,
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "service": "gh-contrib",
        "usage": "GET /{orgname}?per_page=&page=&cache=",
    }))
}

pub async fn organization(
    State(state): State<AppState>,
    Path(orgname): Path<String>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let directive = CacheDirective::parse(query.cache.as_deref(), &headers);
    let force_refresh = directive == CacheDirective::NoCache;
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).min(MAX_PER_PAGE);
    let page = query.page.unwrap_or(1);

    let mut org = Organization::load(state.services.clone(), &orgname, force_refresh).await?;

    let key = ResponseCache::key(&orgname, per_page, page);
    if directive == CacheDirective::CacheOk {
        let cached = state.response_cache.lock().unwrap().get(&key);
        if let Some((body, last_changed)) = cached {
            debug!("response cache hit for {key}");
            return Ok(with_last_modified(
                Json(body).into_response(),
                last_changed,
            ));
        }
    }
    if directive == CacheDirective::IfUnchangedSince {
        if let Some(since) = parse_if_modified_since(&headers) {
            if !org.changed_since(since) {
                return Ok(with_last_modified(
                    StatusCode::NOT_MODIFIED.into_response(),
                    org.last_changed(),
                ));
            }
        }
    }

    let (top, total_pages) = org.get_top_contributors(per_page, page).await?;
    let total_contributors = org.total_contributors();
    let last_changed = org.last_changed();
    // Whatever this request left unresolved gets finished in the
    // background, warming the caches for the next page.
    org.daemon_loader();

    let body = json!({
        "navigation": {
            "page": page,
            "per_page": per_page,
            "total_contributors": total_contributors,
            "total_pages": total_pages,
        },
        "data": top.iter().map(format_top_contributor).collect::<Vec<_>>(),
    });
    state
        .response_cache
        .lock()
        .unwrap()
        .store(key, body.clone(), last_changed);
    Ok(with_last_modified(Json(body).into_response(), last_changed))
}

/// Response shape of one ranked contributor: `last_commit` flattened to its
/// message under `commit`.
fn format_top_contributor(contributor: &Contributor) -> Value {
    json!({
        "username": contributor.username,
        "email": contributor.email,
        "image": contributor.avatar_url,
        "contributions": contributor.contributions,
        "commit": contributor
            .last_commit
            .as_ref()
            .map(|last| last.message.clone()),
    })
}

fn with_last_modified(mut response: Response, last_changed: Option<DateTime<Utc>>) -> Response {
    if let Some(at) = last_changed {
        if let Ok(value) = HeaderValue::from_str(&format_http_date(at)) {
            response.headers_mut().insert(header::LAST_MODIFIED, value);
        }
    }
    response
}
