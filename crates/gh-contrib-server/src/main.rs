//! Organization contributor statistics service
//!
//! Serves ranked, paginated contributor statistics for GitHub
//! organizations:
//!
//! ```bash
//! GITHUB_TOKEN=… gh-contrib-server
//! curl 'http://127.0.0.1:5000/rust-lang?per_page=20&page=1'
//! ```

mod cache_control;
mod config;
mod error;
mod response_cache;
mod routes;

use crate::config::ServerConfig;
use crate::response_cache::{ResponseCache, DEFAULT_TTL};
use anyhow::Context;
use axum::routing::get;
use axum::Router;
use gh_contrib_client::GithubApi;
use gh_contrib_core::Services;
use log::{info, warn};
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub response_cache: Arc<Mutex<ResponseCache>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = ServerConfig::from_env();
    if config.github_token.is_none() {
        warn!("no GITHUB_TOKEN configured; the unauthenticated quota is tiny");
    }

    let api = GithubApi::new(&config.api_url, config.github_token.as_deref())?;
    let services = Services::new(Arc::new(api), &config.data_dir);
    let state = AppState {
        services,
        response_cache: Arc::new(Mutex::new(ResponseCache::new(DEFAULT_TTL))),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/{orgname}", get(routes::organization))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("serving contributor statistics on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
