use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::cache::token_cache::TokenCache;
use crate::config::settings::Settings;
use crate::helpers::time::{Clock, SystemClock};
use crate::sources::oauth2::OAuth2Source;
use crate::igdb::client::IgdbClient;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::routes;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub igdb: Arc<IgdbClient>,
    /// "now" for the date-bounded home queries
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(metrics: &Metrics, igdb: Arc<IgdbClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            igdb,
            clock,
        }
    }
}

/// Composition root: one reqwest client (bounded timeout) shared by the token
/// source and the metadata client, one token cache shared by every handler.
pub fn build_igdb_client(settings: &Settings) -> Result<Arc<IgdbClient>> {
    let http = Client::builder()
        .timeout(Duration::from_millis(settings.timeout_ms))
        .build()
        .context("building http client")?;
    if settings.credentials.require().is_err() {
        warn!("Twitch client credentials are not configured, every upstream call will fail");
    }

    let source = OAuth2Source::new(settings.oauth.token_url.clone(), settings.credentials.clone(), http.clone());
    let tokens = TokenCache::shared(source, SystemClock, settings.safety_margin_seconds);
    Ok(Arc::new(IgdbClient::new(
        settings.igdb.base_url.clone(),
        settings.credentials.client_id().to_owned(),
        http,
        tokens,
    )))
}

/// All relay routes plus the optional metrics route, CORS open to any origin.
pub fn router(state: AppState, settings: &Settings) -> Router {
    Router::new()
        .route("/token", get(routes::token))
        .route("/games", get(routes::games))
        .route("/searchGames", post(routes::search_games))
        .route("/home/topDaily", get(routes::top_daily))
        .route("/home/topThisYear", get(routes::top_this_year))
        .route("/home/anticipated", get(routes::anticipated))
        .route("/game/{id}", get(routes::game))
        .merge(state.metrics_state.router(&settings.metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn start(settings: &Settings, igdb: Arc<IgdbClient>) -> Result<()> {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, igdb, Arc::new(SystemClock));
    let app = router(state, settings);

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!("IGDB relay listening on {}", bind_addr);
    metrics.up.set(1);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    metrics.up.set(0);
    info!("IGDB relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
