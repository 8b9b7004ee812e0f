// tests/common/mod.rs
pub use axum::Router;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::Arc;

use httpmock::MockServer;
use reqwest::Client;

use crate::config::settings::{Credentials, Settings};
use crate::helpers::time::{Clock, SystemClock};
use crate::observability::metrics::get_metrics;
use crate::server::server::{build_igdb_client, router, AppState};

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// URL on a port that was just released, so connections are refused.
pub async fn closed_port_url(path: &str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}{}", addr, path)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Settings pointing both upstreams at `mock`.
pub fn settings_for(mock: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.credentials = Credentials::new(Some("test-client".into()), Some("test-secret".into()));
    settings.oauth.token_url = mock.url("/oauth2/token");
    settings.igdb.base_url = mock.url("/v4");
    settings.timeout_ms = 2000;
    settings
}

/// Full relay wired like the binary, served on an ephemeral port.
pub async fn spawn_relay(settings: &Settings) -> (JoinHandle<()>, String) {
    spawn_relay_at(settings, Arc::new(SystemClock)).await
}

/// Same as `spawn_relay`, with the home routes reading `clock`.
pub async fn spawn_relay_at(settings: &Settings, clock: Arc<dyn Clock>) -> (JoinHandle<()>, String) {
    let igdb = build_igdb_client(settings).expect("igdb client");
    let state = AppState::new(get_metrics().await, Arc::clone(&igdb), clock);
    let (handle, addr) = spawn_axum(router(state, settings)).await;
    (handle, format!("http://{}", addr))
}
