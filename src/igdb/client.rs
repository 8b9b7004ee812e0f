use std::sync::Arc;

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::token_cache::TokenCache;
use crate::error::{Error, Result};
use crate::helpers::time::{get_instant, Clock, SystemClock};
use crate::igdb::query::Query;
use crate::observability::metrics::get_metrics;
use crate::sources::fetch::FetchToken;
use crate::sources::oauth2::OAuth2Source;

/// Metadata api client; every call authenticates through the shared token cache.
pub struct IgdbClient<S = OAuth2Source, C = SystemClock> {
    base_url: String,
    client_id: String,
    http: Client,
    tokens: Arc<TokenCache<S, C>>,
}

impl<S: FetchToken, C: Clock> IgdbClient<S, C> {
    pub fn new(base_url: String, client_id: String, http: Client, tokens: Arc<TokenCache<S, C>>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client_id,
            http,
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenCache<S, C>> {
        &self.tokens
    }

    /// `POST {base_url}/{endpoint}` with the rendered query; `route` labels metrics.
    pub async fn query(&self, route: &str, endpoint: &str, query: &Query) -> Result<Value> {
        let metrics = get_metrics().await;
        let start = get_instant();
        metrics.upstream_requests.with_label_values(&[route]).inc();

        let result = self.send(endpoint, query).await;

        metrics
            .upstream_duration
            .with_label_values(&[route])
            .observe(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            warn!("{} upstream call failed: {}", route, err);
            metrics.upstream_failures.with_label_values(&[route, err.reason()]).inc();
        }
        result
    }

    async fn send(&self, endpoint: &str, query: &Query) -> Result<Value> {
        let token = self.tokens.get_valid_token().await?;
        let url = format!("{}/{}", self.base_url, endpoint);
        let body = query.render();
        debug!("POST {} <- {}", url, body);

        let response = self
            .http
            .post(&url)
            .header("Client-ID", &self.client_id)
            .header(AUTHORIZATION, format!("Bearer {}", token.value))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(Error::upstream_from_reqwest)?;

        let status = response.status();
        let text = response.text().await.map_err(Error::upstream_from_reqwest)?;
        if !status.is_success() {
            return Err(Error::UpstreamRequest(format!("{} responded {}: {}", endpoint, status, text)));
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::UpstreamRequest(format!("{} returned non-JSON body: {}", endpoint, e)))
    }
}
