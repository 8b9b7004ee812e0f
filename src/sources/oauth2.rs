use crate::cache::token::IssuedToken;
use crate::config::settings::Credentials;
use crate::error::{Error, Result};
use crate::sources::fetch::FetchToken;
use reqwest::Client;
use tracing::{debug, warn};

const GRANT_TYPE: &str = "client_credentials";

/// Client-credentials grant against the Twitch OAuth endpoint.
#[derive(Debug, Clone)]
pub struct OAuth2Source {
    pub token_url: String,
    pub credentials: Credentials,
    pub client: Client,
}

impl OAuth2Source {
    pub fn new(token_url: String, credentials: Credentials, client: Client) -> Self {
        Self { token_url, credentials, client }
    }
}

impl FetchToken for OAuth2Source {
    async fn fetch_token(&self) -> Result<IssuedToken> {
        let (client_id, client_secret) = self.credentials.require()?;

        debug!("requesting token from {}", self.token_url);
        let response = self
            .client
            .post(&self.token_url)
            .query(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", GRANT_TYPE),
            ])
            .send()
            .await
            .map_err(Error::token_from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::token_from_reqwest)?;
        if !status.is_success() {
            warn!("OAuth2 token request failed: {}", status);
            return Err(Error::TokenAcquisition(format!(
                "token endpoint responded {}: {}",
                status, body
            )));
        }

        parse_issued_token(&body)
    }
}

/// Parse `{access_token, expires_in}`; anything else is a token acquisition failure.
pub fn parse_issued_token(body: &str) -> Result<IssuedToken> {
    let issued: IssuedToken = serde_json::from_str(body)
        .map_err(|e| Error::TokenAcquisition(format!("malformed token response: {}", e)))?;
    if issued.access_token.is_empty() {
        return Err(Error::TokenAcquisition("empty access_token".to_owned()));
    }
    Ok(issued)
}
