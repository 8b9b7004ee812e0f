use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the token cache and the upstream client.
///
/// Every variant ends up as a `500` at the route boundary; the variant only
/// drives logging and metrics labels.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// OAuth call failed or returned an unparsable/incomplete body.
    #[error("token acquisition failed: {0}")]
    TokenAcquisition(String),

    /// Metadata API call failed or returned an error / non-JSON body.
    #[error("upstream request failed: {0}")]
    UpstreamRequest(String),

    #[error("upstream request timed out: {0}")]
    UpstreamTimeout(String),

    /// Missing credentials or invalid settings.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Short label used for the `reason` dimension of failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::TokenAcquisition(_) => "token_acquisition",
            Error::UpstreamRequest(_) => "upstream_request",
            Error::UpstreamTimeout(_) => "timeout",
            Error::Configuration(_) => "configuration",
        }
    }

    // reqwest errors carry the request url, and the token url carries the client secret
    pub(crate) fn token_from_reqwest(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            Error::UpstreamTimeout(format!("oauth token endpoint: {}", err))
        } else {
            Error::TokenAcquisition(err.to_string())
        }
    }

    pub(crate) fn upstream_from_reqwest(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            Error::UpstreamTimeout(format!("metadata api: {}", err))
        } else {
            Error::UpstreamRequest(err.to_string())
        }
    }
}
