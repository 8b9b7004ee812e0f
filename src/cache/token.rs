use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Bearer token as held by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    /// instant after which the token must no longer be used (margin already applied)
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(value: String, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    /// `issued_at + expires_in - safety_margin`, saturating on overflow.
    pub fn from_issued(
        issued: IssuedToken,
        issued_at: DateTime<Utc>,
        safety_margin_seconds: u64,
    ) -> Self {
        let lifetime = issued
            .expires_in
            .saturating_sub(i64::try_from(safety_margin_seconds).unwrap_or(i64::MAX));
        let expires_at = Duration::try_seconds(lifetime)
            .and_then(|d| issued_at.checked_add_signed(d))
            .unwrap_or(if lifetime > 0 {
                DateTime::<Utc>::MAX_UTC
            } else {
                DateTime::<Utc>::MIN_UTC
            });
        Self::new(issued.access_token, expires_at)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.value.is_empty() && now < self.expires_at
    }
}

/// Body returned by the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: i64,
}
