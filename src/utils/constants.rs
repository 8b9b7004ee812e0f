//! Shared constants and invariants

pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

pub const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const DEFAULT_IGDB_BASE_URL: &str = "https://api.igdb.com/v4";

// IGDB endpoints
pub const ENDPOINT_GAMES: &str = "games";
