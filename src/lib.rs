//! # IGDB Relay Library
//!
//! Relays a handful of query shapes to the IGDB metadata API, authenticating
//! with a Twitch client-credentials token that is cached and refreshed once
//! per expiry, however many requests are waiting on it.
//!
//! Modules:
//! - `cache` — token model and the single-flight token cache
//! - `sources` — OAuth2 client-credentials token source
//! - `igdb` — query builder and metadata api client
//! - `server` — axum routes and composition root
//! - `config` — settings file and defaults

pub mod cache;
pub mod config;
pub mod error;
pub mod helpers;
pub mod igdb;
pub mod observability;
pub mod server;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::token_cache::TokenCache;
pub use crate::config::settings::Settings;
pub use crate::error::{Error, Result};
