use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::settings::Settings;

/// Load settings from an optional YAML file; no file means all defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading settings file {}", path.display()))?;
            parse_settings(&expand_env_vars(&content))
        }
        None => {
            debug!("no settings file given, using defaults");
            Ok(Settings::default())
        }
    }
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    // an empty document deserializes to unit, not to a map
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings = serde_yaml::from_str(content).inspect_err(|e| {
        error!("parse config error: {}", e);
    })?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<()> {
    if settings.timeout_ms == 0 {
        bail!("timeout_ms must be greater than zero");
    }
    if settings.oauth.token_url.trim().is_empty() {
        bail!("oauth.token_url must not be empty");
    }
    if settings.igdb.base_url.trim().is_empty() {
        bail!("igdb.base_url must not be empty");
    }
    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        bail!("metrics.path must start with '/', got '{}'", settings.metrics.path);
    }
    Ok(())
}

/// Replace `${VAR}` and `${VAR:default}` with environment values.
fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}").expect("valid env var pattern");
    re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}
