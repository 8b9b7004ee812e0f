use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use igdb_relay::config::loader;
use igdb_relay::config::settings::Settings;
use igdb_relay::server;
use igdb_relay::utils::logging::{self, LogLevel};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, env = "CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "TWITCH_CLIENT_ID")]
    client_id: Option<String>,
    #[arg(long, env = "TWITCH_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,
    #[arg(long, env = "HOST")]
    host: Option<String>,
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

impl Args {
    /// CLI and environment values override the settings file.
    fn apply(self, mut settings: Settings) -> Settings {
        if self.client_id.is_some() {
            settings.credentials.client_id = self.client_id;
        }
        if self.client_secret.is_some() {
            settings.credentials.client_secret = self.client_secret;
        }
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Read args / env, load settings
    // -------------------------------

    let args = Args::parse();
    let settings = loader::load_settings(args.config.as_deref())?;
    let logging_config = logging::resolve(&settings.logging, args.log_level);
    let settings = args.apply(settings);

    logging::init_logging(&logging_config);

    // -------------------------------
    // 2. Build token cache and metadata client
    // -------------------------------

    let igdb = server::server::build_igdb_client(&settings)?;

    // -------------------------------
    // 3. Serve
    // -------------------------------

    info!("Service starting...");
    server::server::start(&settings, igdb).await
}
