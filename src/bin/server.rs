use anyhow::Result;
use dotenvy::dotenv;
use log::info;

use saint_chat::core::Config;
use saint_chat::server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting saint chat relay v{}...", env!("CARGO_PKG_VERSION"));
    info!(
        "Relay: format={:?} timeout={:?} strip_suggestions={} strict_personas={}",
        config.relay_format, config.relay_timeout, config.strip_suggestions, config.strict_personas
    );

    server::serve(config).await
}
