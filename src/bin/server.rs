use clap::Parser;
use fall_detection_rs::config::ServerConfig;
use fall_detection_rs::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    log::info!("Fall Detection Server starting on {}", config.bind_addr());

    server::serve(&config).await
}
