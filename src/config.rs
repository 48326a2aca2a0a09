use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use crate::detector::FallDetector;
use crate::notify::{DiscordNotifier, LogNotifier, Notifier};
use crate::service::FallDetectionService;
use crate::store::{ResultStore, RetentionPolicy};
use crate::thresholds::Thresholds;

#[derive(Parser, Debug, Clone)]
#[command(name = "fall_server")]
#[command(about = "HTTP fall detection server for motorcycle accelerometer recordings", long_about = None)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3030)]
    pub port: u16,

    /// Directory for uploads and analysis artifacts
    #[arg(long, env = "RESULTS_DIR", default_value = "./FallDetectionResults")]
    pub results_dir: PathBuf,

    /// Do not persist uploads or results
    #[arg(long)]
    pub no_store: bool,

    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: Option<String>,

    #[arg(long, env = "DISCORD_CHANNEL_ID")]
    pub discord_channel_id: Option<String>,

    /// JSON file overriding detection thresholds (missing keys keep defaults)
    #[arg(long = "thresholds", env = "THRESHOLDS_FILE")]
    pub thresholds_file: Option<PathBuf>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn thresholds(&self) -> anyhow::Result<Thresholds> {
        match &self.thresholds_file {
            Some(path) => Thresholds::from_json_file(path),
            None => Ok(Thresholds::default()),
        }
    }

    /// Discord when both credentials are present, the log otherwise.
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        match (&self.discord_token, &self.discord_channel_id) {
            (Some(token), Some(channel)) if !token.is_empty() && !channel.is_empty() => {
                Arc::new(DiscordNotifier::new(token.clone(), channel.clone()))
            }
            _ => {
                log::warn!("Discord credentials not configured, alerts go to the log only");
                Arc::new(LogNotifier)
            }
        }
    }

    pub fn store(&self) -> Option<ResultStore> {
        if self.no_store {
            None
        } else {
            Some(ResultStore::new(&self.results_dir, RetentionPolicy::default()))
        }
    }

    pub fn build_service(&self) -> anyhow::Result<FallDetectionService> {
        let detector = FallDetector::new(self.thresholds()?);
        Ok(FallDetectionService::new(detector, self.notifier(), self.store()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::parse_from(["fall_server"]);
        assert_eq!(config.port, 3030);
        assert_eq!(config.results_dir, PathBuf::from("./FallDetectionResults"));
        assert!(!config.no_store);
        assert!(config.store().is_some());
    }

    #[test]
    fn test_flags() {
        let config = ServerConfig::parse_from([
            "fall_server",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--no-store",
        ]);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert!(config.store().is_none());
    }

    #[test]
    fn test_thresholds_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("thresholds.json");
        std::fs::write(&path, r#"{"impact": 20.0}"#).unwrap();

        let config = ServerConfig::parse_from(["fall_server", "--thresholds", path.to_str().unwrap(), "--no-store"]);
        let service = config.build_service().unwrap();
        assert_eq!(service.detector().thresholds().impact, 20.0);
        assert_eq!(service.detector().thresholds().freefall, 2.0);
    }

    #[test]
    fn test_missing_thresholds_file_is_an_error() {
        let config = ServerConfig::parse_from(["fall_server", "--thresholds", "/no/such/thresholds.json"]);
        assert!(config.build_service().is_err());
    }
}
