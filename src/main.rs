mod config;
mod db;
mod mqtt_service;
mod service_utils;

use crate::config::{Config, ConfigError};
use crate::mqtt_service::MqttService;
use crate::service_utils::init_logging;
use dotenvy::dotenv;
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Default configuration file location, overridable via `CONFIG_PATH`.
const CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() {
    init_logging();

    dotenv().ok();
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| CONFIG_PATH.to_string());

    // Each configuration failure kind gets its own message and ends the
    // process cleanly without starting the client.
    let config = match Config::from_file(Path::new(&config_path)) {
        Ok(cfg) => Arc::new(cfg),
        Err(e @ ConfigError::NotFound(_)) => {
            error!("Configuration file not found: {}", e);
            return;
        }
        Err(e @ ConfigError::Malformed(_)) => {
            error!("Configuration file is not valid JSON: {}", e);
            return;
        }
        Err(e @ ConfigError::Invalid(_)) => {
            error!("Configuration validation error: {}", e);
            return;
        }
        Err(e) => {
            error!("Unexpected error while loading configuration: {}", e);
            return;
        }
    };
    info!("Configuration loaded from {}.", config_path);

    let service = MqttService::new(config);
    if let Err(e) = service.run().await {
        error!("Unexpected error: {}", e);
        std::process::exit(1);
    }
}
