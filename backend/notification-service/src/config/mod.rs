use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};

/// WebSocket message size limit (256 KB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256 * 1024;

/// Interval between liveness sweeps
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub websocket: WebSocketConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Upgrade path, e.g. `/ws`
    pub path: String,
    pub heartbeat_interval_secs: u64,
    pub max_frame_size: usize,
}

impl WebSocketConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: notification_protocol::DEFAULT_WS_PATH.to_string(),
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig {
                env: "development".to_string(),
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            websocket: WebSocketConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has invalid value {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Config::default();

        let path = env::var("WS_PATH").unwrap_or(defaults.websocket.path);
        if !path.starts_with('/') {
            return Err(AppError::Config(format!(
                "WS_PATH must start with '/', got {:?}",
                path
            )));
        }

        let heartbeat_interval_secs =
            parse_var("HEARTBEAT_INTERVAL_SECS", defaults.websocket.heartbeat_interval_secs)?;
        if heartbeat_interval_secs == 0 {
            return Err(AppError::Config(
                "HEARTBEAT_INTERVAL_SECS must be greater than zero".into(),
            ));
        }

        Ok(Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or(defaults.app.env),
                host: env::var("APP_HOST").unwrap_or(defaults.app.host),
                port: parse_var("APP_PORT", defaults.app.port)?,
            },
            websocket: WebSocketConfig {
                path,
                heartbeat_interval_secs,
                max_frame_size: parse_var("WS_MAX_FRAME_SIZE", defaults.websocket.max_frame_size)?,
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}
