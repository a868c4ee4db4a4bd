use notification_protocol::USER_ID_QUERY_PARAM;
use std::time::Duration;

use crate::error::{ClientError, Result};

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server WebSocket endpoint, e.g. `ws://localhost:8000/ws`
    pub url: String,
    pub user_id: String,
    /// Fixed delay between reconnect attempts
    pub reconnect_interval: Duration,
    /// Consecutive failed attempts allowed before giving up
    pub max_reconnect_attempts: u32,
    /// How often a `ping` envelope is sent while connected
    pub keepalive_interval: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_id: user_id.into(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Endpoint with the user id appended as a query parameter
    pub fn connect_url(&self) -> Result<String> {
        let url = self.url.trim();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ClientError::InvalidUrl(self.url.clone()));
        }

        let user_id = self.user_id.trim();
        if user_id.is_empty() {
            return Err(ClientError::MissingUserId);
        }

        let separator = if url.contains('?') { '&' } else { '?' };
        Ok(format!(
            "{}{}{}={}",
            url,
            separator,
            USER_ID_QUERY_PARAM,
            urlencoding::encode(user_id)
        ))
    }
}
