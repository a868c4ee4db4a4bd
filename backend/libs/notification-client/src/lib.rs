//! Client connection manager for campus real-time notifications.
//!
//! Keeps one logical WebSocket connection to the notification service open
//! for a user: reconnects on a fixed interval up to a limit, sends keepalive
//! pings, and keeps the received notifications in a local newest-first list
//! with client-side read state.

pub mod client;
pub mod config;
pub mod error;
pub mod policy;
pub mod store;

pub use client::{ConnectionStatus, NotificationClient, NotificationListener};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use policy::ReconnectPolicy;
pub use store::NotificationStore;
