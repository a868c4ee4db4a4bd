pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod services;
pub mod websocket;

pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::register_websocket;
pub use services::{Dispatcher, DomainEvent, NotificationHub, Participant};
pub use websocket::{ConnectionHandle, ConnectionRegistry, GatewayState};
