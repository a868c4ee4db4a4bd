/// HTTP handlers for notification service API
pub mod websocket;

pub use websocket::register_routes as register_websocket;
