/// WebSocket real-time notification system
///
/// This module handles WebSocket connections for real-time notifications.
///
/// Architecture:
/// 1. ConnectionRegistry: user id -> live connection handles
/// 2. Gateway: upgrade, identity resolution, the single close path
/// 3. NotificationSession: per-connection actor owning the socket
/// 4. HeartbeatMonitor: probes connections and closes dead ones

pub mod control;
pub mod gateway;
pub mod handle;
pub mod heartbeat;
pub mod identity;
pub mod messages;
pub mod registry;
pub mod session;

pub use gateway::{close_connection, ws_connect, GatewayState};
pub use handle::{ConnectionHandle, ConnectionId, ConnectionState};
pub use heartbeat::{HeartbeatMonitor, SweepReport};
pub use identity::{IdentityResolver, QueryParamIdentity};
pub use messages::SessionCommand;
pub use registry::ConnectionRegistry;
