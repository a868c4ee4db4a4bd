/// Commands from server components to a connection's transport
///
/// The registry, dispatcher and heartbeat never touch a socket directly;
/// they queue one of these on the connection's channel and the session
/// actor applies it in order.
use actix_web_actors::ws::{CloseCode, CloseReason};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Write one JSON text frame
    Frame(String),
    /// Send a transport-level liveness probe
    Probe,
    /// Close the socket with the given reason and stop the session
    Close(CloseReason),
}

/// Close reason used when the server is going down
pub fn shutdown_reason() -> CloseReason {
    CloseReason {
        code: CloseCode::Away,
        description: Some("Server shutting down".to_string()),
    }
}

/// Close reason used when a connection missed a heartbeat cycle
pub fn heartbeat_timeout_reason() -> CloseReason {
    CloseReason {
        code: CloseCode::Away,
        description: Some("Heartbeat timeout".to_string()),
    }
}

/// Close reason used when no identity could be resolved on connect
pub fn authentication_required_reason() -> CloseReason {
    CloseReason {
        code: CloseCode::Policy,
        description: Some("Authentication required".to_string()),
    }
}
