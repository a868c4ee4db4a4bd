use thiserror::Error;

/// Errors raised while validating frames at the wire boundary
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("unknown notification type: {0}")]
    UnknownNotificationType(String),

    #[error("missing payload for {0} message")]
    MissingPayload(&'static str),

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
}
