/// Wire envelope shared by the notification server and its clients
///
/// Every frame in either direction is one JSON object
/// `{ "type": .., "payload"?: .., "timestamp"?: <epoch millis> }`.
/// `Envelope` is the raw shape; `WireMessage` is the validated sum type the
/// rest of the code works with.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::notification::{Notification, NotificationType};

/// Frame kinds understood on the wire
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Ping,
    Pong,
    Notification,
    Subscribe,
    Unsubscribe,
    Error,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::Notification => "notification",
            MessageKind::Subscribe => "subscribe",
            MessageKind::Unsubscribe => "unsubscribe",
            MessageKind::Error => "error",
        }
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ping" => Ok(MessageKind::Ping),
            "pong" => Ok(MessageKind::Pong),
            "notification" => Ok(MessageKind::Notification),
            "subscribe" => Ok(MessageKind::Subscribe),
            "unsubscribe" => Ok(MessageKind::Unsubscribe),
            "error" => Ok(MessageKind::Error),
            other => Err(ProtocolError::UnknownMessageType(other.to_string())),
        }
    }
}

/// Raw frame as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Payload of an `error` frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Topics named by a `subscribe` / `unsubscribe` frame
///
/// Accepts a single type string or an array of them; an absent payload is
/// an empty topic list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topics(pub Vec<NotificationType>);

impl Topics {
    fn from_payload(payload: Option<Value>) -> Result<Self, ProtocolError> {
        let invalid = |reason: String| ProtocolError::InvalidPayload {
            kind: "subscribe".to_string(),
            reason,
        };

        match payload {
            None | Some(Value::Null) => Ok(Topics::default()),
            Some(Value::String(s)) => Ok(Topics(vec![s.parse()?])),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s.parse::<NotificationType>(),
                    other => Err(invalid(format!("expected a type string, got {}", other))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Topics),
            Some(other) => Err(invalid(format!("expected string or array, got {}", other))),
        }
    }

    fn to_payload(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|t| Value::String(t.as_str().to_string()))
                .collect(),
        )
    }
}

/// Validated wire message
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// Keepalive request
    Ping,
    /// Keepalive response
    Pong,
    /// Server pushes a notification to the client
    Notification(Box<Notification>),
    Subscribe(Topics),
    Unsubscribe(Topics),
    Error(ErrorPayload),
}

impl WireMessage {
    pub fn notification(notification: Notification) -> Self {
        WireMessage::Notification(Box::new(notification))
    }

    pub fn error(message: impl Into<String>, detail: Option<String>) -> Self {
        WireMessage::Error(ErrorPayload {
            message: message.into(),
            detail,
        })
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            WireMessage::Ping => MessageKind::Ping,
            WireMessage::Pong => MessageKind::Pong,
            WireMessage::Notification(_) => MessageKind::Notification,
            WireMessage::Subscribe(_) => MessageKind::Subscribe,
            WireMessage::Unsubscribe(_) => MessageKind::Unsubscribe,
            WireMessage::Error(_) => MessageKind::Error,
        }
    }

    /// Wrap into an envelope stamped with the current time
    pub fn into_envelope(self) -> Result<Envelope, ProtocolError> {
        let kind = self.kind().as_str().to_string();
        let payload = match self {
            WireMessage::Ping | WireMessage::Pong => None,
            WireMessage::Notification(n) => Some(serde_json::to_value(*n)?),
            WireMessage::Subscribe(topics) | WireMessage::Unsubscribe(topics) => {
                Some(topics.to_payload())
            }
            WireMessage::Error(e) => Some(serde_json::to_value(e)?),
        };

        Ok(Envelope {
            kind,
            payload,
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
        })
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        let envelope = self.clone().into_envelope()?;
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Parse and validate a JSON text frame
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(json)?;
        WireMessage::try_from(envelope)
    }
}

impl TryFrom<Envelope> for WireMessage {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, ProtocolError> {
        let kind: MessageKind = envelope.kind.parse()?;
        let payload = envelope.payload;

        match kind {
            MessageKind::Ping => Ok(WireMessage::Ping),
            MessageKind::Pong => Ok(WireMessage::Pong),
            MessageKind::Notification => {
                let value = payload.ok_or(ProtocolError::MissingPayload("notification"))?;
                let notification: Notification =
                    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
                        kind: kind.as_str().to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(WireMessage::notification(notification))
            }
            MessageKind::Subscribe => Ok(WireMessage::Subscribe(Topics::from_payload(payload)?)),
            MessageKind::Unsubscribe => {
                Ok(WireMessage::Unsubscribe(Topics::from_payload(payload)?))
            }
            MessageKind::Error => {
                let value = payload.ok_or(ProtocolError::MissingPayload("error"))?;
                let error: ErrorPayload =
                    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
                        kind: kind.as_str().to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(WireMessage::Error(error))
            }
        }
    }
}
