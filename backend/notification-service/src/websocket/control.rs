/// Inbound control messages
///
/// Decides what a connection answers to each text frame it receives. Kept
/// free of actor plumbing so the same rules hold for any transport.
use notification_protocol::{NotificationType, ProtocolError, Topics, WireMessage};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::metrics;

/// Topics a connection asked for
///
/// Recorded and logged only: every notification for the user still reaches
/// every one of the user's connections.
#[derive(Debug, Default, Clone)]
pub struct Subscriptions {
    topics: HashSet<NotificationType>,
}

impl Subscriptions {
    pub fn subscribe(&mut self, topics: &Topics) {
        self.topics.extend(topics.0.iter().copied());
    }

    pub fn unsubscribe(&mut self, topics: &Topics) {
        for topic in &topics.0 {
            self.topics.remove(topic);
        }
    }

    pub fn contains(&self, topic: NotificationType) -> bool {
        self.topics.contains(&topic)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Reply sent for frames that cannot be decoded
pub fn malformed_frame_reply(err: &ProtocolError) -> WireMessage {
    WireMessage::error("Invalid message format", Some(err.to_string()))
}

/// Handle one inbound text frame, returning the reply for the same connection
pub fn handle_text(
    text: &str,
    user_id: &str,
    subscriptions: &mut Subscriptions,
) -> Option<WireMessage> {
    let message = match WireMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Rejected malformed WebSocket frame");
            metrics::record_malformed_frame();
            return Some(malformed_frame_reply(&e));
        }
    };

    match message {
        WireMessage::Ping => Some(WireMessage::Pong),
        WireMessage::Subscribe(topics) => {
            subscriptions.subscribe(&topics);
            info!(user_id = %user_id, topics = ?topics.0, "User subscribed");
            None
        }
        WireMessage::Unsubscribe(topics) => {
            subscriptions.unsubscribe(&topics);
            info!(user_id = %user_id, topics = ?topics.0, "User unsubscribed");
            None
        }
        other => {
            debug!(
                user_id = %user_id,
                kind = other.kind().as_str(),
                "Ignoring client message with server-only type"
            );
            None
        }
    }
}
