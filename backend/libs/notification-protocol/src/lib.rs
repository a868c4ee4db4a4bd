//! Wire protocol for campus real-time notifications.
//!
//! Shared by the notification service and the client connection manager so
//! both sides agree on envelope framing and on the typed notification
//! payloads.

pub mod envelope;
pub mod error;
pub mod notification;

pub use envelope::{Envelope, ErrorPayload, MessageKind, Topics, WireMessage};
pub use error::ProtocolError;
pub use notification::{
    ClubAnnouncementData, ConnectionAcceptedData, ConnectionRequestData, EventReminderData,
    MentorshipAcceptedData, MentorshipRequestData, Notification, NotificationData,
    NotificationType, SystemData, ThreadMentionData, ThreadReplyData,
};

/// Upgrade path the gateway listens on unless configured otherwise
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Query parameter carrying the caller's user id on connect
pub const USER_ID_QUERY_PARAM: &str = "userId";
