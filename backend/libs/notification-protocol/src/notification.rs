use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Notification type enumeration
///
/// Closed set of campus domain events. `System` is reserved for
/// server-originated signals such as the welcome sent on connect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Someone asked to connect with the user
    ConnectionRequest,
    /// A pending connection request was accepted
    ConnectionAccepted,
    /// A reply was posted on the user's thread
    ThreadReply,
    /// The user was mentioned in a thread
    ThreadMention,
    /// A student asked the user for mentorship
    MentorshipRequest,
    /// A mentor accepted the user's request
    MentorshipAccepted,
    /// An upcoming event the user is attending
    EventReminder,
    /// A club the user belongs to posted an announcement
    ClubAnnouncement,
    /// Server-originated signal
    System,
}

impl NotificationType {
    pub const ALL: [NotificationType; 9] = [
        NotificationType::ConnectionRequest,
        NotificationType::ConnectionAccepted,
        NotificationType::ThreadReply,
        NotificationType::ThreadMention,
        NotificationType::MentorshipRequest,
        NotificationType::MentorshipAccepted,
        NotificationType::EventReminder,
        NotificationType::ClubAnnouncement,
        NotificationType::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::ConnectionRequest => "connection_request",
            NotificationType::ConnectionAccepted => "connection_accepted",
            NotificationType::ThreadReply => "thread_reply",
            NotificationType::ThreadMention => "thread_mention",
            NotificationType::MentorshipRequest => "mentorship_request",
            NotificationType::MentorshipAccepted => "mentorship_accepted",
            NotificationType::EventReminder => "event_reminder",
            NotificationType::ClubAnnouncement => "club_announcement",
            NotificationType::System => "system",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownNotificationType(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequestData {
    pub requester_id: String,
    pub requester_name: String,
    pub connection_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAcceptedData {
    pub accepter_id: String,
    pub accepter_name: String,
    pub connection_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadReplyData {
    pub thread_id: String,
    pub thread_title: String,
    pub reply_id: String,
    pub author_id: String,
    pub author_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMentionData {
    pub thread_id: String,
    pub thread_title: String,
    pub mentioned_by: String,
    pub mentioned_by_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MentorshipRequestData {
    pub request_id: String,
    pub student_id: String,
    pub student_name: String,
    /// Optional note from the student
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MentorshipAcceptedData {
    pub request_id: String,
    pub mentor_id: String,
    pub mentor_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventReminderData {
    pub event_id: String,
    pub event_title: String,
    pub event_date: String,
    pub event_time: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClubAnnouncementData {
    pub club_id: String,
    pub club_name: String,
    pub announcement: String,
}

/// Per-type payload of a notification
///
/// Serialized adjacently: the variant name becomes the notification's `type`
/// and its fields land under `data`, so a record can never carry a payload
/// that belongs to another type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationData {
    ConnectionRequest(ConnectionRequestData),
    ConnectionAccepted(ConnectionAcceptedData),
    ThreadReply(ThreadReplyData),
    ThreadMention(ThreadMentionData),
    MentorshipRequest(MentorshipRequestData),
    MentorshipAccepted(MentorshipAcceptedData),
    EventReminder(EventReminderData),
    ClubAnnouncement(ClubAnnouncementData),
    System(SystemData),
}

/// Empty payload carried by `system` notifications
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemData {}

impl NotificationData {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            NotificationData::ConnectionRequest(_) => NotificationType::ConnectionRequest,
            NotificationData::ConnectionAccepted(_) => NotificationType::ConnectionAccepted,
            NotificationData::ThreadReply(_) => NotificationType::ThreadReply,
            NotificationData::ThreadMention(_) => NotificationType::ThreadMention,
            NotificationData::MentorshipRequest(_) => NotificationType::MentorshipRequest,
            NotificationData::MentorshipAccepted(_) => NotificationType::MentorshipAccepted,
            NotificationData::EventReminder(_) => NotificationType::EventReminder,
            NotificationData::ClubAnnouncement(_) => NotificationType::ClubAnnouncement,
            NotificationData::System(_) => NotificationType::System,
        }
    }

    /// Build a payload from a type tag and an untyped `data` object
    ///
    /// Used at the HTTP boundary where callers send `{ "type": .., "data": .. }`
    /// as separate fields.
    pub fn from_parts(
        notification_type: NotificationType,
        data: serde_json::Value,
    ) -> Result<Self, ProtocolError> {
        let tagged = serde_json::json!({
            "type": notification_type.as_str(),
            "data": data,
        });
        serde_json::from_value(tagged).map_err(|e| ProtocolError::InvalidPayload {
            kind: notification_type.as_str().to_string(),
            reason: e.to_string(),
        })
    }
}

/// A transient, immutable notification record
///
/// Built once per triggering domain event and pushed to every live
/// connection of `user_id`. The server never stores it and never flips
/// `read`; read state belongs to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(flatten)]
    pub data: NotificationData,
    pub title: String,
    pub message: String,
    /// Recipient
    pub user_id: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        data: NotificationData,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id: generate_id("notif", created_at),
            data,
            title: title.into(),
            message: message.into(),
            user_id: user_id.into(),
            read: false,
            created_at,
        }
    }

    /// Local welcome signal sent to a freshly opened connection
    pub fn welcome(user_id: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: format!("welcome_{}", created_at.timestamp_millis()),
            data: NotificationData::System(SystemData {}),
            title: "Connected".to_string(),
            message: "WebSocket connection established".to_string(),
            user_id: user_id.into(),
            read: false,
            created_at,
        }
    }

    pub fn notification_type(&self) -> NotificationType {
        self.data.notification_type()
    }
}

const ID_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 7;

/// `<prefix>_<epoch millis>_<7 random base36 chars>`
fn generate_id(prefix: &str, at: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_SUFFIX_ALPHABET[rng.gen_range(0..ID_SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{}_{}_{}", prefix, at.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread_reply() -> NotificationData {
        NotificationData::ThreadReply(ThreadReplyData {
            thread_id: "t-1".to_string(),
            thread_title: "Study group for CS101".to_string(),
            reply_id: "r-9".to_string(),
            author_id: "u-2".to_string(),
            author_name: "Ada".to_string(),
        })
    }

    #[test]
    fn test_notification_type_strings() {
        for t in NotificationType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(t.as_str().parse::<NotificationType>().unwrap(), t);
        }
        assert!("like".parse::<NotificationType>().is_err());
    }

    #[test]
    fn test_type_is_derived_from_data() {
        let n = Notification::new("u-1", "New Reply", "Ada replied to your thread", thread_reply());
        assert_eq!(n.notification_type(), NotificationType::ThreadReply);
        assert!(!n.read);
        assert_eq!(n.user_id, "u-1");
    }

    #[test]
    fn test_notification_json_shape() {
        let n = Notification::new("u-1", "New Reply", "Ada replied", thread_reply());
        let value = serde_json::to_value(&n).unwrap();

        assert_eq!(value["type"], "thread_reply");
        assert_eq!(value["data"]["threadId"], "t-1");
        assert_eq!(value["data"]["authorName"], "Ada");
        assert_eq!(value["userId"], "u-1");
        assert_eq!(value["read"], false);
        assert!(value["createdAt"].is_string());
    }

    #[test]
    fn test_ids_are_prefixed_and_distinct() {
        let a = Notification::new("u-1", "a", "a", thread_reply());
        let b = Notification::new("u-1", "b", "b", thread_reply());
        assert!(a.id.starts_with("notif_"));
        assert_eq!(a.id.rsplit('_').next().unwrap().len(), ID_SUFFIX_LEN);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_optional_mentorship_message() {
        let data = NotificationData::from_parts(
            NotificationType::MentorshipRequest,
            serde_json::json!({
                "requestId": "m-1",
                "studentId": "u-3",
                "studentName": "Grace",
            }),
        )
        .unwrap();

        match data {
            NotificationData::MentorshipRequest(d) => assert!(d.message.is_none()),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_from_parts_rejects_missing_fields() {
        let err = NotificationData::from_parts(
            NotificationType::EventReminder,
            serde_json::json!({ "eventId": "e-1" }),
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));
    }

    #[test]
    fn test_welcome_is_system() {
        let n = Notification::welcome("u-1");
        assert_eq!(n.notification_type(), NotificationType::System);
        assert!(n.id.starts_with("welcome_"));
        assert_eq!(serde_json::to_value(&n).unwrap()["data"], serde_json::json!({}));
    }
}
