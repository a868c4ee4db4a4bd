/// Domain events that trigger notifications
///
/// The route layer persists an action, then hands the matching event to
/// `Dispatcher::publish`. Each event knows its recipient and renders the
/// title, message and payload the recipient sees.
use notification_protocol::{
    ConnectionAcceptedData, ConnectionRequestData, MentorshipAcceptedData, MentorshipRequestData,
    Notification, NotificationData, ThreadReplyData,
};

use super::dispatcher::Dispatcher;

/// Someone acting on the platform; `name` is the display name if known
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: String,
    pub name: Option<String>,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }

    /// Name used inside sentences
    fn subject(&self, fallback: &str) -> String {
        self.name.clone().unwrap_or_else(|| fallback.to_string())
    }

    /// Name stored in payloads
    fn display_name(&self) -> String {
        self.subject("Anonymous")
    }
}

#[derive(Debug, Clone)]
pub enum DomainEvent {
    ReplyPosted {
        thread_id: String,
        thread_title: String,
        thread_author_id: String,
        reply_id: String,
        author: Participant,
    },
    MentorshipRequested {
        request_id: String,
        mentor_user_id: String,
        student: Participant,
        message: Option<String>,
    },
    MentorshipAccepted {
        request_id: String,
        student_id: String,
        mentor: Participant,
    },
    ConnectionRequested {
        connection_id: String,
        target_user_id: String,
        requester: Participant,
    },
    ConnectionAccepted {
        connection_id: String,
        requester_id: String,
        accepter: Participant,
    },
}

/// A rendered notification ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub target_user_id: String,
    pub title: String,
    pub message: String,
    pub data: NotificationData,
}

impl DomainEvent {
    /// Render the notification for this event
    ///
    /// `None` when the event needs no notification (acting on your own thread).
    pub fn render(&self) -> Option<Rendered> {
        let rendered = match self {
            DomainEvent::ReplyPosted {
                thread_id,
                thread_title,
                thread_author_id,
                reply_id,
                author,
            } => {
                if author.id == *thread_author_id {
                    return None;
                }
                Rendered {
                    target_user_id: thread_author_id.clone(),
                    title: "New Reply".to_string(),
                    message: format!("{} replied to your thread", author.subject("Someone")),
                    data: NotificationData::ThreadReply(ThreadReplyData {
                        thread_id: thread_id.clone(),
                        thread_title: thread_title.clone(),
                        reply_id: reply_id.clone(),
                        author_id: author.id.clone(),
                        author_name: author.display_name(),
                    }),
                }
            }
            DomainEvent::MentorshipRequested {
                request_id,
                mentor_user_id,
                student,
                message,
            } => Rendered {
                target_user_id: mentor_user_id.clone(),
                title: "New Mentorship Request".to_string(),
                message: format!("{} requested mentorship", student.subject("A student")),
                data: NotificationData::MentorshipRequest(MentorshipRequestData {
                    request_id: request_id.clone(),
                    student_id: student.id.clone(),
                    student_name: student.display_name(),
                    message: message.clone(),
                }),
            },
            DomainEvent::MentorshipAccepted {
                request_id,
                student_id,
                mentor,
            } => Rendered {
                target_user_id: student_id.clone(),
                title: "Mentorship Accepted".to_string(),
                message: format!(
                    "{} accepted your mentorship request",
                    mentor.subject("Your mentor")
                ),
                data: NotificationData::MentorshipAccepted(MentorshipAcceptedData {
                    request_id: request_id.clone(),
                    mentor_id: mentor.id.clone(),
                    mentor_name: mentor.display_name(),
                }),
            },
            DomainEvent::ConnectionRequested {
                connection_id,
                target_user_id,
                requester,
            } => Rendered {
                target_user_id: target_user_id.clone(),
                title: "New Connection Request".to_string(),
                message: format!(
                    "{} wants to connect with you",
                    requester.subject("Someone")
                ),
                data: NotificationData::ConnectionRequest(ConnectionRequestData {
                    requester_id: requester.id.clone(),
                    requester_name: requester.display_name(),
                    connection_id: connection_id.clone(),
                }),
            },
            DomainEvent::ConnectionAccepted {
                connection_id,
                requester_id,
                accepter,
            } => Rendered {
                target_user_id: requester_id.clone(),
                title: "Connection Accepted".to_string(),
                message: format!(
                    "{} accepted your connection request",
                    accepter.subject("Someone")
                ),
                data: NotificationData::ConnectionAccepted(ConnectionAcceptedData {
                    accepter_id: accepter.id.clone(),
                    accepter_name: accepter.display_name(),
                    connection_id: connection_id.clone(),
                }),
            },
        };
        Some(rendered)
    }
}

impl Dispatcher {
    /// Render and dispatch the notification for a domain event
    pub fn publish(&self, event: &DomainEvent) -> Option<Notification> {
        let rendered = event.render()?;
        Some(self.dispatch(
            &rendered.target_user_id,
            rendered.title,
            rendered.message,
            rendered.data,
        ))
    }
}
