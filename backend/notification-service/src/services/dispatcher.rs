/// Notification Dispatcher
///
/// Builds notification records and pushes them to every live connection of
/// the target user:
/// 1. Construct the record (id, timestamp, type derived from the payload)
/// 2. Look up the user's handles in the registry
/// 3. Encode one envelope and queue the identical frame on each handle
///
/// Delivery is best effort. Offline users are not an error and nothing is
/// stored for later.
use notification_protocol::{Notification, NotificationData, WireMessage};
use tracing::{debug, error, info};

use crate::metrics;
use crate::websocket::ConnectionRegistry;

#[derive(Clone)]
pub struct Dispatcher {
    registry: ConnectionRegistry,
}

impl Dispatcher {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Build a record without sending it
    pub fn create_notification(
        &self,
        target_user_id: &str,
        title: impl Into<String>,
        message: impl Into<String>,
        data: NotificationData,
    ) -> Notification {
        Notification::new(target_user_id, title, message, data)
    }

    /// Create a notification and push it to the target's live connections
    ///
    /// Returns the record whether or not anything was delivered.
    pub fn dispatch(
        &self,
        target_user_id: &str,
        title: impl Into<String>,
        message: impl Into<String>,
        data: NotificationData,
    ) -> Notification {
        let notification = self.create_notification(target_user_id, title, message, data);
        self.send_to_user(target_user_id, &notification);
        notification
    }

    /// Push an existing record to every live connection of `user_id`
    ///
    /// Returns the number of connections the frame was queued on.
    pub fn send_to_user(&self, user_id: &str, notification: &Notification) -> usize {
        let notification_type = notification.notification_type();
        let handles = self.registry.connections_for(user_id);

        if handles.is_empty() {
            debug!(
                user_id = %user_id,
                notification_id = %notification.id,
                notification_type = %notification_type,
                "User not connected, notification not delivered"
            );
            metrics::record_dispatch(notification_type.as_str(), 0);
            return 0;
        }

        let frame = match WireMessage::notification(notification.clone()).to_json() {
            Ok(frame) => frame,
            Err(e) => {
                error!(
                    user_id = %user_id,
                    notification_id = %notification.id,
                    error = %e,
                    "Failed to encode notification"
                );
                return 0;
            }
        };

        let delivered = handles
            .iter()
            .filter(|handle| handle.send_frame(frame.clone()))
            .count();

        info!(
            user_id = %user_id,
            notification_id = %notification.id,
            notification_type = %notification_type,
            connections = handles.len(),
            delivered,
            "Notification sent"
        );
        metrics::record_dispatch(notification_type.as_str(), delivered);
        delivered
    }

    /// Dispatch the same content to several users, one record per user
    pub fn broadcast<S: AsRef<str>>(
        &self,
        user_ids: &[S],
        title: &str,
        message: &str,
        data: NotificationData,
    ) -> Vec<Notification> {
        user_ids
            .iter()
            .map(|user_id| self.dispatch(user_id.as_ref(), title, message, data.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::handle::{ConnectionHandle, SessionReceiver};
    use crate::websocket::SessionCommand;
    use notification_protocol::{NotificationType, ThreadReplyData};

    fn open(registry: &ConnectionRegistry, user_id: &str) -> (ConnectionHandle, SessionReceiver) {
        let (handle, rx) = ConnectionHandle::channel(user_id);
        handle.mark_open();
        registry.register(handle.clone());
        (handle, rx)
    }

    fn reply_data() -> NotificationData {
        NotificationData::ThreadReply(ThreadReplyData {
            thread_id: "t1".into(),
            thread_title: "Exam tips".into(),
            reply_id: "r9".into(),
            author_id: "u7".into(),
            author_name: "Sam".into(),
        })
    }

    fn received(rx: &mut SessionReceiver) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(command) = rx.try_recv() {
            if let SessionCommand::Frame(text) = command {
                match WireMessage::from_json(&text).unwrap() {
                    WireMessage::Notification(n) => out.push(*n),
                    other => panic!("unexpected message {:?}", other),
                }
            }
        }
        out
    }

    #[test]
    fn test_create_notification_derives_type() {
        let dispatcher = Dispatcher::new(ConnectionRegistry::new());
        let n = dispatcher.create_notification("u1", "New Reply", "Sam replied", reply_data());

        assert_eq!(n.notification_type(), NotificationType::ThreadReply);
        assert_eq!(n.user_id, "u1");
        assert!(!n.read);
        assert!(n.id.starts_with("notif_"));
    }

    #[test]
    fn test_dispatch_to_every_connection_of_user() {
        let registry = ConnectionRegistry::new();
        let (_h1, mut rx1) = open(&registry, "u1");
        let (_h2, mut rx2) = open(&registry, "u1");
        let dispatcher = Dispatcher::new(registry);

        let n = dispatcher.dispatch("u1", "New Reply", "Sam replied to your thread", reply_data());

        let first = received(&mut rx1);
        let second = received(&mut rx2);
        assert_eq!(first, vec![n.clone()]);
        assert_eq!(second, vec![n.clone()]);
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn test_send_counts_match_connections() {
        let registry = ConnectionRegistry::new();
        let receivers: Vec<_> = (0..4).map(|_| open(&registry, "u1")).collect();
        let dispatcher = Dispatcher::new(registry);

        let n = dispatcher.create_notification("u1", "t", "m", reply_data());
        assert_eq!(dispatcher.send_to_user("u1", &n), receivers.len());
    }

    #[test]
    fn test_dispatch_to_offline_user() {
        let registry = ConnectionRegistry::new();
        let (_other, mut rx) = open(&registry, "someone-else");
        let dispatcher = Dispatcher::new(registry);

        let n = dispatcher.dispatch("u2", "New Reply", "Sam replied", reply_data());
        assert_eq!(n.user_id, "u2");
        assert_eq!(dispatcher.send_to_user("u2", &n), 0);
        assert!(received(&mut rx).is_empty());
    }

    #[test]
    fn test_closed_connection_not_counted() {
        let registry = ConnectionRegistry::new();
        let (live, _rx1) = open(&registry, "u1");
        let (closing, _rx2) = open(&registry, "u1");
        closing.begin_close();
        let dispatcher = Dispatcher::new(registry);

        let n = dispatcher.create_notification("u1", "t", "m", reply_data());
        assert_eq!(dispatcher.send_to_user("u1", &n), 1);
        assert!(live.is_open());
    }

    #[test]
    fn test_broadcast_one_record_per_user() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = open(&registry, "a");
        let (_b, mut rx_b) = open(&registry, "b");
        let dispatcher = Dispatcher::new(registry);

        let sent =
            dispatcher.broadcast(&["a", "b", "c"], "Heads up", "Campus closed", reply_data());

        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].user_id, "c");
        assert_eq!(received(&mut rx_a)[0].id, sent[0].id);
        assert_eq!(received(&mut rx_b)[0].id, sent[1].id);
        assert_ne!(sent[0].id, sent[1].id);
    }

    #[test]
    fn test_frames_arrive_in_dispatch_order() {
        let registry = ConnectionRegistry::new();
        let (_h, mut rx) = open(&registry, "u1");
        let dispatcher = Dispatcher::new(registry);

        let ids: Vec<String> = (0..5)
            .map(|i| dispatcher.dispatch("u1", format!("n{}", i), "m", reply_data()).id)
            .collect();
        let got: Vec<String> = received(&mut rx).into_iter().map(|n| n.id).collect();
        assert_eq!(got, ids);
    }
}
