use futures_util::{SinkExt, StreamExt};
use notification_client::{
    ClientConfig, ConnectionStatus, NotificationClient, NotificationListener,
};
use notification_protocol::{
    ErrorPayload, MentorshipAcceptedData, Notification, NotificationData, NotificationType,
    WireMessage,
};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    accept_async,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame},
    tungstenite::Message,
    WebSocketStream,
};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Recorder {
    notifications: Mutex<Vec<Notification>>,
    errors: Mutex<Vec<ErrorPayload>>,
    exhausted: AtomicUsize,
}

impl NotificationListener for Recorder {
    fn on_notification(&self, notification: &Notification) {
        self.notifications.lock().push(notification.clone());
    }

    fn on_server_error(&self, error: &ErrorPayload) {
        self.errors.lock().push(error.clone());
    }

    fn on_retries_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::SeqCst);
    }
}

fn config(listener: &TcpListener) -> ClientConfig {
    let addr = listener.local_addr().unwrap();
    ClientConfig::new(format!("ws://{}/ws", addr), "alice")
        .with_reconnect_interval(Duration::from_millis(10))
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("no connection")
        .unwrap();
    accept_async(stream).await.unwrap()
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> WireMessage {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("no frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return WireMessage::from_json(&text).unwrap();
        }
    }
}

async fn wait_for_status(client: &NotificationClient, wanted: ConnectionStatus) {
    let mut status = client.watch_status();
    tokio::time::timeout(WAIT, status.wait_for(|s| *s == wanted))
        .await
        .expect("status not reached")
        .unwrap();
}

fn mentorship_accepted(title: &str) -> Notification {
    Notification::new(
        "alice",
        title,
        "Dr. Lee accepted your mentorship request",
        NotificationData::MentorshipAccepted(MentorshipAcceptedData {
            request_id: "m1".into(),
            mentor_id: "lee".into(),
            mentor_name: "Dr. Lee".into(),
        }),
    )
}

#[tokio::test]
async fn test_receives_notifications_newest_first() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let recorder = Arc::new(Recorder::default());
    let client = NotificationClient::with_listener(config(&listener), recorder.clone());
    client.connect().unwrap();

    let mut server = accept(&listener).await;
    wait_for_status(&client, ConnectionStatus::Connected).await;

    let first = mentorship_accepted("first");
    let second = mentorship_accepted("second");
    for n in [&first, &second] {
        let frame = WireMessage::notification(n.clone()).to_json().unwrap();
        server.send(Message::Text(frame)).await.unwrap();
    }

    // A ping round trip orders the check after both notifications
    server
        .send(Message::Text(WireMessage::Ping.to_json().unwrap()))
        .await
        .unwrap();
    assert_eq!(next_text(&mut server).await, WireMessage::Pong);

    assert_eq!(*recorder.notifications.lock(), vec![first.clone(), second.clone()]);
    assert_eq!(client.notifications(), vec![second.clone(), first.clone()]);
    assert_eq!(client.unread_count(), 2);

    assert!(client.mark_read(&first.id));
    assert_eq!(client.unread_count(), 1);
    client.mark_all_read();
    assert_eq!(client.unread_count(), 0);
    client.clear_notifications();
    assert!(client.notifications().is_empty());
}

#[tokio::test]
async fn test_server_error_and_garbage_keep_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let recorder = Arc::new(Recorder::default());
    let client = NotificationClient::with_listener(config(&listener), recorder.clone());
    client.connect().unwrap();

    let mut server = accept(&listener).await;
    wait_for_status(&client, ConnectionStatus::Connected).await;

    server.send(Message::Text("{not json".into())).await.unwrap();
    let error = WireMessage::error("Invalid message format", None).to_json().unwrap();
    server.send(Message::Text(error)).await.unwrap();
    server
        .send(Message::Text(WireMessage::Ping.to_json().unwrap()))
        .await
        .unwrap();
    assert_eq!(next_text(&mut server).await, WireMessage::Pong);

    assert_eq!(recorder.errors.lock().len(), 1);
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_keepalive_and_subscribe() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = NotificationClient::new(
        config(&listener).with_keepalive_interval(Duration::from_millis(50)),
    );
    client.connect().unwrap();

    let mut server = accept(&listener).await;
    wait_for_status(&client, ConnectionStatus::Connected).await;
    assert_eq!(next_text(&mut server).await, WireMessage::Ping);

    assert!(client.subscribe(&[NotificationType::ThreadReply, NotificationType::EventReminder]));
    loop {
        match next_text(&mut server).await {
            WireMessage::Ping => continue,
            WireMessage::Subscribe(topics) => {
                assert_eq!(
                    topics.0,
                    vec![NotificationType::ThreadReply, NotificationType::EventReminder]
                );
                break;
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_send_while_disconnected_returns_false() {
    let client = NotificationClient::new(ClientConfig::new("ws://127.0.0.1:9/ws", "alice"));
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(!client.send(&WireMessage::Ping));
    assert!(!client.subscribe(&[NotificationType::ThreadReply]));
}

#[tokio::test]
async fn test_retries_stop_after_five_failures() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client_config = config(&listener);

    // Accept TCP and drop it so every handshake fails
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let recorder = Arc::new(Recorder::default());
    let client = NotificationClient::with_listener(client_config, recorder.clone());
    client.connect().unwrap();

    wait_for_status(&client, ConnectionStatus::Exhausted).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 6);
    assert_eq!(recorder.exhausted.load(Ordering::SeqCst), 1);
    assert!(!client.send(&WireMessage::Ping));

    // Still exhausted; nothing retries in the background
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 6);
    assert_eq!(client.status(), ConnectionStatus::Exhausted);
}

#[tokio::test]
async fn test_reconnects_after_connection_lost() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = NotificationClient::new(config(&listener));
    client.connect().unwrap();

    let mut first = accept(&listener).await;
    wait_for_status(&client, ConnectionStatus::Connected).await;
    first.close(None).await.unwrap();

    let _second = accept(&listener).await;
    wait_for_status(&client, ConnectionStatus::Connected).await;
    assert!(client.send(&WireMessage::Ping));
}

#[tokio::test]
async fn test_policy_close_is_not_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = NotificationClient::new(config(&listener));
    client.connect().unwrap();

    let mut server = accept(&listener).await;
    wait_for_status(&client, ConnectionStatus::Connected).await;
    server
        .close(Some(CloseFrame {
            code: CloseCode::Policy,
            reason: Cow::Borrowed("Authentication required"),
        }))
        .await
        .unwrap();

    wait_for_status(&client, ConnectionStatus::Disconnected).await;
    let retry = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(retry.is_err());
}

#[tokio::test]
async fn test_manual_reconnect_replaces_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = NotificationClient::new(config(&listener));
    client.connect().unwrap();

    let mut first = accept(&listener).await;
    wait_for_status(&client, ConnectionStatus::Connected).await;

    let (reconnected, second) = tokio::join!(client.reconnect(), accept(&listener));
    reconnected.unwrap();
    drop(second);

    // The old socket was closed by the client
    let frame = tokio::time::timeout(WAIT, first.next()).await.unwrap();
    assert!(matches!(frame, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
}

#[tokio::test]
async fn test_disconnect_stops_client() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = NotificationClient::new(config(&listener));
    client.connect().unwrap();

    let _server = accept(&listener).await;
    wait_for_status(&client, ConnectionStatus::Connected).await;

    client.disconnect().await;
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(!client.send(&WireMessage::Ping));

    let retry = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
    assert!(retry.is_err());
}
