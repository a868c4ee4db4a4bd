//! Notification client with automatic reconnection and keepalive.

use futures_util::{SinkExt, StreamExt};
use notification_protocol::{
    ErrorPayload, Notification, NotificationType, Topics, WireMessage,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::policy::ReconnectPolicy;
use crate::store::NotificationStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Observable state of the logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting for or making retry number `attempt`
    Reconnecting { attempt: u32 },
    /// Retry budget spent; only `connect` or `reconnect` leaves this state
    Exhausted,
}

/// Callbacks for events the application cares about
///
/// Called from the client's background task; keep them short.
pub trait NotificationListener: Send + Sync {
    fn on_notification(&self, notification: &Notification);

    fn on_server_error(&self, error: &ErrorPayload) {
        let _ = error;
    }

    fn on_retries_exhausted(&self) {}
}

/// How one open connection ended
#[derive(Debug, PartialEq, Eq)]
enum ConnectionEnd {
    /// Local disconnect or reconnect request
    Stopped,
    /// Server refused the identity; retrying cannot help
    Rejected,
    /// Anything else; subject to the reconnect policy
    Lost,
}

struct Shared {
    config: ClientConfig,
    store: RwLock<NotificationStore>,
    status: watch::Sender<ConnectionStatus>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    listener: Option<Arc<dyn NotificationListener>>,
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!(user_id = %self.config.user_id, ?status, "Connection status changed");
        }
    }

    /// Classify one inbound text frame, returning a reply if one is due
    fn handle_text(&self, text: &str) -> Option<Message> {
        match WireMessage::from_json(text) {
            Ok(WireMessage::Notification(notification)) => {
                debug!(
                    notification_id = %notification.id,
                    notification_type = %notification.notification_type(),
                    "Notification received"
                );
                self.store.write().push((*notification).clone());
                if let Some(listener) = &self.listener {
                    listener.on_notification(&notification);
                }
                None
            }
            Ok(WireMessage::Ping) => match WireMessage::Pong.to_json() {
                Ok(text) => Some(Message::Text(text)),
                Err(e) => {
                    error!(error = %e, "Failed to encode pong");
                    None
                }
            },
            Ok(WireMessage::Pong) => None,
            Ok(WireMessage::Error(payload)) => {
                warn!(
                    message = %payload.message,
                    detail = ?payload.detail,
                    "Server reported an error"
                );
                if let Some(listener) = &self.listener {
                    listener.on_server_error(&payload);
                }
                None
            }
            Ok(other) => {
                debug!(kind = other.kind().as_str(), "Ignoring unexpected message");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse WebSocket message");
                None
            }
        }
    }
}

struct Supervisor {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// One logical notification connection for a user
///
/// Must be used inside a tokio runtime. Cheap methods (`send`, `status`,
/// store access) never block on the network.
pub struct NotificationClient {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<Supervisor>>,
}

impl NotificationClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_listener(config: ClientConfig, listener: Arc<dyn NotificationListener>) -> Self {
        Self::build(config, Some(listener))
    }

    fn build(config: ClientConfig, listener: Option<Arc<dyn NotificationListener>>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            shared: Arc::new(Shared {
                config,
                store: RwLock::new(NotificationStore::new()),
                status,
                outbound: Mutex::new(None),
                listener,
            }),
            supervisor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Start the background connection task
    ///
    /// No-op while a previous task is still running. Fails only on an
    /// unusable url or user id.
    pub fn connect(&self) -> Result<()> {
        let url = self.shared.config.connect_url()?;

        let mut supervisor = self.supervisor.lock();
        if let Some(existing) = supervisor.as_ref() {
            if !existing.task.is_finished() {
                return Ok(());
            }
        }

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(supervise(self.shared.clone(), url, stop_rx));
        *supervisor = Some(Supervisor { stop, task });
        Ok(())
    }

    /// Close the connection and stop retrying
    pub async fn disconnect(&self) {
        self.teardown().await;
        self.shared.set_status(ConnectionStatus::Disconnected);
        info!(user_id = %self.shared.config.user_id, "Notification client disconnected");
    }

    /// Tear everything down, then connect again with a fresh retry budget
    pub async fn reconnect(&self) -> Result<()> {
        self.teardown().await;
        self.connect()
    }

    async fn teardown(&self) {
        let supervisor = self.supervisor.lock().take();
        if let Some(Supervisor { stop, task }) = supervisor {
            let _ = stop.send(true);
            if let Err(e) = task.await {
                warn!(error = %e, "Connection task ended abnormally");
            }
        }
        self.shared.outbound.lock().take();
    }

    /// Send a message; `false` when not connected
    pub fn send(&self, message: &WireMessage) -> bool {
        match self.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    user_id = %self.shared.config.user_id,
                    kind = message.kind().as_str(),
                    error = %e,
                    "Cannot send message"
                );
                false
            }
        }
    }

    fn try_send(&self, message: &WireMessage) -> Result<()> {
        let text = message.to_json()?;
        let outbound = self.shared.outbound.lock();
        let sender = outbound.as_ref().ok_or(ClientError::NotConnected)?;
        sender
            .send(Message::Text(text))
            .map_err(|_| ClientError::NotConnected)
    }

    pub fn subscribe(&self, types: &[NotificationType]) -> bool {
        self.send(&WireMessage::Subscribe(Topics(types.to_vec())))
    }

    pub fn unsubscribe(&self, types: &[NotificationType]) -> bool {
        self.send(&WireMessage::Unsubscribe(Topics(types.to_vec())))
    }

    /// Snapshot of the received notifications, newest first
    pub fn notifications(&self) -> Vec<Notification> {
        self.shared.store.read().notifications().to_vec()
    }

    pub fn unread_count(&self) -> usize {
        self.shared.store.read().unread_count()
    }

    pub fn mark_read(&self, id: &str) -> bool {
        self.shared.store.write().mark_read(id)
    }

    pub fn mark_all_read(&self) {
        self.shared.store.write().mark_all_read();
    }

    pub fn clear_notifications(&self) {
        self.shared.store.write().clear();
    }
}

impl Drop for NotificationClient {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.get_mut().take() {
            let _ = supervisor.stop.send(true);
        }
    }
}

/// Connect, run, and retry until stopped, rejected or out of attempts
async fn supervise(shared: Arc<Shared>, url: String, mut stop: watch::Receiver<bool>) {
    let config = &shared.config;
    let mut policy = ReconnectPolicy::new(config.reconnect_interval, config.max_reconnect_attempts);
    shared.set_status(ConnectionStatus::Connecting);

    loop {
        let attempt = tokio::select! {
            result = open(&url) => result,
            _ = stop.changed() => return,
        };

        match attempt {
            Ok(ws) => {
                policy.reset();
                info!(user_id = %config.user_id, "Notification client connected");
                match run_connection(&shared, ws, &mut stop).await {
                    ConnectionEnd::Stopped => return,
                    ConnectionEnd::Rejected => {
                        warn!(
                            user_id = %config.user_id,
                            "Server rejected connection; not retrying"
                        );
                        shared.set_status(ConnectionStatus::Disconnected);
                        return;
                    }
                    ConnectionEnd::Lost => {
                        info!(user_id = %config.user_id, "Connection lost");
                    }
                }
            }
            Err(e) => {
                warn!(user_id = %config.user_id, error = %e, "Connection attempt failed");
            }
        }

        let Some(delay) = policy.next_delay() else {
            error!(
                user_id = %config.user_id,
                attempts = policy.max_attempts(),
                "Max reconnection attempts reached"
            );
            if let Some(listener) = &shared.listener {
                listener.on_retries_exhausted();
            }
            shared.set_status(ConnectionStatus::Exhausted);
            return;
        };

        info!(
            attempt = policy.attempts(),
            max_attempts = policy.max_attempts(),
            delay = ?delay,
            "Reconnecting"
        );
        shared.set_status(ConnectionStatus::Reconnecting {
            attempt: policy.attempts(),
        });

        tokio::select! {
            _ = sleep(delay) => {}
            _ = stop.changed() => return,
        }
    }
}

async fn open(url: &str) -> Result<WsStream> {
    let (ws, _) = connect_async(url).await?;
    Ok(ws)
}

/// Pump one open connection until it ends
async fn run_connection(
    shared: &Shared,
    ws: WsStream,
    stop: &mut watch::Receiver<bool>,
) -> ConnectionEnd {
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    *shared.outbound.lock() = Some(tx);
    shared.set_status(ConnectionStatus::Connected);

    let mut keepalive = interval(shared.config.keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick
    keepalive.tick().await;

    let end = loop {
        tokio::select! {
            _ = stop.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                break ConnectionEnd::Stopped;
            }
            Some(message) = rx.recv() => {
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "Failed to send message");
                    break ConnectionEnd::Lost;
                }
            }
            _ = keepalive.tick() => {
                let ping = match WireMessage::Ping.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        error!(error = %e, "Failed to encode ping");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(ping)).await {
                    warn!(error = %e, "Keepalive failed");
                    break ConnectionEnd::Lost;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = shared.handle_text(&text) {
                        if let Err(e) = sink.send(reply).await {
                            warn!(error = %e, "Failed to send reply");
                            break ConnectionEnd::Lost;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Server closed connection");
                    let rejected = frame
                        .as_ref()
                        .map(|f| f.code == CloseCode::Policy)
                        .unwrap_or(false);
                    break if rejected {
                        ConnectionEnd::Rejected
                    } else {
                        ConnectionEnd::Lost
                    };
                }
                // Transport pings are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    break ConnectionEnd::Lost;
                }
                None => break ConnectionEnd::Lost,
            }
        }
    };

    shared.outbound.lock().take();
    end
}
