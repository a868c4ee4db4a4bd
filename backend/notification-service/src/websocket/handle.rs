use notification_protocol::WireMessage;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::SessionCommand;
use actix_web_actors::ws::CloseReason;

/// Type alias for the channel feeding a session's transport
pub type SessionSender = mpsc::UnboundedSender<SessionCommand>;
pub type SessionReceiver = mpsc::UnboundedReceiver<SessionCommand>;

/// Unique identifier for a WebSocket connection
///
/// Two tabs of the same user get two ids; the registry keys its per-user
/// sets by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

struct HandleInner {
    id: ConnectionId,
    user_id: String,
    alive: AtomicBool,
    state: Mutex<ConnectionState>,
    sender: SessionSender,
}

/// Shared view of one live connection
///
/// Cheap to clone; every clone points at the same connection. The session
/// actor owns the socket, everything else talks to it through this handle.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl ConnectionHandle {
    pub fn new(user_id: impl Into<String>, sender: SessionSender) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: ConnectionId::new(),
                user_id: user_id.into(),
                alive: AtomicBool::new(true),
                state: Mutex::new(ConnectionState::Connecting),
                sender,
            }),
        }
    }

    /// Handle plus the receiving end its session drains
    pub fn channel(user_id: impl Into<String>) -> (Self, SessionReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(user_id, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Probe answered
    pub fn mark_alive(&self) {
        self.inner.alive.store(true, Ordering::SeqCst);
    }

    /// Clear the liveness flag ahead of a probe, returning its previous value
    pub(crate) fn take_alive(&self) -> bool {
        self.inner.alive.swap(false, Ordering::SeqCst)
    }

    /// `Connecting -> Open`; false if the connection already moved on
    pub fn mark_open(&self) -> bool {
        let mut state = self.inner.state.lock();
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Open;
            true
        } else {
            false
        }
    }

    /// `Connecting | Open -> Closing`; false if closing already started
    pub(crate) fn begin_close(&self) -> bool {
        let mut state = self.inner.state.lock();
        match *state {
            ConnectionState::Connecting | ConnectionState::Open => {
                *state = ConnectionState::Closing;
                true
            }
            ConnectionState::Closing | ConnectionState::Closed => false,
        }
    }

    pub(crate) fn mark_closed(&self) {
        *self.inner.state.lock() = ConnectionState::Closed;
    }

    /// Queue a pre-encoded text frame; skipped unless the connection is open
    pub fn send_frame(&self, frame: String) -> bool {
        if !self.is_open() {
            return false;
        }
        self.inner.sender.send(SessionCommand::Frame(frame)).is_ok()
    }

    pub fn send(&self, message: &WireMessage) -> bool {
        match message.to_json() {
            Ok(frame) => self.send_frame(frame),
            Err(e) => {
                tracing::error!(
                    connection_id = %self.id(),
                    error = %e,
                    "Failed to encode outbound message"
                );
                false
            }
        }
    }

    pub(crate) fn probe(&self) -> bool {
        self.inner.sender.send(SessionCommand::Probe).is_ok()
    }

    pub(crate) fn request_close(&self, reason: CloseReason) -> bool {
        self.inner.sender.send(SessionCommand::Close(reason)).is_ok()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id())
            .field("user_id", &self.user_id())
            .field("state", &self.state())
            .field("alive", &self.is_alive())
            .finish()
    }
}
