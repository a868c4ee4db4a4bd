/// WebSocket session actors
///
/// One `NotificationSession` per accepted connection. It owns the socket,
/// drains the connection's command channel in order, and answers inbound
/// frames on the same connection within the same turn.
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web_actors::ws;
use notification_protocol::{Notification, WireMessage};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use super::control::{self, Subscriptions};
use super::gateway::close_connection;
use super::handle::{ConnectionHandle, SessionReceiver};
use super::messages::{authentication_required_reason, SessionCommand};
use super::registry::ConnectionRegistry;
use crate::metrics;

pub struct NotificationSession {
    handle: ConnectionHandle,
    registry: ConnectionRegistry,
    commands: Option<SessionReceiver>,
    subscriptions: Subscriptions,
}

impl NotificationSession {
    pub fn new(
        handle: ConnectionHandle,
        registry: ConnectionRegistry,
        commands: SessionReceiver,
    ) -> Self {
        Self {
            handle,
            registry,
            commands: Some(commands),
            subscriptions: Subscriptions::default(),
        }
    }

    fn reply(&self, message: &WireMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match message.to_json() {
            Ok(text) => ctx.text(text),
            Err(e) => error!(
                connection_id = %self.handle.id(),
                error = %e,
                "Failed to encode reply"
            ),
        }
    }
}

impl Actor for NotificationSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if let Some(commands) = self.commands.take() {
            ctx.add_stream(UnboundedReceiverStream::new(commands));
        }

        if !self.handle.mark_open() {
            // Closed before the handshake finished; never register
            ctx.stop();
            return;
        }
        self.registry.register(self.handle.clone());

        info!(
            user_id = %self.handle.user_id(),
            connection_id = %self.handle.id(),
            "WebSocket client connected"
        );

        let welcome = WireMessage::notification(Notification::welcome(self.handle.user_id()));
        self.reply(&welcome, ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        close_connection(&self.registry, &self.handle, None);
        info!(
            user_id = %self.handle.user_id(),
            connection_id = %self.handle.id(),
            "WebSocket client disconnected"
        );
    }
}

// Commands queued by the dispatcher, heartbeat and shutdown
impl StreamHandler<SessionCommand> for NotificationSession {
    fn handle(&mut self, command: SessionCommand, ctx: &mut Self::Context) {
        match command {
            SessionCommand::Frame(text) => ctx.text(text),
            SessionCommand::Probe => ctx.ping(b""),
            SessionCommand::Close(reason) => {
                ctx.close(Some(reason));
                ctx.stop();
            }
        }
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {
        // The handle keeps a sender alive, so this only happens on teardown
    }
}

// Frames from the peer
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for NotificationSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(
                    user_id = %self.handle.user_id(),
                    connection_id = %self.handle.id(),
                    error = %e,
                    "WebSocket protocol error"
                );
                ctx.stop();
                return;
            }
        };

        match msg {
            ws::Message::Ping(bytes) => ctx.pong(&bytes),
            ws::Message::Pong(_) => self.handle.mark_alive(),
            ws::Message::Text(text) => {
                if let Some(reply) =
                    control::handle_text(&text, self.handle.user_id(), &mut self.subscriptions)
                {
                    self.reply(&reply, ctx);
                }
            }
            ws::Message::Binary(_) => {
                metrics::record_malformed_frame();
                let reply = WireMessage::error(
                    "Invalid message format",
                    Some("binary frames are not supported".to_string()),
                );
                self.reply(&reply, ctx);
            }
            ws::Message::Close(reason) => {
                debug!(
                    connection_id = %self.handle.id(),
                    reason = ?reason,
                    "Client closed connection"
                );
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) | ws::Message::Nop => {}
        }
    }
}

/// Session for an upgrade without a resolvable identity
///
/// Closes with 1008 as soon as it starts; it is never registered.
pub struct RejectedSession;

impl Actor for RejectedSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.close(Some(authentication_required_reason()));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RejectedSession {
    fn handle(&mut self, _msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        ctx.stop();
    }
}
