/// Connection gateway
///
/// Accepts upgrade requests on the WebSocket path, resolves the caller's
/// identity and hands the socket to a `NotificationSession`. Also owns the
/// one cleanup path every close goes through.
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws::{self, CloseReason};
use std::sync::Arc;
use tracing::{info, warn};

use super::handle::{ConnectionHandle, ConnectionState};
use super::identity::IdentityResolver;
use super::registry::ConnectionRegistry;
use super::session::{NotificationSession, RejectedSession};
use crate::metrics;

/// Everything the upgrade handler needs, shared through `web::Data`
#[derive(Clone)]
pub struct GatewayState {
    pub registry: ConnectionRegistry,
    pub identity: Arc<dyn IdentityResolver>,
    pub max_frame_size: usize,
}

/// Close a connection and release its registry membership
///
/// Safe to call any number of times from any path (client close, transport
/// error, heartbeat timeout, shutdown). Only the first call asks the
/// transport to close; every call ends with the handle deregistered and
/// `Closed`. Returns whether this call started the close.
pub fn close_connection(
    registry: &ConnectionRegistry,
    handle: &ConnectionHandle,
    reason: Option<CloseReason>,
) -> bool {
    let started = handle.begin_close();
    if started {
        if let Some(reason) = reason {
            // The session may already be gone; deregistration below still runs
            handle.request_close(reason);
        }
    }

    registry.deregister(handle);
    if handle.state() != ConnectionState::Closed {
        handle.mark_closed();
    }
    started
}

/// WebSocket upgrade endpoint
///
/// Endpoint: GET {ws_path}?userId={user_id}
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<GatewayState>,
) -> Result<HttpResponse, Error> {
    let Some(user_id) = state.identity.resolve(&req) else {
        warn!(
            peer = ?req.peer_addr(),
            "WebSocket connection rejected: no user ID"
        );
        metrics::record_rejected_connection();
        return ws::start(RejectedSession, &req, stream);
    };

    let (handle, commands) = ConnectionHandle::channel(user_id);
    info!(
        user_id = %handle.user_id(),
        connection_id = %handle.id(),
        "WebSocket upgrade accepted"
    );

    let session = NotificationSession::new(handle, state.registry.clone(), commands);
    ws::WsResponseBuilder::new(session, &req, stream)
        .frame_size(state.max_frame_size)
        .start()
}
