/// Notification hub
///
/// Owns the process-wide notification state: the registry, the dispatcher
/// built on it and the heartbeat task. Created once in `main`, started
/// before the server binds and shut down after it stops.
use actix_web::dev::ServerHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::dispatcher::Dispatcher;
use crate::config::Config;
use crate::websocket::messages::shutdown_reason;
use crate::websocket::{
    close_connection, ConnectionRegistry, GatewayState, HeartbeatMonitor, IdentityResolver,
    QueryParamIdentity,
};

pub struct NotificationHub {
    registry: ConnectionRegistry,
    dispatcher: Dispatcher,
    identity: Arc<dyn IdentityResolver>,
    heartbeat_interval: Duration,
    max_frame_size: usize,
    shutdown_tx: watch::Sender<bool>,
    heartbeat_task: Option<JoinHandle<()>>,
}

impl NotificationHub {
    pub fn new(config: &Config) -> Self {
        let registry = ConnectionRegistry::new();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            dispatcher: Dispatcher::new(registry.clone()),
            registry,
            identity: Arc::new(QueryParamIdentity::default()),
            heartbeat_interval: config.websocket.heartbeat_interval(),
            max_frame_size: config.websocket.max_frame_size,
            shutdown_tx,
            heartbeat_task: None,
        }
    }

    /// Replace how upgrade requests are mapped to users
    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// State handed to the upgrade handler
    pub fn gateway_state(&self) -> GatewayState {
        GatewayState {
            registry: self.registry.clone(),
            identity: self.identity.clone(),
            max_frame_size: self.max_frame_size,
        }
    }

    /// Spawn the heartbeat monitor; calling twice is a no-op
    pub fn start(&mut self) {
        if self.heartbeat_task.is_some() {
            return;
        }
        let monitor = HeartbeatMonitor::new(self.registry.clone(), self.heartbeat_interval);
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.heartbeat_task = Some(tokio::spawn(monitor.run(shutdown_rx)));
        info!("Notification hub started");
    }

    /// Stop the heartbeat and close every connection with 1001
    ///
    /// Returns the number of connections closed.
    pub async fn shutdown(&mut self) -> usize {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.heartbeat_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Heartbeat task ended abnormally");
            }
        }

        let handles = self.registry.drain();
        let closed = handles.len();
        for handle in &handles {
            close_connection(&self.registry, handle, Some(shutdown_reason()));
        }

        info!(closed, "Notification hub shut down");
        closed
    }

    /// Shut down alongside the HTTP server that feeds this hub
    ///
    /// New connections stop being accepted first, so nothing registers
    /// after the drain and misses its 1001.
    pub async fn shutdown_with_server(&mut self, server: &ServerHandle) -> usize {
        server.pause().await;
        let closed = self.shutdown().await;
        server.stop(true).await;
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::{ConnectionHandle, ConnectionState, SessionCommand};

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let mut hub = NotificationHub::new(&Config::default());
        hub.start();

        let (a, mut rx_a) = ConnectionHandle::channel("alice");
        let (b, _rx_b) = ConnectionHandle::channel("bob");
        for h in [&a, &b] {
            h.mark_open();
            hub.registry().register(h.clone());
        }

        assert_eq!(hub.shutdown().await, 2);
        assert_eq!(hub.registry().total_connections(), 0);
        assert_eq!(a.state(), ConnectionState::Closed);
        assert_eq!(b.state(), ConnectionState::Closed);
        assert_eq!(rx_a.try_recv().unwrap(), SessionCommand::Close(shutdown_reason()));
    }

    #[tokio::test]
    async fn test_dispatcher_shares_registry() {
        let hub = NotificationHub::new(&Config::default());
        let (h, _rx) = ConnectionHandle::channel("alice");
        h.mark_open();
        hub.gateway_state().registry.register(h);

        let n = hub.dispatcher().create_notification(
            "alice",
            "t",
            "m",
            notification_protocol::NotificationData::System(Default::default()),
        );
        assert_eq!(hub.dispatcher().send_to_user("alice", &n), 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_start() {
        let mut hub = NotificationHub::new(&Config::default());
        assert_eq!(hub.shutdown().await, 0);
    }
}
