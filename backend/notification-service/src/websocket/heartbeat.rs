/// Heartbeat monitor
///
/// Every interval each registered connection either gets a probe or, if it
/// never answered the previous one, is closed. A connection therefore
/// survives at most one unanswered probe cycle.
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::gateway::close_connection;
use super::messages::heartbeat_timeout_reason;
use super::registry::ConnectionRegistry;
use crate::metrics;

/// Outcome of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub terminated: usize,
}

#[derive(Clone)]
pub struct HeartbeatMonitor {
    registry: ConnectionRegistry,
    interval: Duration,
}

impl HeartbeatMonitor {
    pub fn new(registry: ConnectionRegistry, interval: Duration) -> Self {
        Self { registry, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one probe cycle over a snapshot of the registry
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for handle in self.registry.all_handles() {
            if !handle.take_alive() {
                warn!(
                    user_id = %handle.user_id(),
                    connection_id = %handle.id(),
                    "Terminating dead connection"
                );
                close_connection(&self.registry, &handle, Some(heartbeat_timeout_reason()));
                metrics::record_heartbeat_termination();
                report.terminated += 1;
                continue;
            }

            if !handle.probe() {
                // Session already gone; the next sweep finds the flag cleared
                debug!(connection_id = %handle.id(), "Probe not queued");
            }
            report.probed += 1;
        }

        report
    }

    /// Sweep on a fixed interval until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick fires immediately; skip it so new connections get a full cycle
        ticker.tick().await;

        info!(interval = ?self.interval, "Heartbeat monitor started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sweep();
                    if report.terminated > 0 || report.probed > 0 {
                        debug!(
                            probed = report.probed,
                            terminated = report.terminated,
                            "Heartbeat sweep complete"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Heartbeat monitor stopped");
    }
}
