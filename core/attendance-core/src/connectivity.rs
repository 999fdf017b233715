//! Online/offline tracking and the drain trigger.
//!
//! Only an offline → online edge drains the queue. Repeated `online` signals
//! are no-ops, and going offline never touches the network.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::error::Result;
use crate::sync::{DrainOutcome, QueueDrainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Online => f.write_str("online"),
            Connectivity::Offline => f.write_str("offline"),
        }
    }
}

pub struct ConnectivityMonitor {
    drainer: Arc<QueueDrainer>,
    state: watch::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    pub fn new(drainer: Arc<QueueDrainer>, initial: Connectivity) -> Self {
        let (state, _) = watch::channel(initial);
        ConnectivityMonitor { drainer, state }
    }

    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current() == Connectivity::Online
    }

    /// Observers see every change of connectivity.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }

    /// Marks the client online. Returns the drain outcome when this call was
    /// the offline → online edge, `None` otherwise.
    pub async fn online(&self) -> Result<Option<DrainOutcome>> {
        let previous = self.state.send_replace(Connectivity::Online);
        if previous == Connectivity::Online {
            return Ok(None);
        }
        info!("Connectivity restored; draining pending actions");
        self.drain_if_online().await.map(Some)
    }

    pub fn offline(&self) {
        let previous = self.state.send_replace(Connectivity::Offline);
        if previous == Connectivity::Online {
            info!("Connectivity lost; decisions will be queued");
        }
    }

    /// Called when a remote call could not reach the service.
    pub fn report_unreachable(&self) {
        self.offline();
    }

    /// Drains the queue unless offline. A drain that finds the service
    /// unreachable flips the monitor offline.
    pub async fn drain_if_online(&self) -> Result<DrainOutcome> {
        if !self.is_online() {
            return Ok(DrainOutcome::Offline);
        }
        let outcome = self.drainer.drain().await?;
        if let DrainOutcome::Completed(report) = &outcome {
            if report.unreachable() {
                self.report_unreachable();
            }
        }
        Ok(outcome)
    }
}
