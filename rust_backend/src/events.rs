//! Signals emitted to the UI layer.

use log::debug;
use tokio::sync::broadcast;

use crate::core::domain::DataStatus;

/// Observable changes of the dashboard core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    /// A workbook became available or was lost
    DataStatusChanged(DataStatus),
    /// `raw`/`unfiltered` were replaced (or cleared)
    DataChanged { generation: u64 },
    /// `active`/`totals` were replaced
    FilterChanged { fingerprint: String },
    /// A workbook could not be loaded; the previous data is still served
    LoadFailed { message: String },
}

/// Broadcast channel fan-out. Slow subscribers lose the oldest events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DashboardEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: DashboardEvent) {
        debug!("Event: {:?}", event);
        // No subscriber is not an error
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
