//! Periodic polling of the workbook source.
//!
//! Each tick resolves the active workbook and its modification time, then
//! drives the dashboard: a new path (or nothing loaded yet) triggers a reload,
//! a newer modification time triggers one only while auto-refresh is on, and a
//! vanished path clears every view. Ticks run one at a time; a tick that
//! overruns the interval makes the next one skip.

use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dashboard::Dashboard;
use crate::events::DashboardEvent;
use crate::io::SourceIdentity;

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do
    Unchanged,
    /// Workbook changed on disk but auto-refresh is off
    Deferred,
    Reloaded { generation: u64 },
    LoadFailed,
    PathLost,
    /// No workbook is configured or discoverable
    NoSource,
}

/// Source poller. Owns the last identity it successfully loaded.
pub struct SourceWatcher {
    dashboard: Arc<Dashboard>,
    last_loaded: Option<SourceIdentity>,
    last_failed: Option<SourceIdentity>,
}

impl SourceWatcher {
    pub fn new(dashboard: Arc<Dashboard>) -> Self {
        Self {
            dashboard,
            last_loaded: None,
            last_failed: None,
        }
    }

    pub fn last_loaded(&self) -> Option<&SourceIdentity> {
        self.last_loaded.as_ref()
    }

    async fn resolve(&self) -> Option<SourceIdentity> {
        let source = Arc::clone(self.dashboard.source());
        match tokio::task::spawn_blocking(move || source.identity()).await {
            Ok(identity) => identity,
            Err(e) => {
                error!("Workbook resolution task failed: {}", e);
                None
            }
        }
    }

    /// Run one polling step.
    pub async fn tick(&mut self) -> TickOutcome {
        let Some(identity) = self.resolve().await else {
            self.last_loaded = None;
            self.last_failed = None;
            return if self.dashboard.handle_path_lost().await {
                TickOutcome::PathLost
            } else {
                TickOutcome::NoSource
            };
        };

        if self.last_loaded.as_ref() == Some(&identity) {
            return TickOutcome::Unchanged;
        }

        let same_path = self
            .last_loaded
            .as_ref()
            .is_some_and(|loaded| loaded.path == identity.path);
        if same_path && !self.dashboard.auto_refresh() {
            debug!(
                "'{}' modified at {}, auto-refresh disabled",
                identity.path.display(),
                identity.modified_label()
            );
            return TickOutcome::Deferred;
        }

        match self.dashboard.reload_source(identity.clone()).await {
            Ok(generation) => {
                info!(
                    "Loaded '{}' (modified {})",
                    identity.path.display(),
                    identity.modified_label()
                );
                self.last_loaded = Some(identity);
                self.last_failed = None;
                TickOutcome::Reloaded { generation }
            }
            Err(e) => {
                // Alert once per failing file version; later ticks retry quietly
                if self.last_failed.as_ref() != Some(&identity) {
                    self.dashboard.events().publish(DashboardEvent::LoadFailed {
                        message: e.to_string(),
                    });
                    self.last_failed = Some(identity);
                }
                TickOutcome::LoadFailed
            }
        }
    }
}

/// Start the polling loop. Returns `None` if a watcher is already running for
/// this dashboard.
pub fn spawn_watcher(
    dashboard: Arc<Dashboard>,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if !dashboard.claim_watcher() {
        error!("Source watcher already running");
        return None;
    }

    let period = Duration::from_millis(dashboard.config().base().watcher.tick_millis.max(1));
    let mut watcher = SourceWatcher::new(Arc::clone(&dashboard));
    Some(tokio::spawn(async move {
        info!("Source watcher started ({:?} interval)", period);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = watcher.tick().await;
                    debug!("Watcher tick: {:?}", outcome);
                }
            }
        }
        dashboard.release_watcher();
        info!("Source watcher stopped");
    }))
}
