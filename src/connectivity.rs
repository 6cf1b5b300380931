//! Reachability reporting.
//!
//! The platform's path monitor calls [`ConnectivityMonitor::report`] with
//! the current reachability; the monitor deduplicates repeats and forwards
//! only transitions to the launcher.

use std::sync::Mutex;

use log::warn;
use tokio::sync::mpsc;

use crate::events::LaunchCommand;

/// Leaf adapter between the platform's reachability callbacks and the
/// launcher command channel.
pub struct ConnectivityMonitor {
    cmd_tx: mpsc::Sender<LaunchCommand>,
    last: Mutex<Option<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(cmd_tx: mpsc::Sender<LaunchCommand>) -> Self {
        Self {
            cmd_tx,
            last: Mutex::new(None),
        }
    }

    /// Reports the current reachability. Consecutive identical reports are
    /// dropped; only transitions reach the launcher.
    pub fn report(&self, reachable: bool) {
        {
            let Ok(mut last) = self.last.lock() else {
                return;
            };
            if *last == Some(reachable) {
                return;
            }
            *last = Some(reachable);
        }

        if let Err(e) = self
            .cmd_tx
            .try_send(LaunchCommand::ConnectivityChanged { reachable })
        {
            warn!("connectivity report dropped: {}", e);
        }
    }
}
