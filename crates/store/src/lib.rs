//! Loxsi view state: the view port, the reconciler handlers, and the snapshot
//! publisher that lets readers observe the view without blocking its writer.

#![forbid(unsafe_code)]

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

pub mod reconcile;
mod state;
mod view;

pub use state::{Bar, DashboardState, CONNECTING};
pub use view::{Color, SourceControl, SourceKind, TextSlot, Theme, View, PALETTE};

/// Writer half: owned by the single update loop that mutates the view.
pub struct ViewPublisher {
    snap: Arc<ArcSwap<DashboardState>>,
    epoch: u64,
    epoch_tx: watch::Sender<u64>,
}

impl ViewPublisher {
    pub fn new() -> (Self, ViewHandle) {
        let snap = Arc::new(ArcSwap::from_pointee(DashboardState::new()));
        let (epoch_tx, epoch_rx) = watch::channel(0u64);
        let handle = ViewHandle { snap: Arc::clone(&snap), epoch_rx };
        (Self { snap, epoch: 0, epoch_tx }, handle)
    }

    /// Freeze a copy of `state` for readers and bump the epoch.
    pub fn publish(&mut self, state: &DashboardState) -> u64 {
        self.epoch = self.epoch.saturating_add(1);
        self.snap.store(Arc::new(state.clone()));
        let _ = self.epoch_tx.send(self.epoch);
        metrics::counter!("view_publish_total").increment(1);
        self.epoch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Reader half: current snapshot plus change notifications.
#[derive(Clone)]
pub struct ViewHandle {
    snap: Arc<ArcSwap<DashboardState>>,
    epoch_rx: watch::Receiver<u64>,
}

impl ViewHandle {
    pub fn current(&self) -> Arc<DashboardState> {
        self.snap.load_full()
    }

    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> {
        self.epoch_rx.clone()
    }
}
