//! Loxsi feed client: keeps the public and admin feeds connected and applies
//! their envelopes to a single view owned by one update loop.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use loxsi_core::{topics, Feed};
use loxsi_store::{reconcile, DashboardState, ViewHandle, ViewPublisher};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use url::Url;

pub mod connection;
pub mod dispatch;

pub use connection::{feed_url, run_feed, FeedEvent, ReconnectPolicy};
pub use dispatch::{admin_registry, public_registry, DispatchOutcome, Dispatcher, TopicRegistry};

pub const DEFAULT_URL: &str = "http://localhost:8000";

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("connecting to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },
    #[error("{feed} feed closed")]
    Closed { feed: Feed },
}

/// Feed client settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Server origin; socket URLs are derived from it.
    pub base_url: Url,
    /// Capacity of the channel between connections and the update loop.
    pub queue_cap: usize,
    pub reconnect: ReconnectPolicy,
}

impl FeedConfig {
    pub fn new(base_url: Url) -> Self {
        Self { base_url, queue_cap: 2048, reconnect: ReconnectPolicy::default() }
    }

    /// Read `LOXSI_URL`, `LOXSI_QUEUE_CAP`, `LOXSI_RECONNECT`,
    /// `LOXSI_RECONNECT_BASE_MS` and `LOXSI_RECONNECT_MAX_SECS`.
    pub fn from_env() -> Result<Self, FeedError> {
        let raw = std::env::var("LOXSI_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let base_url = parse_base_url(&raw)?;
        let queue_cap = std::env::var("LOXSI_QUEUE_CAP").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(2048);
        let reconnect = match std::env::var("LOXSI_RECONNECT").ok().as_deref() {
            Some("off") | Some("0") | Some("false") => ReconnectPolicy::Disabled,
            _ => {
                let base_ms = std::env::var("LOXSI_RECONNECT_BASE_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(500);
                let max_secs = std::env::var("LOXSI_RECONNECT_MAX_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(30);
                ReconnectPolicy::Exponential {
                    base: Duration::from_millis(base_ms),
                    max: Duration::from_secs(max_secs),
                    max_attempts: None,
                }
            }
        };
        Ok(Self { base_url, queue_cap: queue_cap.max(1), reconnect })
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, FeedError> {
    Url::parse(raw).map_err(|e| FeedError::InvalidUrl { url: raw.to_string(), reason: e.to_string() })
}

/// Single writer of the dashboard view. Owns one dispatcher per feed.
pub struct UpdateLoop {
    state: DashboardState,
    public: Dispatcher<DashboardState>,
    admin: Dispatcher<DashboardState>,
}

impl Default for UpdateLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateLoop {
    pub fn new() -> Self {
        Self {
            state: DashboardState::new(),
            public: Dispatcher::standard(Feed::Public),
            admin: Dispatcher::standard(Feed::Admin),
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Apply one event. Returns whether the view may have changed.
    pub fn apply(&mut self, event: &FeedEvent) -> bool {
        match event {
            FeedEvent::Connected(feed) => {
                reconcile::connected(*feed, &mut self.state);
                true
            }
            FeedEvent::Disconnected(feed) => {
                warn!(feed = %feed, "feed disconnected");
                false
            }
            FeedEvent::Envelope(feed, env) => {
                let dispatcher = match feed {
                    Feed::Public => &self.public,
                    Feed::Admin => &self.admin,
                };
                dispatcher.dispatch(env, &mut self.state) == DispatchOutcome::Applied
            }
        }
    }
}

/// Handle to a running dashboard: snapshot reader plus task cancellation.
pub struct DashboardHandle {
    pub view: ViewHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl DashboardHandle {
    pub fn cancel(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for DashboardHandle {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Connect `feeds` and spawn the update loop. Every applied event publishes a
/// new snapshot; the epoch channel closes once all feeds have given up.
pub fn spawn_dashboard(cfg: &FeedConfig, feeds: &[Feed]) -> Result<DashboardHandle, FeedError> {
    let (tx, mut rx) = mpsc::channel::<FeedEvent>(cfg.queue_cap.max(1));
    let (mut publisher, view) = ViewPublisher::new();
    let mut tasks = Vec::with_capacity(feeds.len() + 1);
    let mut public_restart: Option<Arc<Notify>> = None;

    for &feed in feeds {
        let url = feed_url(&cfg.base_url, feed)?;
        let restart = Arc::new(Notify::new());
        if feed == Feed::Public {
            public_restart = Some(Arc::clone(&restart));
        }
        let tx = tx.clone();
        let policy = cfg.reconnect;
        tasks.push(tokio::spawn(async move {
            info!(feed = %feed, url = %url, "feed task starting");
            match run_feed(feed, url, policy, tx, restart).await {
                Ok(()) => info!(feed = %feed, "feed task ended"),
                Err(e) => error!(feed = %feed, error = %e, "feed task stopped"),
            }
        }));
    }
    drop(tx);

    tasks.push(tokio::spawn(async move {
        let mut update = UpdateLoop::new();
        publisher.publish(update.state());
        while let Some(event) = rx.recv().await {
            let changed = update.apply(&event);
            if let FeedEvent::Envelope(Feed::Public, env) = &event {
                if env.topic == topics::REFRESH {
                    if let Some(restart) = &public_restart {
                        restart.notify_one();
                    }
                }
            }
            if changed {
                publisher.publish(update.state());
            }
        }
        info!(epoch = publisher.epoch(), "update loop stopped");
    }));

    Ok(DashboardHandle { view, tasks })
}
