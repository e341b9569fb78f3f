//! Loxsi control API.
//!
//! Frontends depend on the [`ControlApi`] trait; [`HttpControl`] talks to the
//! server and [`MockControl`] records actions for tests.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{info, warn};

mod action;
mod http;

pub use action::{parse_freeze_time, Action, Method, SourceScope};
pub use http::{HttpControl, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid freeze time: {0}")]
    InvalidFreezeTime(String),
}

pub type ControlResult<T> = Result<T, ControlError>;

#[async_trait::async_trait]
pub trait ControlApi: Send + Sync {
    /// Send one action; returns the HTTP status on success.
    async fn send(&self, action: &Action) -> ControlResult<u16>;
}

/// Records every action; optionally answers with a fixed failure status.
#[derive(Default)]
pub struct MockControl {
    sent: Mutex<Vec<Action>>,
    pub fail_status: Option<u16>,
}

impl MockControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: u16) -> Self {
        Self { fail_status: Some(status), ..Self::default() }
    }

    pub fn sent(&self) -> Vec<Action> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl ControlApi for MockControl {
    async fn send(&self, action: &Action) -> ControlResult<u16> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(action.clone());
        match self.fail_status {
            Some(status) => Err(ControlError::Status { status, body: String::new() }),
            None => Ok(204),
        }
    }
}

/// Turns UI actions into control requests.
#[derive(Clone)]
pub struct ActionDispatcher {
    api: Arc<dyn ControlApi>,
}

impl ActionDispatcher {
    pub fn new(api: Arc<dyn ControlApi>) -> Self {
        Self { api }
    }

    /// Fire-and-forget: the outcome is only logged, never retried.
    pub fn fire(&self, action: Action) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            match api.send(&action).await {
                Ok(status) => info!(action = action.name(), status, "action sent"),
                Err(e) => warn!(action = action.name(), error = %e, "action failed"),
            }
        })
    }

    /// Send and wait for the outcome.
    pub async fn send(&self, action: &Action) -> ControlResult<u16> {
        self.api.send(action).await
    }
}
