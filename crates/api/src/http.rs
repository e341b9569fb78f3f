//! reqwest-backed [`ControlApi`].

use std::time::{Duration, Instant};

use metrics::counter;
use tracing::{debug, info};
use url::Url;

use crate::action::{Action, Method};
use crate::{ControlApi, ControlError, ControlResult};

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Same-origin JSON client for the admin endpoints.
#[derive(Clone)]
pub struct HttpControl {
    client: reqwest::Client,
    base: Url,
}

impl HttpControl {
    pub fn new(base: Url, timeout: Duration) -> ControlResult<Self> {
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ControlError::InvalidUrl(format!("{base}: expected http or https")));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// Like [`HttpControl::new`], with the timeout from `LOXSI_HTTP_TIMEOUT_SECS`.
    pub fn from_env(base: Url) -> ControlResult<Self> {
        let secs = std::env::var("LOXSI_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(base, Duration::from_secs(secs))
    }

    /// Absolute URL of `action`, keeping any path prefix of the base.
    pub fn endpoint(&self, action: &Action) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{}", action.path()));
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

#[async_trait::async_trait]
impl ControlApi for HttpControl {
    async fn send(&self, action: &Action) -> ControlResult<u16> {
        let url = self.endpoint(action);
        let t0 = Instant::now();
        debug!(action = action.name(), method = action.method().as_str(), url = %url, "control request");
        let mut req = match action.method() {
            Method::Post => self.client.post(url.clone()),
            Method::Delete => self.client.delete(url.clone()),
        };
        if let Some(body) = action.body() {
            req = req.json(&body);
        }
        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                counter!("control_requests_total", "action" => action.name(), "outcome" => "transport").increment(1);
                return Err(e.into());
            }
        };
        let status = resp.status();
        if !status.is_success() {
            counter!("control_requests_total", "action" => action.name(), "outcome" => "status").increment(1);
            let body = resp.text().await.unwrap_or_default();
            return Err(ControlError::Status { status: status.as_u16(), body });
        }
        counter!("control_requests_total", "action" => action.name(), "outcome" => "ok").increment(1);
        info!(action = action.name(), status = status.as_u16(), took_ms = %t0.elapsed().as_millis(), "control ok");
        Ok(status.as_u16())
    }
}
