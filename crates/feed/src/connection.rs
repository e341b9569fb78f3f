//! WebSocket feed connections.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use loxsi_core::{parse_frame, parse_frame_bytes, Envelope, Feed, Frame, Frames};
use metrics::counter;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::FeedError;

/// What a connection task reports to the update loop, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected(Feed),
    Disconnected(Feed),
    Envelope(Feed, Envelope),
}

/// What to do after a feed connection drops or fails to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// A closed feed stays closed.
    Disabled,
    Exponential { base: Duration, max: Duration, max_attempts: Option<u32> },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (0-based), or `None` to give up.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            ReconnectPolicy::Disabled => None,
            ReconnectPolicy::Exponential { base, max, max_attempts } => {
                if max_attempts.is_some_and(|limit| attempt >= limit) {
                    return None;
                }
                let factor = 2u32.saturating_pow(attempt.min(16));
                Some(base.saturating_mul(factor).min(max))
            }
        }
    }
}

/// WebSocket URL of `feed` on the server at `base`. The socket scheme follows
/// the base scheme so TLS-terminated deployments get `wss`.
pub fn feed_url(base: &Url, feed: Feed) -> Result<Url, FeedError> {
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(FeedError::InvalidUrl {
                url: base.to_string(),
                reason: format!("unsupported scheme {other:?}"),
            })
        }
    };
    let mut url = base.clone();
    url.set_scheme(scheme).map_err(|_| FeedError::InvalidUrl {
        url: base.to_string(),
        reason: format!("cannot switch scheme to {scheme}"),
    })?;
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}{}", feed.path()));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

pub(crate) enum PumpEnd {
    /// The update loop is gone; stop for good.
    ReceiverGone,
    /// Reconnect right away (server asked clients to refresh).
    Restart,
    Closed(String),
}

/// Forward decoded envelopes; pings and malformed frames stop here.
async fn forward(feed: Feed, frames: Frames, tx: &mpsc::Sender<FeedEvent>) -> Result<(), PumpEnd> {
    for frame in frames {
        match frame {
            Ok(Frame::Ping) => {
                counter!("feed_pings_total", "feed" => feed.to_string()).increment(1);
                trace!(feed = %feed, "ping");
            }
            Ok(Frame::Envelope(env)) => {
                counter!("feed_frames_total", "feed" => feed.to_string()).increment(1);
                if tx.send(FeedEvent::Envelope(feed, env)).await.is_err() {
                    return Err(PumpEnd::ReceiverGone);
                }
            }
            Err(e) => {
                counter!("feed_frame_errors_total", "feed" => feed.to_string()).increment(1);
                warn!(feed = %feed, error = %e, "dropping malformed frame");
            }
        }
    }
    Ok(())
}

/// Read one connection until it ends, in arrival order.
pub(crate) async fn pump<S>(feed: Feed, mut ws: S, tx: &mpsc::Sender<FeedEvent>, restart: &Notify) -> PumpEnd
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            msg = ws.next() => {
                let frames = match msg {
                    Some(Ok(Message::Text(text))) => parse_frame(&text),
                    Some(Ok(Message::Binary(bytes))) => parse_frame_bytes(&bytes),
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| f.to_string()).unwrap_or_else(|| "no close frame".to_string());
                        return PumpEnd::Closed(reason);
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return PumpEnd::Closed(e.to_string()),
                    None => return PumpEnd::Closed("stream ended".to_string()),
                };
                if let Err(end) = forward(feed, frames, tx).await {
                    return end;
                }
            }
            _ = restart.notified() => return PumpEnd::Restart,
            _ = tx.closed() => return PumpEnd::ReceiverGone,
        }
    }
}

/// Keep `feed` connected according to `policy`, forwarding events into `tx`.
///
/// Returns `Ok(())` once the receiving side is dropped, or the last failure when
/// the policy gives up.
pub async fn run_feed(
    feed: Feed,
    url: Url,
    policy: ReconnectPolicy,
    tx: mpsc::Sender<FeedEvent>,
    restart: Arc<Notify>,
) -> Result<(), FeedError> {
    let mut attempt: u32 = 0;
    loop {
        let failure = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws, _resp)) => {
                attempt = 0;
                info!(feed = %feed, url = %url, "feed connected");
                if tx.send(FeedEvent::Connected(feed)).await.is_err() {
                    return Ok(());
                }
                let end = pump(feed, ws, &tx, &restart).await;
                if tx.send(FeedEvent::Disconnected(feed)).await.is_err() {
                    return Ok(());
                }
                match end {
                    PumpEnd::ReceiverGone => return Ok(()),
                    PumpEnd::Restart => {
                        info!(feed = %feed, "refresh requested; reconnecting");
                        continue;
                    }
                    PumpEnd::Closed(reason) => {
                        warn!(feed = %feed, reason = %reason, "feed connection closed");
                        FeedError::Closed { feed }
                    }
                }
            }
            Err(e) => {
                warn!(feed = %feed, url = %url, error = %e, "feed connect failed");
                FeedError::Connect { url: url.to_string(), source: Box::new(e) }
            }
        };

        let Some(delay) = policy.delay(attempt) else {
            warn!(feed = %feed, attempts = attempt, "giving up on feed");
            return Err(failure);
        };
        attempt = attempt.saturating_add(1);
        counter!("feed_reconnects_total", "feed" => feed.to_string()).increment(1);
        debug!(feed = %feed, attempt, delay_ms = %delay.as_millis(), "reconnecting after delay");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = restart.notified() => {}
            _ = tx.closed() => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct LogBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn feed_url_follows_page_scheme() {
        let https = Url::parse("https://scores.example.org/").unwrap();
        assert_eq!(feed_url(&https, Feed::Public).unwrap().as_str(), "wss://scores.example.org/feed");
        let http = Url::parse("http://localhost:8000").unwrap();
        assert_eq!(feed_url(&http, Feed::Admin).unwrap().as_str(), "ws://localhost:8000/admin/feed");
    }

    #[test]
    fn feed_url_keeps_path_prefix_and_drops_query() {
        let base = Url::parse("https://example.org/loxsi/?x=1#top").unwrap();
        assert_eq!(feed_url(&base, Feed::Admin).unwrap().as_str(), "wss://example.org/loxsi/admin/feed");
    }

    #[test]
    fn feed_url_rejects_other_schemes() {
        let base = Url::parse("ftp://example.org/").unwrap();
        assert!(matches!(feed_url(&base, Feed::Public), Err(FeedError::InvalidUrl { .. })));
    }

    #[test]
    fn exponential_policy_doubles_and_caps() {
        let p = ReconnectPolicy::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            max_attempts: Some(6),
        };
        let delays: Vec<u128> = (0..6).map(|a| p.delay(a).unwrap().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(p.delay(6), None);
        assert_eq!(ReconnectPolicy::Disabled.delay(0), None);
        assert!(ReconnectPolicy::default().delay(u32::MAX).is_some());
    }

    #[tokio::test]
    async fn pump_forwards_envelopes_in_order_and_skips_noise() {
        let (tx, mut rx) = mpsc::channel(16);
        let restart = Notify::new();
        let msgs: Vec<Result<Message, tungstenite::Error>> = vec![
            Ok(Message::Text(r#"{"ping":"pong"}"#.to_string())),
            Ok(Message::Text(r#"{"topic":"message","data":"one"}"#.to_string())),
            Ok(Message::Text("garbage".to_string())),
            Ok(Message::Ping(vec![1])),
            Ok(Message::Binary(br#"{"topic":"frozen","data":true}"#.to_vec())),
        ];
        let end = pump(Feed::Public, stream::iter(msgs), &tx, &restart).await;
        assert!(matches!(end, PumpEnd::Closed(_)));
        drop(tx);
        let mut got = Vec::new();
        while let Some(ev) = rx.recv().await {
            got.push(ev);
        }
        assert_eq!(
            got,
            vec![
                FeedEvent::Envelope(Feed::Public, Envelope::new("message", json!("one"))),
                FeedEvent::Envelope(Feed::Public, Envelope::new("frozen", json!(true))),
            ]
        );
    }

    #[tokio::test]
    async fn pings_are_silent_and_never_forwarded() {
        let buf = LogBuf::default();
        let writer = buf.clone();
        let sub = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let _guard = tracing::subscriber::set_default(sub);

        let (tx, mut rx) = mpsc::channel(16);
        let restart = Notify::new();
        let msgs: Vec<Result<Message, tungstenite::Error>> = vec![
            Ok(Message::Text(r#"{"ping":"pong"}"#.to_string())),
            Ok(Message::Text(r#"{"topic": "ping", "data": "ping"}"#.to_string())),
            Ok(Message::Text("{}\n{\"ping\":\"pong\"}".to_string())),
        ];
        pump(Feed::Admin, stream::iter(msgs), &tx, &restart).await;
        drop(tx);
        assert!(rx.recv().await.is_none());

        let logs = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.lines().filter(|l| l.contains("ping")).count(), 4, "{logs}");
        assert!(logs.lines().all(|l| !l.contains("WARN") && !l.contains("ERROR")), "{logs}");
    }

    #[tokio::test]
    async fn pump_stops_on_restart_request() {
        let (tx, _rx) = mpsc::channel(4);
        let restart = Notify::new();
        restart.notify_one();
        let ws = stream::pending::<Result<Message, tungstenite::Error>>();
        let end = pump(Feed::Public, ws, &tx, &restart).await;
        assert!(matches!(end, PumpEnd::Restart));
    }

    #[tokio::test]
    async fn disabled_policy_gives_up_after_first_failure() {
        let (tx, _rx) = mpsc::channel(4);
        // port 9 (discard) on localhost is expected to refuse connections
        let url = Url::parse("ws://127.0.0.1:9/feed").unwrap();
        let res = run_feed(Feed::Public, url, ReconnectPolicy::Disabled, tx, Arc::new(Notify::new())).await;
        assert!(matches!(res, Err(FeedError::Connect { .. })));
    }
}
