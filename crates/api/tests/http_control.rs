#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use loxsi_api::{Action, ActionDispatcher, ControlApi, ControlError, HttpControl, SourceScope};
use serde_json::{json, Value};
use url::Url;

type Log = Arc<Mutex<Vec<(String, String, Option<Value>)>>>;

async fn record(State((log, status)): State<(Log, StatusCode)>, method: Method, uri: Uri, body: String) -> (StatusCode, String) {
    let body = if body.is_empty() { None } else { Some(serde_json::from_str(&body).unwrap()) };
    log.lock().unwrap().push((method.to_string(), uri.path().to_string(), body));
    let text = if status.is_success() { String::new() } else { "unavailable".to_string() };
    (status, text)
}

async fn serve(status: StatusCode) -> (SocketAddr, Log) {
    let log: Log = Arc::default();
    let app = Router::new().fallback(record).with_state((log.clone(), status));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, log)
}

fn client(addr: SocketAddr) -> HttpControl {
    HttpControl::new(Url::parse(&format!("http://{addr}")).unwrap(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn actions_hit_their_endpoints() {
    let (addr, log) = serve(StatusCode::NO_CONTENT).await;
    let c = client(addr);
    let actions = [
        Action::UseSource { scope: SourceScope::Position, id: 2 },
        Action::SetMessage { message: "Last lap".into() },
        Action::ClearMessage,
        Action::SetFreeze { time: 1_714_558_500_000 },
        Action::ClearFreeze,
        Action::ForceRefresh,
    ];
    for a in &actions {
        assert_eq!(c.send(a).await.unwrap(), 204, "{}", a.name());
    }
    let got = log.lock().unwrap().clone();
    assert_eq!(
        got,
        vec![
            ("POST".into(), "/api/position/use/2".into(), None),
            ("POST".into(), "/api/message".into(), Some(json!({ "message": "Last lap" }))),
            ("DELETE".into(), "/api/message".into(), None),
            ("POST".into(), "/api/freeze".into(), Some(json!({ "time": 1_714_558_500_000i64 }))),
            ("DELETE".into(), "/api/freeze".into(), None),
            ("POST".into(), "/api/force-client-refresh".into(), None),
        ]
    );
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (addr, _log) = serve(StatusCode::SERVICE_UNAVAILABLE).await;
    let d = ActionDispatcher::new(Arc::new(client(addr)));
    match d.send(&Action::ForceRefresh).await {
        Err(ControlError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "unavailable");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let c = HttpControl::new(Url::parse("http://127.0.0.1:9").unwrap(), Duration::from_secs(2)).unwrap();
    assert!(matches!(c.send(&Action::ClearFreeze).await, Err(ControlError::Transport(_))));
}
