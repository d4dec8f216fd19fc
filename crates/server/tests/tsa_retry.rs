#![forbid(unsafe_code)]

mod support;
use support::*;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode as AxumStatus};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Upstream TSA stand-in answering with a scripted sequence of status codes; the last entry
/// repeats once the script runs out.
#[derive(Clone)]
struct Upstream {
    hits: Arc<AtomicUsize>,
    script: Arc<Vec<u16>>,
    reply: Arc<Value>,
    last_auth: Arc<Mutex<Option<String>>>,
    last_body: Arc<Mutex<Option<Value>>>,
}

impl Upstream {
    async fn start(script: Vec<u16>, reply: Value) -> (SocketAddr, Self) {
        let upstream = Self {
            hits: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(script),
            reply: Arc::new(reply),
            last_auth: Arc::new(Mutex::new(None)),
            last_body: Arc::new(Mutex::new(None)),
        };
        let app = Router::new()
            .route("/tsr", post(answer))
            .with_state(upstream.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind upstream");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr, upstream)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn answer(State(up): State<Upstream>, headers: HeaderMap, body: Bytes) -> Response {
    let n = up.hits.fetch_add(1, Ordering::SeqCst);
    *up.last_auth.lock().expect("lock") = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *up.last_body.lock().expect("lock") = serde_json::from_slice(&body).ok();
    let code = up
        .script
        .get(n)
        .or(up.script.last())
        .copied()
        .unwrap_or(200);
    let status = AxumStatus::from_u16(code).expect("status code");
    if status.is_success() {
        (status, Json((*up.reply).clone())).into_response()
    } else {
        (status, "upstream says no").into_response()
    }
}

async fn configure(server: &Server, endpoint: String, retries: Value) {
    let (status, body) = server
        .post_json(
            "/api/tsa/config",
            json!({ "endpoint": endpoint, "retries": retries, "timeout": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn server_errors_are_retried_exactly_len_times() {
    let (addr, upstream) = Upstream::start(vec![500], json!({})).await;
    let server = Server::start("server_errors_are_retried_exactly_len_times").await;
    configure(&server, format!("http://{addr}/tsr"), json!([0, 0, 0])).await;

    let (status, body) = server.post_empty("/api/tsa/real?cert_id=c1").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["ok"], false);
    assert_eq!(body["status"], "error");
    assert_eq!(body["cert_id"], "c1");
    assert_eq!(body["attempts"], 3);
    assert_eq!(body["error"]["code"], "TSA_UNAVAILABLE");
    assert_eq!(upstream.hits(), 3);

    let (_, latest) = server
        .get_json("/api/receipts/latest?cert_id=c1&provider=tsa")
        .await;
    assert_eq!(latest["receipt"]["status"], "error");
    assert_eq!(latest["receipt"]["txid"], "");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (addr, upstream) = Upstream::start(vec![400], json!({})).await;
    let server = Server::start("client_errors_are_not_retried").await;
    configure(&server, format!("http://{addr}/tsr"), json!([0, 0, 0])).await;

    let (status, body) = server.post_empty("/api/tsa/real?cert_id=c1").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["attempts"], 1);
    assert_eq!(body["error"]["code"], "TSA_REJECTED");
    assert_eq!(body["upstream_status"], 400);
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn success_records_txid_and_tsa_url() {
    let (addr, upstream) = Upstream::start(vec![200], json!({ "tx_id": "up-42" })).await;
    let server = Server::start("success_records_txid_and_tsa_url").await;
    let endpoint = format!("http://{addr}/tsr");
    configure(&server, endpoint.clone(), json!([0, 0])).await;
    let (status, _) = server
        .post_json("/api/tsa/config", json!({ "api_key": "sekret" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.post_empty("/api/tsa/real?cert_id=c1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "success");
    assert_eq!(body["txid"], "up-42");
    assert_eq!(body["attempts"], 1);
    assert_eq!(body["tsa_response"]["tx_id"], "up-42");
    assert_eq!(upstream.hits(), 1);

    assert_eq!(
        upstream.last_auth.lock().expect("lock").as_deref(),
        Some("Bearer sekret")
    );
    let sent = upstream.last_body.lock().expect("lock").clone().expect("json body");
    assert_eq!(sent["cert_id"], "c1");
    assert_eq!(sent["hash_algo"], "sha256");
    assert_eq!(sent["digest"].as_str().map(str::len), Some(64));
    assert!(sent["requested_at"].as_str().is_some());

    let (_, latest) = server
        .get_json("/api/receipts/latest?cert_id=c1&provider=tsa")
        .await;
    assert_eq!(latest["receipt"]["status"], "success");
    assert_eq!(latest["receipt"]["txid"], "up-42");
    let (_, evidence) = server.get_json("/api/evidence/c1").await;
    assert_eq!(evidence["evidence"]["tsa_url"], endpoint);
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let (addr, upstream) = Upstream::start(vec![503, 502, 200], json!({ "status": "granted" })).await;
    let server = Server::start("recovers_after_transient_failures").await;
    configure(&server, format!("http://{addr}/tsr"), json!([0, 0, 0])).await;

    let (status, body) = server.post_empty("/api/tsa/real?cert_id=c1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attempts"], 3);
    assert!(
        body["txid"].as_str().is_some_and(|t| t.starts_with("tsa-") && t.len() == 20),
        "falls back to a digest-derived txid: {body}"
    );
    assert_eq!(upstream.hits(), 3);
}

#[tokio::test]
async fn empty_retry_list_makes_a_single_attempt() {
    let (addr, upstream) = Upstream::start(vec![500], json!({})).await;
    let server = Server::start("empty_retry_list_makes_a_single_attempt").await;
    configure(&server, format!("http://{addr}/tsr"), json!([])).await;

    let (status, body) = server.post_empty("/api/tsa/real?cert_id=c1").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["attempts"], 1);
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn unreachable_endpoint_exhausts_attempts() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let server = Server::start("unreachable_endpoint_exhausts_attempts").await;
    configure(&server, format!("http://{addr}/tsr"), json!([0, 0])).await;

    let (status, body) = server.post_empty("/api/tsa/real?cert_id=c1").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["attempts"], 2);
    assert_eq!(body["error"]["code"], "TSA_UNAVAILABLE");
}

#[tokio::test]
async fn stamp_uses_real_client_in_real_mode() {
    let (addr, upstream) = Upstream::start(vec![200], json!({ "txid": "real-1" })).await;
    let server = Server::start("stamp_uses_real_client_in_real_mode").await;
    configure(&server, format!("http://{addr}/tsr"), json!([0])).await;
    server.post_empty("/api/tsa/switch?to=real").await;

    let (status, body) = server.get_json("/api/tsa/stamp?cert_id=c1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["txid"], "real-1");
    assert_eq!(upstream.hits(), 1);
}
