#![forbid(unsafe_code)]

mod evidence;
mod health;
mod providers;
mod receipts;
mod tsa;
mod verify;

use crate::error::ApiError;
use crate::state::AppState;
use axum::Router;
use axum::body::Bytes;
use axum::routing::{get, post};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use vu_core::{CertId, Evidence, HistoryView, Receipt};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/tsa/mock",
            get(providers::tsa_mock).post(providers::tsa_mock),
        )
        .route(
            "/api/chain/mock",
            get(providers::chain_mock).post(providers::chain_mock),
        )
        .route("/api/tsa/real", get(tsa::tsa_real).post(tsa::tsa_real))
        .route("/api/tsa/stamp", get(tsa::tsa_stamp).post(tsa::tsa_stamp))
        .route("/api/tsa/config", get(tsa::get_config).post(tsa::set_config))
        .route("/api/tsa/switch", post(tsa::switch_mode))
        .route("/api/tsa/callback", post(providers::tsa_callback))
        .route("/api/chain/callback", post(providers::chain_callback))
        .route("/api/receipts/export", get(receipts::export))
        .route("/api/receipts/clear", post(receipts::clear))
        .route("/api/receipts/latest", get(receipts::latest))
        .route("/api/evidence/:cert_id", get(evidence::get_evidence))
        .route("/v1/upgrade25/evidence", post(evidence::register))
        .route("/v1/upgrade25/c2pa/embed", post(evidence::c2pa_embed))
        .route("/v1/upgrade25/tsa/query", post(evidence::tsa_query))
        .route("/v1/upgrade25/tsa/submit", post(evidence::tsa_submit))
        .route("/v1/upgrade25/anchor/sepolia", post(evidence::anchor_sepolia))
        .route("/verify_upgrade/:cert_id", get(verify::page))
        .route("/api/verify/:cert_id", get(verify::json_view))
        .route("/static/verify.css", get(verify::stylesheet))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn bind(host: &str, port: u16) -> std::io::Result<tokio::net::TcpListener> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    tokio::net::TcpListener::bind(addr).await
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CertQuery {
    pub cert_id: Option<String>,
}

/// Parses a JSON request body; an empty body reads as `T::default()`.
pub(crate) fn parse_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| ApiError::InvalidJson(err.to_string()))
}

/// Runs store writes and file reads on the blocking pool.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ApiError::Internal(format!("blocking task failed: {err}")))?
}

pub(crate) fn cert_or_default(raw: Option<&str>) -> Result<CertId, ApiError> {
    Ok(CertId::or_default(raw)?)
}

pub(crate) fn receipt_json(receipt: &Receipt) -> Value {
    json!({
        "cert_id": receipt.cert_id,
        "provider": receipt.provider.as_str(),
        "status": receipt.status,
        "txid": receipt.txid_str(),
        "created_at": receipt.created_at,
    })
}

pub(crate) fn evidence_json(evidence: &Evidence) -> Value {
    json!({
        "cert_id": evidence.cert_id,
        "file_path": evidence.file_path,
        "sha256": evidence.sha256,
        "c2pa_claim": evidence.c2pa_claim,
        "c2pa_signed_by": evidence.c2pa_signed_by,
        "tsa_url": evidence.tsa_url,
        "tsq_b64": evidence.tsq_b64,
        "tsr_b64": evidence.tsr_b64,
        "sepolia_txhash": evidence.sepolia_txhash,
        "title": evidence.title,
        "owner": evidence.owner,
        "created_at": evidence.created_at,
    })
}

pub(crate) fn history_json(view: &HistoryView, items: &[&Receipt]) -> Value {
    json!({
        "source": view.source,
        "tsa_last_status": view.tsa.status,
        "tsa_last_txid": view.tsa.txid,
        "chain_last_status": view.chain.status,
        "chain_last_txid": view.chain.txid,
        "items": items.iter().map(|r| receipt_json(r)).collect::<Vec<_>>(),
    })
}
