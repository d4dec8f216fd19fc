#![forbid(unsafe_code)]

use super::{CertQuery, cert_or_default, parse_json, receipt_json};
use crate::error::ApiError;
use crate::state::AppState;
use crate::support::{non_empty, random_hex};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use vu_core::{CertId, EvidenceUpdate, NewReceipt, Provider, Receipt};

pub(crate) const MOCK_TSA_STATUS: &str = "ok";
pub(crate) const MOCK_CHAIN_STATUS: &str = "pending";

pub(super) async fn tsa_mock(
    State(state): State<AppState>,
    Query(query): Query<CertQuery>,
) -> Result<Json<Value>, ApiError> {
    let cert_id = cert_or_default(query.cert_id.as_deref())?;
    let receipt = record_mock(&state, &cert_id, Provider::Tsa)?;
    Ok(Json(mock_response(&receipt)))
}

pub(super) async fn chain_mock(
    State(state): State<AppState>,
    Query(query): Query<CertQuery>,
) -> Result<Json<Value>, ApiError> {
    let cert_id = cert_or_default(query.cert_id.as_deref())?;
    let receipt = record_mock(&state, &cert_id, Provider::Chain)?;
    Ok(Json(mock_response(&receipt)))
}

/// Simulated provider: random txid, fixed status.
pub(crate) fn record_mock(
    state: &AppState,
    cert_id: &CertId,
    provider: Provider,
) -> Result<Receipt, ApiError> {
    let (status, txid) = match provider {
        Provider::Chain => (MOCK_CHAIN_STATUS, format!("0x{}", random_hex(32))),
        _ => (MOCK_TSA_STATUS, format!("tsa-{}", random_hex(8))),
    };
    let receipt = state.record_receipt(NewReceipt::new(
        cert_id.as_str(),
        provider,
        status,
        Some(txid),
    ))?;
    if receipt.provider == Provider::Chain {
        state.note_evidence(
            cert_id.as_str(),
            &EvidenceUpdate {
                sepolia_txhash: receipt.txid.clone(),
                ..EvidenceUpdate::default()
            },
        );
    }
    Ok(receipt)
}

pub(crate) fn mock_response(receipt: &Receipt) -> Value {
    json!({
        "ok": true,
        "cert_id": receipt.cert_id,
        "provider": receipt.provider.as_str(),
        "status": receipt.status,
        "txid": receipt.txid_str(),
        "created_at": receipt.created_at,
    })
}

#[derive(Debug, Default, Deserialize)]
struct CallbackBody {
    cert_id: Option<String>,
    provider: Option<String>,
    status: Option<String>,
    txid: Option<String>,
}

pub(super) async fn tsa_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    handle_callback(&state, Provider::Tsa, &body)
}

pub(super) async fn chain_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    handle_callback(&state, Provider::Chain, &body)
}

fn handle_callback(
    state: &AppState,
    route_provider: Provider,
    body: &Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: CallbackBody = parse_json(body)?;
    let anchors_chain = route_provider == Provider::Chain;
    let Some(raw_cert) = non_empty(body.cert_id.as_deref()) else {
        return Err(ApiError::InvalidInput("cert_id is required".to_string()));
    };
    let cert_id = CertId::try_new(raw_cert)?;
    let provider = match non_empty(body.provider.as_deref()) {
        Some(raw) => Provider::parse(&raw).ok_or_else(|| {
            ApiError::InvalidInput("provider must match [a-z0-9_.-]{1,32}".to_string())
        })?,
        None => route_provider,
    };
    let status = non_empty(body.status.as_deref()).unwrap_or_else(|| "success".to_string());

    let receipt = state.record_receipt(NewReceipt::new(
        cert_id.as_str(),
        provider,
        status,
        body.txid,
    ))?;
    if anchors_chain && receipt.txid.is_some() {
        state.note_evidence(
            cert_id.as_str(),
            &EvidenceUpdate {
                sepolia_txhash: receipt.txid.clone(),
                ..EvidenceUpdate::default()
            },
        );
    }
    Ok(Json(json!({ "ok": true, "receipt": receipt_json(&receipt) })))
}
