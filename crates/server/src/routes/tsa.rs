#![forbid(unsafe_code)]

use super::providers::{mock_response, record_mock};
use super::{CertQuery, cert_or_default, parse_json};
use crate::error::ApiError;
use crate::state::AppState;
use crate::tsa::{ResolvedTsa, StampRequest, TsaError, TsaMode, TsaOutcome, TsaPatch, request_stamp};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;
use vu_core::{CertId, EvidenceUpdate, NewReceipt, Provider, Receipt};

pub(super) async fn tsa_real(
    State(state): State<AppState>,
    Query(query): Query<CertQuery>,
) -> Result<Response, ApiError> {
    let cert_id = cert_or_default(query.cert_id.as_deref())?;
    real_stamp(&state, cert_id).await
}

/// Stamps through the mock or the real client depending on the current mode.
pub(super) async fn tsa_stamp(
    State(state): State<AppState>,
    Query(query): Query<CertQuery>,
) -> Result<Response, ApiError> {
    let cert_id = cert_or_default(query.cert_id.as_deref())?;
    let mode = state.tsa().read().await.resolve().mode;
    match mode {
        TsaMode::Mock => {
            let receipt = record_mock(&state, &cert_id, Provider::Tsa)?;
            let mut body = mock_response(&receipt);
            body["mode"] = json!(mode.as_str());
            Ok(Json(body).into_response())
        }
        TsaMode::Real => real_stamp(&state, cert_id).await,
    }
}

async fn real_stamp(state: &AppState, cert_id: CertId) -> Result<Response, ApiError> {
    let config = state.tsa().read().await.resolve();
    let (requested_at, _) = vu_storage::now_stamp();
    let request = StampRequest::new(cert_id.as_str(), &requested_at);

    // Detached so a client disconnect cannot cut the retry loop or lose the receipt.
    let worker = state.clone();
    let task = tokio::spawn(async move {
        let result = request_stamp(worker.http(), &config, &request).await;
        let recorded = record_outcome(&worker, &config, &request.cert_id, &result);
        (result, recorded)
    });

    let (result, recorded) = match task.await {
        Ok(done) => done,
        Err(err) => return worker_lost(state, &cert_id, &err),
    };
    recorded?;
    Ok(match result {
        Ok(outcome) => Json(json!({
            "ok": true,
            "cert_id": cert_id.as_str(),
            "status": "success",
            "txid": outcome.txid,
            "attempts": outcome.attempts,
            "tsa_response": outcome.response,
        }))
        .into_response(),
        Err(err) => failure_response(&cert_id, &err),
    })
}

/// The worker panicked or was cancelled before recording anything.
fn worker_lost(
    state: &AppState,
    cert_id: &CertId,
    err: &tokio::task::JoinError,
) -> Result<Response, ApiError> {
    warn!(cert_id = %cert_id.as_str(), error = %err, "tsa worker did not finish");
    state.record_receipt(NewReceipt::new(cert_id.as_str(), Provider::Tsa, "error", None))?;
    Ok(failure_response(cert_id, &TsaError::Client(err.to_string())))
}

fn record_outcome(
    state: &AppState,
    config: &ResolvedTsa,
    cert_id: &str,
    result: &Result<TsaOutcome, TsaError>,
) -> Result<Receipt, ApiError> {
    match result {
        Ok(outcome) => {
            let receipt = state.record_receipt(NewReceipt::new(
                cert_id,
                Provider::Tsa,
                "success",
                Some(outcome.txid.clone()),
            ))?;
            state.note_evidence(
                cert_id,
                &EvidenceUpdate {
                    tsa_url: Some(config.endpoint.clone()),
                    ..EvidenceUpdate::default()
                },
            );
            Ok(receipt)
        }
        Err(_) => state.record_receipt(NewReceipt::new(cert_id, Provider::Tsa, "error", None)),
    }
}

fn failure_response(cert_id: &CertId, err: &TsaError) -> Response {
    let status = match err {
        TsaError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    let mut body = json!({
        "ok": false,
        "cert_id": cert_id.as_str(),
        "status": "error",
        "error": { "code": err.code(), "message": err.to_string() },
        "attempts": err.attempts(),
    });
    if let TsaError::Rejected { status, .. } = err {
        body["upstream_status"] = json!(status);
    }
    (status, Json(body)).into_response()
}

fn config_view(config: &ResolvedTsa, file: Option<&std::path::Path>) -> Value {
    json!({
        "ok": true,
        "mode": config.mode.as_str(),
        "endpoint": config.endpoint,
        "endpoint_source": config.endpoint_source.as_str(),
        "api_key_set": config.api_key.is_some(),
        "api_key": config.api_key_masked(),
        "api_key_source": config.api_key_source.as_str(),
        "timeout": config.timeout.as_secs_f64(),
        "retries": config.retry_delays.iter().map(|d| d.as_secs_f64()).collect::<Vec<_>>(),
        "max_attempts": config.max_attempts(),
        "config_file": file.map(|p| p.display().to_string()),
    })
}

pub(super) async fn get_config(State(state): State<AppState>) -> Json<Value> {
    let settings = state.tsa().read().await;
    Json(config_view(&settings.resolve(), settings.file_path()))
}

pub(super) async fn set_config(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let patch: TsaPatch = parse_json(&body)?;
    apply_patch(&state, &patch).await
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct SwitchQuery {
    to: Option<String>,
}

pub(super) async fn switch_mode(
    State(state): State<AppState>,
    Query(query): Query<SwitchQuery>,
) -> Result<Json<Value>, ApiError> {
    let mode = query
        .to
        .as_deref()
        .and_then(TsaMode::parse)
        .ok_or_else(|| ApiError::InvalidInput("to must be mock or real".to_string()))?;
    let patch = TsaPatch {
        mode: Some(mode),
        ..TsaPatch::default()
    };
    apply_patch(&state, &patch).await
}

async fn apply_patch(state: &AppState, patch: &TsaPatch) -> Result<Json<Value>, ApiError> {
    let mut settings = state.tsa().write().await;
    let resolved = settings.apply(patch).map_err(ApiError::InvalidInput)?;
    if let Err(err) = settings.persist() {
        warn!(error = %err, "tsa settings not persisted");
    }
    Ok(Json(config_view(&resolved, settings.file_path())))
}
