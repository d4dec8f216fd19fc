#![forbid(unsafe_code)]

use super::{blocking, cert_or_default, receipt_json};
use crate::error::ApiError;
use crate::state::AppState;
use crate::support::non_empty;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use vu_core::{CertId, CsvOptions, Provider, ReceiptFilter, receipts_to_csv};

#[derive(Debug, Default, Deserialize)]
pub(super) struct ExportQuery {
    cert_id: Option<String>,
    q: Option<String>,
    excel: Option<String>,
}

fn truthy(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

pub(super) async fn export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let cert_id = cert_or_default(query.cert_id.as_deref())?;
    let filter = ReceiptFilter::parse(query.q.as_deref().unwrap_or(""));
    let options = CsvOptions {
        text_txid: truthy(query.excel.as_deref()),
    };
    let lookup = state.clone();
    let lookup_cert = cert_id.clone();
    let receipts = blocking(move || Ok(lookup.all_receipts(lookup_cert.as_str()))).await?;
    let body = receipts_to_csv(filter.apply(&receipts), options);
    let disposition = format!(
        "attachment; filename=\"receipts_{}.csv\"",
        filename_safe(cert_id.as_str())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Keeps the header value printable and the quoted filename intact.
fn filename_safe(cert_id: &str) -> String {
    cert_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ClearQuery {
    cert_id: Option<String>,
}

pub(super) async fn clear(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Result<Json<Value>, ApiError> {
    let cert_id = match non_empty(query.cert_id.as_deref()) {
        Some(raw) => Some(CertId::try_new(raw)?),
        None => None,
    };
    let cleared = state.clear_receipts(cert_id.as_ref().map(CertId::as_str));
    Ok(Json(json!({
        "ok": true,
        "cleared": cleared,
        "cert_id": cert_id.as_ref().map(CertId::as_str),
    })))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct LatestQuery {
    cert_id: Option<String>,
    provider: Option<String>,
}

pub(super) async fn latest(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Value>, ApiError> {
    let cert_id = cert_or_default(query.cert_id.as_deref())?;
    let provider = match non_empty(query.provider.as_deref()) {
        Some(raw) => Provider::parse(&raw)
            .ok_or_else(|| ApiError::InvalidInput("unknown provider".to_string()))?,
        None => Provider::Tsa,
    };
    let receipt = state.latest_receipt(cert_id.as_str(), &provider);
    Ok(Json(json!({
        "ok": true,
        "cert_id": cert_id.as_str(),
        "provider": provider.as_str(),
        "receipt": receipt.as_ref().map(receipt_json),
    })))
}
