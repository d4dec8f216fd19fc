#![forbid(unsafe_code)]

use super::{evidence_json, history_json};
use crate::render::{VerifyPage, escape_html};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use vu_core::{CertId, ReceiptFilter};

const STYLESHEET: &str = include_str!("../assets/verify.css");

#[derive(Debug, Default, Deserialize)]
pub(super) struct VerifyQuery {
    q: Option<String>,
}

/// Always renders; an unusable cert id gets a plain notice instead of an error status.
pub(super) async fn page(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> Html<String> {
    let cert_id = match CertId::try_new(raw.as_str()) {
        Ok(cert_id) => cert_id,
        Err(err) => {
            return Html(format!(
                "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
                 <link rel=\"stylesheet\" href=\"/static/verify.css\"></head>\
                 <body><main><p class=\"muted\">Invalid certificate id <code>{}</code>: {}</p>\
                 </main></body></html>\n",
                escape_html(&raw),
                escape_html(err.message())
            ));
        }
    };
    let history = state.history(cert_id.as_str());
    let evidence = state.load_evidence(cert_id.as_str());
    let q = query.q.unwrap_or_default();
    let rows = ReceiptFilter::parse(&q).apply(&history.items);
    Html(
        VerifyPage {
            cert_id: cert_id.as_str(),
            evidence: &evidence,
            history: &history,
            rows: &rows,
            query: &q,
        }
        .render(),
    )
}

pub(super) async fn json_view(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<Value>, crate::error::ApiError> {
    let cert_id = CertId::try_new(raw)?;
    let history = state.history(cert_id.as_str());
    let evidence = state.load_evidence(cert_id.as_str());
    let rows = ReceiptFilter::parse(query.q.as_deref().unwrap_or("")).apply(&history.items);
    Ok(Json(json!({
        "ok": true,
        "cert_id": cert_id.as_str(),
        "evidence": evidence_json(&evidence),
        "history": history_json(&history, &rows),
    })))
}

pub(super) async fn stylesheet() -> Response {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLESHEET).into_response()
}
