#![forbid(unsafe_code)]

use super::{blocking, cert_or_default, evidence_json, parse_json};
use crate::error::ApiError;
use crate::state::AppState;
use crate::support::{file_sha256, non_empty};
use crate::tools::{self, QueryDigest, SignJob};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use base64::Engine;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use vu_core::{CertId, Evidence, EvidenceUpdate};

pub(super) async fn get_evidence(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let cert_id = CertId::try_new(raw)?;
    let evidence = blocking(move || Ok(state.load_evidence(cert_id.as_str()))).await?;
    Ok(Json(json!({ "ok": true, "evidence": evidence_json(&evidence) })))
}

fn required(value: Option<&str>, field: &str) -> Result<String, ApiError> {
    non_empty(value).ok_or_else(|| ApiError::InvalidInput(format!("{field} is required")))
}

fn existing_file(raw: &str) -> Result<PathBuf, ApiError> {
    let path = PathBuf::from(raw);
    if path.is_file() {
        Ok(path)
    } else {
        Err(ApiError::NotFound(format!("file not found: {raw}")))
    }
}

/// Hashes `path` and upserts the evidence row, both off the async workers.
async fn hash_and_record(
    state: &AppState,
    cert_id: &CertId,
    path: PathBuf,
    update: EvidenceUpdate,
) -> Result<(String, Evidence), ApiError> {
    let state = state.clone();
    let cert_id = cert_id.clone();
    blocking(move || {
        let sha256 = file_sha256(&path).map_err(|err| {
            ApiError::InvalidInput(format!("read {}: {err}", path.display()))
        })?;
        let evidence = state.update_evidence(
            cert_id.as_str(),
            &EvidenceUpdate {
                sha256: Some(sha256.clone()),
                ..update
            },
        )?;
        Ok((sha256, evidence))
    })
    .await
}

async fn record(
    state: &AppState,
    cert_id: &CertId,
    update: EvidenceUpdate,
) -> Result<Evidence, ApiError> {
    let state = state.clone();
    let cert_id = cert_id.clone();
    blocking(move || state.update_evidence(cert_id.as_str(), &update)).await
}

#[derive(Debug, Default, Deserialize)]
struct RegisterBody {
    cert_id: Option<String>,
    file_path: Option<String>,
    c2pa_claim: Option<String>,
    title: Option<String>,
    owner: Option<String>,
}

/// Hashes a local file and records it as the certificate's evidence.
pub(super) async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: RegisterBody = parse_json(&body)?;
    let cert_id = cert_or_default(body.cert_id.as_deref())?;
    let file_path = required(body.file_path.as_deref(), "file_path")?;
    let path = existing_file(&file_path)?;

    let (sha256, evidence) = hash_and_record(
        &state,
        &cert_id,
        path,
        EvidenceUpdate {
            file_path: Some(file_path),
            c2pa_claim: body.c2pa_claim,
            title: body.title,
            owner: body.owner,
            ..EvidenceUpdate::default()
        },
    )
    .await?;
    Ok(Json(json!({
        "ok": true,
        "cert_id": cert_id.as_str(),
        "sha256": sha256,
        "evidence": evidence_json(&evidence),
    })))
}

#[derive(Debug, Default, Deserialize)]
struct EmbedBody {
    cert_id: Option<String>,
    file_path: Option<String>,
    signer_cert_path: Option<String>,
    signer_key_path: Option<String>,
    claim_json_path: Option<String>,
    out_path: Option<String>,
}

/// Signs a file with `c2patool` and records the signed copy as evidence.
pub(super) async fn c2pa_embed(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: EmbedBody = parse_json(&body)?;
    let cert_id = cert_or_default(body.cert_id.as_deref())?;
    let file_path = required(body.file_path.as_deref(), "file_path")?;
    let cert_path = required(body.signer_cert_path.as_deref(), "signer_cert_path")?;
    let key_path = required(body.signer_key_path.as_deref(), "signer_key_path")?;

    let program = tools::require(&state.tools().c2patool)?;
    let input = existing_file(&file_path)?;
    let signer_cert = PathBuf::from(&cert_path);
    let signer_key = PathBuf::from(&key_path);
    if !signer_cert.is_file() || !signer_key.is_file() {
        return Err(ApiError::NotFound(
            "signer certificate or key not found".to_string(),
        ));
    }
    let manifest = match non_empty(body.claim_json_path.as_deref()) {
        Some(raw) => Some(existing_file(&raw)?),
        None => None,
    };
    let output = match non_empty(body.out_path.as_deref()) {
        Some(raw) => PathBuf::from(raw),
        None => tools::signed_output_path(&input),
    };

    let log = tools::c2pa_sign(
        &program,
        &SignJob {
            input: &input,
            signer_cert: &signer_cert,
            signer_key: &signer_key,
            manifest: manifest.as_deref(),
            output: &output,
        },
    )
    .await?;

    let signed_by = signer_cert
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let out_path = output.display().to_string();
    let (sha256, evidence) = hash_and_record(
        &state,
        &cert_id,
        output,
        EvidenceUpdate {
            file_path: Some(out_path.clone()),
            c2pa_claim: body.claim_json_path,
            c2pa_signed_by: signed_by,
            ..EvidenceUpdate::default()
        },
    )
    .await?;
    Ok(Json(json!({
        "ok": true,
        "cert_id": cert_id.as_str(),
        "out_path": out_path,
        "sha256": sha256,
        "log": log,
        "evidence": evidence_json(&evidence),
    })))
}

#[derive(Debug, Default, Deserialize)]
struct QueryBody {
    cert_id: Option<String>,
    file_path: Option<String>,
    hash_algo: Option<String>,
}

/// Builds an RFC 3161 timestamp query for a file and stores it base64-encoded.
pub(super) async fn tsa_query(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: QueryBody = parse_json(&body)?;
    let cert_id = cert_or_default(body.cert_id.as_deref())?;
    let file_path = required(body.file_path.as_deref(), "file_path")?;
    let path = existing_file(&file_path)?;
    let program = tools::require(&state.tools().openssl)?;
    let algo = non_empty(body.hash_algo.as_deref()).unwrap_or_else(|| "sha256".to_string());
    let digest = QueryDigest::parse(&algo)
        .ok_or_else(|| ApiError::InvalidInput("hash_algo must be sha256 or sha512".to_string()))?;

    let tsq = tools::timestamp_query(&program, &path, digest).await?;
    let tsq_b64 = base64::engine::general_purpose::STANDARD.encode(tsq);

    let (sha256, evidence) = hash_and_record(
        &state,
        &cert_id,
        path,
        EvidenceUpdate {
            file_path: Some(file_path),
            tsq_b64: Some(tsq_b64.clone()),
            ..EvidenceUpdate::default()
        },
    )
    .await?;
    Ok(Json(json!({
        "ok": true,
        "cert_id": cert_id.as_str(),
        "tsq_b64": tsq_b64,
        "sha256": sha256,
        "evidence": evidence_json(&evidence),
    })))
}

#[derive(Debug, Default, Deserialize)]
struct TsaSubmitBody {
    cert_id: Option<String>,
    tsr_b64: Option<String>,
    tsa_url: Option<String>,
}

pub(super) async fn tsa_submit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: TsaSubmitBody = parse_json(&body)?;
    let cert_id = cert_or_default(body.cert_id.as_deref())?;
    let tsr_b64 = required(body.tsr_b64.as_deref(), "tsr_b64")?;
    let evidence = record(
        &state,
        &cert_id,
        EvidenceUpdate {
            tsr_b64: Some(tsr_b64),
            tsa_url: body.tsa_url,
            ..EvidenceUpdate::default()
        },
    )
    .await?;
    Ok(Json(json!({ "ok": true, "evidence": evidence_json(&evidence) })))
}

#[derive(Debug, Default, Deserialize)]
struct AnchorBody {
    cert_id: Option<String>,
    tx_hash: Option<String>,
}

pub(super) async fn anchor_sepolia(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: AnchorBody = parse_json(&body)?;
    let cert_id = cert_or_default(body.cert_id.as_deref())?;
    let tx_hash = required(body.tx_hash.as_deref(), "tx_hash")?;
    let evidence = record(
        &state,
        &cert_id,
        EvidenceUpdate {
            sepolia_txhash: Some(tx_hash.clone()),
            ..EvidenceUpdate::default()
        },
    )
    .await?;
    Ok(Json(json!({
        "ok": true,
        "tx_hash": tx_hash,
        "evidence": evidence_json(&evidence),
    })))
}
