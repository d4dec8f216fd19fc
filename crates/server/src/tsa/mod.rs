#![forbid(unsafe_code)]

//! Outbound time-stamping client with bounded retries.

mod settings;

pub use settings::{
    DEFAULT_ENDPOINT, DEFAULT_RETRY_DELAYS, DEFAULT_TIMEOUT_SECS, Layer, ResolvedTsa, TsaEnv,
    TsaMode, TsaPatch, TsaSettings,
};

use crate::support::sha256_hex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

const TXID_FIELDS: [&str; 4] = ["txid", "tx_id", "id", "token_id"];

#[derive(Clone, Debug, Serialize)]
pub struct StampRequest {
    pub cert_id: String,
    pub digest: String,
    pub hash_algo: &'static str,
    pub requested_at: String,
}

impl StampRequest {
    pub fn new(cert_id: &str, requested_at: &str) -> Self {
        Self {
            cert_id: cert_id.to_string(),
            digest: sha256_hex(format!("{cert_id}|{requested_at}").as_bytes()),
            hash_algo: "sha256",
            requested_at: requested_at.to_string(),
        }
    }

    fn fallback_txid(&self) -> String {
        format!("tsa-{}", &self.digest[..16])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TsaOutcome {
    pub txid: String,
    pub attempts: usize,
    /// Upstream body; JSON when it parsed, otherwise the raw text.
    pub response: Value,
}

#[derive(Debug, Error)]
pub enum TsaError {
    #[error("TSA rejected the request with HTTP {status}")]
    Rejected {
        status: u16,
        attempts: usize,
        body: String,
    },

    #[error("TSA unreachable after {attempts} attempt(s): {last}")]
    Exhausted { attempts: usize, last: String },

    #[error("TSA request could not be run: {0}")]
    Client(String),
}

impl TsaError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "TSA_REJECTED",
            Self::Exhausted { .. } => "TSA_UNAVAILABLE",
            Self::Client(_) => "TSA_CLIENT",
        }
    }

    pub fn attempts(&self) -> usize {
        match self {
            Self::Rejected { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
            Self::Client(_) => 0,
        }
    }
}

/// Posts `request` to the configured endpoint.
///
/// Transport errors and 5xx responses are retried after `retry_delays[i]`; 2xx and 4xx end the
/// loop at once. No sleep follows the final attempt.
pub async fn request_stamp(
    client: &reqwest::Client,
    config: &ResolvedTsa,
    request: &StampRequest,
) -> Result<TsaOutcome, TsaError> {
    let max_attempts = config.max_attempts();
    let mut last = String::new();

    for attempt in 1..=max_attempts {
        let mut builder = client
            .post(&config.endpoint)
            .timeout(config.timeout)
            .json(request);
        if let Some(key) = config.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        match builder.send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    let text = resp.text().await.unwrap_or_default();
                    let response = serde_json::from_str::<Value>(&text)
                        .unwrap_or_else(|_| Value::String(text));
                    let txid = extract_txid(&response).unwrap_or_else(|| request.fallback_txid());
                    info!(cert_id = %request.cert_id, attempt, %txid, "tsa stamp accepted");
                    return Ok(TsaOutcome {
                        txid,
                        attempts: attempt,
                        response,
                    });
                }
                if status.is_client_error() {
                    let body = resp.text().await.unwrap_or_default();
                    warn!(cert_id = %request.cert_id, attempt, status = status.as_u16(), "tsa stamp rejected");
                    return Err(TsaError::Rejected {
                        status: status.as_u16(),
                        attempts: attempt,
                        body,
                    });
                }
                last = format!("HTTP {}", status.as_u16());
            }
            Err(err) => last = err.to_string(),
        }

        warn!(cert_id = %request.cert_id, attempt, max_attempts, error = %last, "tsa attempt failed");
        if attempt < max_attempts
            && let Some(delay) = config.retry_delays.get(attempt - 1)
        {
            tokio::time::sleep(*delay).await;
        }
    }

    Err(TsaError::Exhausted {
        attempts: max_attempts,
        last,
    })
}

fn extract_txid(response: &Value) -> Option<String> {
    let object = response.as_object()?;
    TXID_FIELDS.iter().find_map(|field| match object.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
