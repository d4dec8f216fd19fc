#![forbid(unsafe_code)]

use crate::error::StartupError;
use tracing::info;
use vu_core::{CertId, EvidenceUpdate, NewReceipt, Provider};
use vu_storage::{DbUrl, ReceiptStore, SqliteStore, StoreError};

const DEMO_RECEIPTS: [(Provider, &str, &str); 3] = [
    (Provider::Tsa, "ok", "0xTX_TSA_OK"),
    (Provider::Chain, "pending", "0xTX_CHAIN_WAIT"),
    (Provider::Tsa, "ok", "0xTX_TSA_OK_2"),
];

fn demo_evidence() -> EvidenceUpdate {
    EvidenceUpdate {
        file_path: Some("samples/demo.png".to_string()),
        sha256: Some("deadbeef".repeat(8)),
        c2pa_claim: Some("claim:demo".to_string()),
        tsa_url: Some("http://127.0.0.1:8011/api/tsa/mock".to_string()),
        sepolia_txhash: Some("0xSEPOLIADEMO".to_string()),
        title: Some("Demo Evidence".to_string()),
        owner: Some("default".to_string()),
        ..EvidenceUpdate::default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedReport {
    pub evidence_created: bool,
    pub receipts_added: usize,
    pub receipts_total: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClearReport {
    pub receipts_removed: usize,
    pub evidence_removed: usize,
    pub receipts_left: usize,
    pub evidence_left: usize,
}

fn cert(raw: &str) -> Result<CertId, StartupError> {
    CertId::try_new(raw).map_err(|err| StartupError::Store(StoreError::InvalidInput(err.message())))
}

/// Creates the schema if needed, inserts demo evidence unless some exists, and appends the
/// demo receipts.
pub fn seed_demo(db_url: &str, cert_id: &str) -> Result<SeedReport, StartupError> {
    let cert_id = cert(cert_id)?;
    let store = SqliteStore::open_url(&DbUrl::parse(db_url))?;

    let evidence_created = store.evidence_get(cert_id.as_str())?.is_none();
    if evidence_created {
        store.evidence_upsert(cert_id.as_str(), &demo_evidence())?;
    }
    for (provider, status, txid) in DEMO_RECEIPTS {
        store.append(NewReceipt::new(
            cert_id.as_str(),
            provider,
            status,
            Some(txid.to_string()),
        ))?;
    }
    let report = SeedReport {
        evidence_created,
        receipts_added: DEMO_RECEIPTS.len(),
        receipts_total: store.receipt_count(cert_id.as_str())?,
    };
    info!(cert_id = %cert_id, store = store.label(), ?report, "demo data seeded");
    Ok(report)
}

pub fn clear_demo(db_url: &str, cert_id: &str) -> Result<ClearReport, StartupError> {
    let cert_id = cert(cert_id)?;
    let store = SqliteStore::open_url(&DbUrl::parse(db_url))?;
    let receipts_removed = store.clear(Some(cert_id.as_str()))?;
    let evidence_removed = store.evidence_delete(cert_id.as_str())?;
    let report = ClearReport {
        receipts_removed,
        evidence_removed,
        receipts_left: store.receipt_count(cert_id.as_str())?,
        evidence_left: store.evidence_count(cert_id.as_str())?,
    };
    info!(cert_id = %cert_id, store = store.label(), ?report, "demo data cleared");
    Ok(report)
}
