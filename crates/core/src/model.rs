#![forbid(unsafe_code)]

use crate::ids::Provider;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReceipt {
    pub cert_id: String,
    pub provider: Provider,
    pub status: String,
    pub txid: Option<String>,
}

impl NewReceipt {
    pub fn new(
        cert_id: impl Into<String>,
        provider: Provider,
        status: impl Into<String>,
        txid: Option<String>,
    ) -> Self {
        Self {
            cert_id: cert_id.into(),
            provider,
            status: status.into(),
            txid: txid.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()),
        }
    }

    pub fn stamped(self, created_at: String, created_at_ms: i64) -> Receipt {
        Receipt {
            cert_id: self.cert_id,
            provider: self.provider,
            status: self.status,
            txid: self.txid,
            created_at,
            created_at_ms,
        }
    }
}

/// One provider event. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub cert_id: String,
    pub provider: Provider,
    pub status: String,
    pub txid: Option<String>,
    /// Text as stored (RFC 3339 for rows written by this service).
    pub created_at: String,
    /// `created_at` normalised to epoch milliseconds; 0 when unparsable.
    pub created_at_ms: i64,
}

/// Full identity of a stored receipt. A memory entry with the same identity as a durable row
/// is the same receipt written twice.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReceiptKey {
    pub provider: String,
    pub status: String,
    pub txid: String,
    pub created_at: String,
}

impl Receipt {
    pub fn txid_str(&self) -> &str {
        self.txid.as_deref().unwrap_or("")
    }

    pub fn key(&self) -> ReceiptKey {
        ReceiptKey {
            provider: self.provider.as_str().to_string(),
            status: self.status.clone(),
            txid: self.txid_str().to_string(),
            created_at: self.created_at.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Evidence {
    pub cert_id: String,
    pub file_path: Option<String>,
    pub sha256: Option<String>,
    pub c2pa_claim: Option<String>,
    /// File name of the certificate that signed the provenance manifest.
    pub c2pa_signed_by: Option<String>,
    pub tsa_url: Option<String>,
    /// DER timestamp query, base64.
    pub tsq_b64: Option<String>,
    pub tsr_b64: Option<String>,
    pub sepolia_txhash: Option<String>,
    pub title: Option<String>,
    pub owner: Option<String>,
    pub created_at: Option<String>,
}

impl Evidence {
    pub fn empty(cert_id: impl Into<String>) -> Self {
        Self {
            cert_id: cert_id.into(),
            ..Self::default()
        }
    }

    fn fields(&self) -> [&Option<String>; 11] {
        [
            &self.file_path,
            &self.sha256,
            &self.c2pa_claim,
            &self.c2pa_signed_by,
            &self.tsa_url,
            &self.tsq_b64,
            &self.tsr_b64,
            &self.sepolia_txhash,
            &self.title,
            &self.owner,
            &self.created_at,
        ]
    }

    /// Number of populated fields besides `cert_id`.
    pub fn filled_fields(&self) -> usize {
        self.fields()
            .iter()
            .filter(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.filled_fields() == 0
    }

    /// Overwrites only fields the update carries with a non-empty value.
    pub fn apply(&mut self, update: &EvidenceUpdate) {
        fn merge(slot: &mut Option<String>, value: &Option<String>) {
            if let Some(value) = non_empty(value) {
                *slot = Some(value.to_string());
            }
        }
        merge(&mut self.file_path, &update.file_path);
        merge(&mut self.sha256, &update.sha256);
        merge(&mut self.c2pa_claim, &update.c2pa_claim);
        merge(&mut self.c2pa_signed_by, &update.c2pa_signed_by);
        merge(&mut self.tsa_url, &update.tsa_url);
        merge(&mut self.tsq_b64, &update.tsq_b64);
        merge(&mut self.tsr_b64, &update.tsr_b64);
        merge(&mut self.sepolia_txhash, &update.sepolia_txhash);
        merge(&mut self.title, &update.title);
        merge(&mut self.owner, &update.owner);
    }

    /// Picks whichever record carries more populated fields; ties keep `self`.
    pub fn most_complete(self, other: Self) -> Self {
        if other.filled_fields() > self.filled_fields() {
            other
        } else {
            self
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvidenceUpdate {
    pub file_path: Option<String>,
    pub sha256: Option<String>,
    pub c2pa_claim: Option<String>,
    pub c2pa_signed_by: Option<String>,
    pub tsa_url: Option<String>,
    pub tsq_b64: Option<String>,
    pub tsr_b64: Option<String>,
    pub sepolia_txhash: Option<String>,
    pub title: Option<String>,
    pub owner: Option<String>,
}

impl EvidenceUpdate {
    pub fn is_noop(&self) -> bool {
        [
            &self.file_path,
            &self.sha256,
            &self.c2pa_claim,
            &self.c2pa_signed_by,
            &self.tsa_url,
            &self.tsq_b64,
            &self.tsr_b64,
            &self.sepolia_txhash,
            &self.title,
            &self.owner,
        ]
        .iter()
        .all(|field| non_empty(field).is_none())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
