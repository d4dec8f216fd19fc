#![forbid(unsafe_code)]

use super::{MemoryReceipts, ReceiptStore, SqliteStore};
use vu_core::Receipt;

/// Result of asking one store for a certificate's history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceRows {
    Rows(Vec<Receipt>),
    Empty,
    Unavailable(String),
}

/// A store that can take part in the history fallback chain.
pub trait ReceiptSource: Send + Sync {
    fn label(&self) -> &str;

    /// Newest first, at most `limit` rows. Never fails; failures are reported as
    /// [`SourceRows::Unavailable`].
    fn recent(&self, cert_id: &str, limit: usize) -> SourceRows;
}

fn rows_from<S: ReceiptStore + ?Sized>(store: &S, cert_id: &str, limit: usize) -> SourceRows {
    match store.list(cert_id, limit) {
        Ok(rows) if rows.is_empty() => SourceRows::Empty,
        Ok(rows) => SourceRows::Rows(rows),
        Err(err) => SourceRows::Unavailable(err.to_string()),
    }
}

impl ReceiptSource for SqliteStore {
    fn label(&self) -> &str {
        SqliteStore::label(self)
    }

    fn recent(&self, cert_id: &str, limit: usize) -> SourceRows {
        rows_from(self, cert_id, limit)
    }
}

impl ReceiptSource for MemoryReceipts {
    fn label(&self) -> &str {
        "memory"
    }

    fn recent(&self, cert_id: &str, limit: usize) -> SourceRows {
        rows_from(self, cert_id, limit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceHit {
    pub label: String,
    pub rows: Vec<Receipt>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FallbackOutcome {
    pub hit: Option<SourceHit>,
    /// `(label, reason)` for every source that was unavailable before the hit.
    pub skipped: Vec<(String, String)>,
}

/// Queries `sources` in order and returns the first one holding rows for `cert_id`.
pub fn first_with_rows(
    sources: &[&dyn ReceiptSource],
    cert_id: &str,
    limit: usize,
) -> FallbackOutcome {
    let mut outcome = FallbackOutcome::default();
    for source in sources {
        match source.recent(cert_id, limit) {
            SourceRows::Rows(rows) => {
                outcome.hit = Some(SourceHit {
                    label: source.label().to_string(),
                    rows,
                });
                break;
            }
            SourceRows::Empty => {}
            SourceRows::Unavailable(reason) => {
                outcome.skipped.push((source.label().to_string(), reason));
            }
        }
    }
    outcome
}
