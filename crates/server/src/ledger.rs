#![forbid(unsafe_code)]

use crate::error::ApiError;
use crate::state::AppState;
use tracing::{debug, info, warn};
use vu_core::{Evidence, EvidenceUpdate, HistoryView, NewReceipt, Provider, Receipt, merge_history};
use vu_storage::{ReceiptSource, ReceiptStore, first_with_rows};

/// Rows shown when reconciling a certificate's history for display.
pub const HISTORY_LIMIT: usize = 200;

impl AppState {
    /// Appends to memory, then mirrors to the primary store. A durable failure is logged and the
    /// receipt stays memory-only.
    pub fn record_receipt(&self, receipt: NewReceipt) -> Result<Receipt, ApiError> {
        let receipt = self.memory().append(receipt)?;
        if let Some(primary) = self.primary() {
            match primary.insert_receipt(&receipt) {
                Ok(()) => {
                    self.memory().mark_flushed(&receipt);
                }
                Err(err) => {
                    warn!(cert_id = %receipt.cert_id, error = %err, "receipt kept in memory only");
                }
            }
        }
        info!(
            cert_id = %receipt.cert_id,
            provider = %receipt.provider,
            status = %receipt.status,
            txid = receipt.txid_str(),
            "receipt recorded"
        );
        Ok(receipt)
    }

    /// Removes receipts for `cert_id` (or every certificate) from all stores.
    ///
    /// The count covers durable rows plus memory entries that never reached durable storage, so
    /// a receipt mirrored in both places is counted once. When the primary clear fails its
    /// memory mirrors are counted instead, since memory is the only place they were removed.
    pub fn clear_receipts(&self, cert_id: Option<&str>) -> usize {
        let mut cleared = 0;
        let mut primary_cleared = true;
        if let Some(primary) = self.primary() {
            match primary.clear(cert_id) {
                Ok(removed) => cleared += removed,
                Err(err) => {
                    primary_cleared = false;
                    warn!(store = primary.label(), error = %err, "clear failed");
                }
            }
        }
        if let Some(legacy) = self.legacy() {
            match legacy.clear(cert_id) {
                Ok(removed) => cleared += removed,
                Err(err) => warn!(store = legacy.label(), error = %err, "clear failed"),
            }
        }
        let memory = self.memory().clear_detailed(cert_id);
        cleared += if primary_cleared {
            memory.unflushed
        } else {
            memory.removed
        };
        info!(cert_id = cert_id.unwrap_or("*"), cleared, "receipts cleared");
        cleared
    }

    /// Reconciled, newest-first history for display, capped at [`HISTORY_LIMIT`]. Never fails;
    /// unavailable stores are skipped.
    pub fn history(&self, cert_id: &str) -> HistoryView {
        self.reconciled(cert_id, HISTORY_LIMIT)
    }

    /// Every reconciled receipt for `cert_id`, newest first.
    pub fn all_receipts(&self, cert_id: &str) -> Vec<Receipt> {
        self.reconciled(cert_id, usize::MAX).items
    }

    fn reconciled(&self, cert_id: &str, limit: usize) -> HistoryView {
        let mut sources: Vec<&dyn ReceiptSource> = Vec::with_capacity(3);
        if let Some(primary) = self.primary() {
            sources.push(primary);
        }
        if let Some(legacy) = self.legacy() {
            sources.push(legacy);
        }
        sources.push(self.memory());

        let outcome = first_with_rows(&sources, cert_id, limit);
        for (label, reason) in &outcome.skipped {
            warn!(%cert_id, store = %label, %reason, "history source skipped");
        }

        let (source, durable) = match outcome.hit {
            Some(hit) => {
                debug!(%cert_id, store = %hit.label, rows = hit.rows.len(), "history source selected");
                (Some(hit.label), hit.rows)
            }
            None => (None, Vec::new()),
        };
        let pending = self.memory().unflushed(cert_id, limit);
        HistoryView::build(source, merge_history(durable, pending, limit))
    }

    pub fn latest_receipt(&self, cert_id: &str, provider: &Provider) -> Option<Receipt> {
        self.history(cert_id).last_for(provider).cloned()
    }

    /// The most complete evidence record across durable stores; empty when none is readable.
    pub fn load_evidence(&self, cert_id: &str) -> Evidence {
        let mut best = Evidence::empty(cert_id);
        for store in [self.primary(), self.legacy()].into_iter().flatten() {
            match store.evidence_get(cert_id) {
                Ok(Some(found)) => best = best.most_complete(found),
                Ok(None) => {}
                Err(err) => {
                    warn!(%cert_id, store = store.label(), error = %err, "evidence read failed");
                }
            }
        }
        best
    }

    pub fn update_evidence(&self, cert_id: &str, update: &EvidenceUpdate) -> Result<Evidence, ApiError> {
        let Some(primary) = self.primary() else {
            return Err(ApiError::Storage(
                self.primary_error()
                    .unwrap_or("no durable store configured")
                    .to_string(),
            ));
        };
        let evidence = primary.evidence_upsert(cert_id, update)?;
        info!(%cert_id, "evidence updated");
        Ok(evidence)
    }

    /// Side updates from provider flows; failures are logged, never returned.
    pub fn note_evidence(&self, cert_id: &str, update: &EvidenceUpdate) {
        if self.primary().is_none() {
            return;
        }
        if let Err(err) = self.update_evidence(cert_id, update) {
            warn!(%cert_id, error = %err, "evidence side update skipped");
        }
    }
}
