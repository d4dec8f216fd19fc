#![forbid(unsafe_code)]

use super::{ReceiptStore, StoreError, now_stamp};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use vu_core::{NewReceipt, Provider, Receipt};

#[derive(Clone, Debug)]
struct Entry {
    receipt: Receipt,
    flushed: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryClear {
    pub removed: usize,
    /// Removed entries that had never been written to durable storage.
    pub unflushed: usize,
}

/// Process-lifetime receipt log keyed by certificate id.
///
/// The lock is held only while a single list is read or modified.
#[derive(Debug, Default)]
pub struct MemoryReceipts {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    by_cert: HashMap<String, Vec<Entry>>,
    last_stamp: Option<(String, i64)>,
}

impl MemoryReceipts {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records that `receipt` also reached durable storage.
    pub fn mark_flushed(&self, receipt: &Receipt) -> bool {
        let mut state = self.state();
        let Some(entries) = state.by_cert.get_mut(&receipt.cert_id) else {
            return false;
        };
        match entries.iter_mut().rev().find(|e| e.receipt == *receipt) {
            Some(entry) => {
                entry.flushed = true;
                true
            }
            None => false,
        }
    }

    /// Entries not yet written to durable storage, newest first.
    pub fn unflushed(&self, cert_id: &str, limit: usize) -> Vec<Receipt> {
        let state = self.state();
        state
            .by_cert
            .get(cert_id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .filter(|e| !e.flushed)
                    .take(limit)
                    .map(|e| e.receipt.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clear_detailed(&self, cert_id: Option<&str>) -> MemoryClear {
        let mut state = self.state();
        let removed: Vec<Entry> = match cert_id {
            Some(cert_id) => state.by_cert.remove(cert_id).unwrap_or_default(),
            None => state.by_cert.drain().flat_map(|(_, entries)| entries).collect(),
        };
        MemoryClear {
            removed: removed.len(),
            unflushed: removed.iter().filter(|e| !e.flushed).count(),
        }
    }
}

impl ReceiptStore for MemoryReceipts {
    fn append(&self, receipt: NewReceipt) -> Result<Receipt, StoreError> {
        let mut state = self.state();
        let mut stamp = now_stamp();
        // Keep per-process order monotonic even if the wall clock steps back.
        if let Some(last) = state.last_stamp.as_ref().filter(|last| last.1 > stamp.1) {
            stamp = last.clone();
        }
        state.last_stamp = Some(stamp.clone());
        let (created_at, created_at_ms) = stamp;
        let receipt = receipt.stamped(created_at, created_at_ms);
        state
            .by_cert
            .entry(receipt.cert_id.clone())
            .or_default()
            .push(Entry {
                receipt: receipt.clone(),
                flushed: false,
            });
        Ok(receipt)
    }

    fn list(&self, cert_id: &str, limit: usize) -> Result<Vec<Receipt>, StoreError> {
        let state = self.state();
        Ok(state
            .by_cert
            .get(cert_id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .take(limit)
                    .map(|e| e.receipt.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn latest(&self, cert_id: &str, provider: &Provider) -> Result<Option<Receipt>, StoreError> {
        let state = self.state();
        Ok(state.by_cert.get(cert_id).and_then(|entries| {
            entries
                .iter()
                .rev()
                .find(|e| &e.receipt.provider == provider)
                .map(|e| e.receipt.clone())
        }))
    }

    fn clear(&self, cert_id: Option<&str>) -> Result<usize, StoreError> {
        Ok(self.clear_detailed(cert_id).removed)
    }
}
