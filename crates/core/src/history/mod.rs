#![forbid(unsafe_code)]

use crate::ids::Provider;
use crate::model::Receipt;
use std::collections::HashMap;

/// Merges a durable history with in-memory entries that may not have reached durable storage.
///
/// Both inputs are newest-first, as returned by the stores. A memory entry is dropped only when
/// it mirrors a durable row with the same [`ReceiptKey`](crate::ReceiptKey); rows within one
/// source are never collapsed, even when they share a txid. The result is newest-first and
/// capped at `limit`.
pub fn merge_history(durable: Vec<Receipt>, memory: Vec<Receipt>, limit: usize) -> Vec<Receipt> {
    let mut mirrors: HashMap<_, usize> = HashMap::new();
    for receipt in &durable {
        *mirrors.entry(receipt.key()).or_default() += 1;
    }
    let pending: Vec<Receipt> = memory
        .into_iter()
        .filter(|receipt| match mirrors.get_mut(&receipt.key()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .collect();

    // Oldest first so insertion order breaks timestamp ties.
    let mut ordered: Vec<Receipt> = durable
        .into_iter()
        .rev()
        .chain(pending.into_iter().rev())
        .collect();
    ordered.sort_by_key(|r| r.created_at_ms);
    ordered.into_iter().rev().take(limit).collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderSummary {
    pub status: Option<String>,
    pub txid: Option<String>,
}

impl ProviderSummary {
    fn from_receipt(receipt: Option<&Receipt>) -> Self {
        match receipt {
            Some(receipt) => Self {
                status: Some(receipt.status.clone()),
                txid: receipt.txid.clone(),
            },
            None => Self::default(),
        }
    }
}

/// Reconciled receipt history for one certificate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryView {
    /// Label of the store the durable part came from, `None` when every store was empty.
    pub source: Option<String>,
    /// Newest first.
    pub items: Vec<Receipt>,
    pub tsa: ProviderSummary,
    pub chain: ProviderSummary,
}

impl HistoryView {
    pub fn build(source: Option<String>, items: Vec<Receipt>) -> Self {
        let tsa = ProviderSummary::from_receipt(last_for(&items, &Provider::Tsa));
        let chain = ProviderSummary::from_receipt(last_for(&items, &Provider::Chain));
        Self {
            source,
            items,
            tsa,
            chain,
        }
    }

    pub fn last_for(&self, provider: &Provider) -> Option<&Receipt> {
        last_for(&self.items, provider)
    }
}

fn last_for<'a>(items: &'a [Receipt], provider: &Provider) -> Option<&'a Receipt> {
    items.iter().find(|r| &r.provider == provider)
}
