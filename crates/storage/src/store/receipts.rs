#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError, column_text, now_stamp, parse_timestamp_ms};
use rusqlite::{OptionalExtension, params};
use vu_core::{NewReceipt, Provider, Receipt};

/// Append-only receipt log.
pub trait ReceiptStore: Send + Sync {
    /// Stores the receipt with a server-assigned timestamp.
    fn append(&self, receipt: NewReceipt) -> Result<Receipt, StoreError>;

    /// Newest first, at most `limit` rows; pass `usize::MAX` for all of them.
    fn list(&self, cert_id: &str, limit: usize) -> Result<Vec<Receipt>, StoreError>;

    fn latest(&self, cert_id: &str, provider: &Provider) -> Result<Option<Receipt>, StoreError>;

    /// Removes the receipts of one certificate, or of every certificate when `None`.
    fn clear(&self, cert_id: Option<&str>) -> Result<usize, StoreError>;
}

const RECEIPT_COLUMNS: &str = "cert_id, provider, status, txid, created_at";

impl SqliteStore {
    /// Writes an already stamped receipt, keeping its timestamp. Used to mirror receipts first
    /// recorded in memory.
    pub fn insert_receipt(&self, receipt: &Receipt) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO receipts(cert_id, provider, status, txid, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                receipt.cert_id,
                receipt.provider.as_str(),
                receipt.status,
                receipt.txid,
                receipt.created_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn receipt_count(&self, cert_id: &str) -> Result<usize, StoreError> {
        let conn = self.connect()?;
        let count = conn.query_row(
            "SELECT count(*) FROM receipts WHERE cert_id = ?1",
            params![cert_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl ReceiptStore for SqliteStore {
    fn append(&self, receipt: NewReceipt) -> Result<Receipt, StoreError> {
        let (created_at, created_at_ms) = now_stamp();
        let receipt = receipt.stamped(created_at, created_at_ms);
        self.insert_receipt(&receipt)?;
        Ok(receipt)
    }

    fn list(&self, cert_id: &str, limit: usize) -> Result<Vec<Receipt>, StoreError> {
        let conn = self.connect()?;
        // Limits past i64 (`usize::MAX` for exports) mean "every row".
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE cert_id = ?1 ORDER BY id DESC LIMIT ?2"
        ))?;
        let mut rows = stmt.query(params![cert_id, limit])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(receipt_from_row(row)?);
        }
        Ok(out)
    }

    fn latest(&self, cert_id: &str, provider: &Provider) -> Result<Option<Receipt>, StoreError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {RECEIPT_COLUMNS} FROM receipts \
                     WHERE cert_id = ?1 AND lower(provider) = ?2 ORDER BY id DESC LIMIT 1"
                ),
                params![cert_id, provider.as_str()],
                |row| Ok(receipt_from_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn clear(&self, cert_id: Option<&str>) -> Result<usize, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let deleted = match cert_id {
            Some(cert_id) => tx.execute("DELETE FROM receipts WHERE cert_id = ?1", params![cert_id])?,
            None => tx.execute("DELETE FROM receipts", [])?,
        };
        tx.commit()?;
        Ok(deleted)
    }
}

fn receipt_from_row(row: &rusqlite::Row<'_>) -> Result<Receipt, StoreError> {
    let created_at = column_text(row, 4)?.unwrap_or_default();
    Ok(Receipt {
        cert_id: column_text(row, 0)?.unwrap_or_default(),
        provider: Provider::from_stored(&column_text(row, 1)?.unwrap_or_default()),
        status: column_text(row, 2)?.unwrap_or_default(),
        txid: column_text(row, 3)?.filter(|v| !v.trim().is_empty()),
        created_at_ms: parse_timestamp_ms(&created_at),
        created_at,
    })
}
