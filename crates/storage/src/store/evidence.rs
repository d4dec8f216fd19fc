#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError, column_text, now_stamp};
use rusqlite::{OptionalExtension, params};
use vu_core::{Evidence, EvidenceUpdate};

const EVIDENCE_COLUMNS: &str = "cert_id, file_path, sha256, c2pa_claim, c2pa_signed_by, \
     tsa_url, tsq_b64, tsr_b64, sepolia_txhash, title, owner, created_at";

impl SqliteStore {
    pub fn evidence_get(&self, cert_id: &str) -> Result<Option<Evidence>, StoreError> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE cert_id = ?1 ORDER BY id DESC LIMIT 1"
        );
        let row = conn
            .query_row(&sql, params![cert_id], |row| {
                Ok(evidence_from_row(row))
            })
            .optional()?;
        row.transpose()
    }

    /// Inserts the row on first write; later writes only replace fields the update carries
    /// with a non-empty value.
    pub fn evidence_upsert(
        &self,
        cert_id: &str,
        update: &EvidenceUpdate,
    ) -> Result<Evidence, StoreError> {
        let cert_id = cert_id.trim();
        if cert_id.is_empty() {
            return Err(StoreError::InvalidInput("cert_id must not be empty"));
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let sql = format!(
            "SELECT id, {EVIDENCE_COLUMNS} FROM evidence WHERE cert_id = ?1 ORDER BY id DESC LIMIT 1"
        );
        let existing = tx
            .query_row(&sql, params![cert_id], |row| {
                let id = row.get::<_, i64>(0)?;
                Ok((id, evidence_from_row_at(row, 1)))
            })
            .optional()?;

        let evidence = match existing {
            Some((id, current)) => {
                let mut evidence = current?;
                evidence.apply(update);
                if evidence.created_at.is_none() {
                    evidence.created_at = Some(now_stamp().0);
                }
                tx.execute(
                    "UPDATE evidence SET file_path=?1, sha256=?2, c2pa_claim=?3, c2pa_signed_by=?4, \
                     tsa_url=?5, tsq_b64=?6, tsr_b64=?7, sepolia_txhash=?8, title=?9, owner=?10, \
                     created_at=?11 WHERE id=?12",
                    params![
                        evidence.file_path,
                        evidence.sha256,
                        evidence.c2pa_claim,
                        evidence.c2pa_signed_by,
                        evidence.tsa_url,
                        evidence.tsq_b64,
                        evidence.tsr_b64,
                        evidence.sepolia_txhash,
                        evidence.title,
                        evidence.owner,
                        evidence.created_at,
                        id,
                    ],
                )?;
                evidence
            }
            None => {
                let mut evidence = Evidence::empty(cert_id);
                evidence.apply(update);
                evidence.created_at = Some(now_stamp().0);
                tx.execute(
                    "INSERT INTO evidence(cert_id, file_path, sha256, c2pa_claim, c2pa_signed_by, \
                     tsa_url, tsq_b64, tsr_b64, sepolia_txhash, title, owner, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        evidence.cert_id,
                        evidence.file_path,
                        evidence.sha256,
                        evidence.c2pa_claim,
                        evidence.c2pa_signed_by,
                        evidence.tsa_url,
                        evidence.tsq_b64,
                        evidence.tsr_b64,
                        evidence.sepolia_txhash,
                        evidence.title,
                        evidence.owner,
                        evidence.created_at,
                    ],
                )?;
                evidence
            }
        };
        tx.commit()?;
        Ok(evidence)
    }

    pub fn evidence_delete(&self, cert_id: &str) -> Result<usize, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM evidence WHERE cert_id = ?1", params![cert_id])?;
        tx.commit()?;
        Ok(deleted)
    }

    pub fn evidence_count(&self, cert_id: &str) -> Result<usize, StoreError> {
        let conn = self.connect()?;
        let count = conn.query_row(
            "SELECT count(*) FROM evidence WHERE cert_id = ?1",
            params![cert_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn evidence_from_row(row: &rusqlite::Row<'_>) -> Result<Evidence, StoreError> {
    evidence_from_row_at(row, 0)
}

fn evidence_from_row_at(row: &rusqlite::Row<'_>, offset: usize) -> Result<Evidence, StoreError> {
    let text = |index: usize| column_text(row, offset + index);
    Ok(Evidence {
        cert_id: text(0)?.unwrap_or_default(),
        file_path: text(1)?,
        sha256: text(2)?,
        c2pa_claim: text(3)?,
        c2pa_signed_by: text(4)?,
        tsa_url: text(5)?,
        tsq_b64: text(6)?,
        tsr_b64: text(7)?,
        sepolia_txhash: text(8)?,
        title: text(9)?,
        owner: text(10)?,
        created_at: text(11)?,
    })
}
