#![forbid(unsafe_code)]

use super::StoreError;
use rusqlite::Connection;

/// Column layout matches the demo database written by the earlier tooling so the same file can
/// serve as the primary store or the legacy fallback.
pub(super) fn install(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS receipts (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          cert_id TEXT NOT NULL,
          provider TEXT,
          status TEXT,
          txid TEXT,
          created_at TEXT
        );

        CREATE TABLE IF NOT EXISTS evidence (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          cert_id TEXT UNIQUE,
          file_path TEXT,
          sha256 TEXT,
          c2pa_claim TEXT,
          c2pa_signed_by TEXT,
          tsa_url TEXT,
          tsq_b64 TEXT,
          tsr_b64 TEXT,
          sepolia_txhash TEXT,
          title TEXT,
          owner TEXT,
          created_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_receipts_cert ON receipts(cert_id, id);
        "#,
    )?;

    for column in [
        "file_path",
        "sha256",
        "c2pa_claim",
        "c2pa_signed_by",
        "tsa_url",
        "tsq_b64",
        "tsr_b64",
        "sepolia_txhash",
        "title",
        "owner",
        "created_at",
    ] {
        add_column_if_missing(conn, "evidence", column, "TEXT")?;
    }
    for column in ["provider", "status", "txid", "created_at"] {
        add_column_if_missing(conn, "receipts", column, "TEXT")?;
    }
    Ok(())
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<(), StoreError> {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    match conn.execute(&sql, []) {
        Ok(_) => Ok(()),
        Err(err) if is_duplicate_column(&err) => Ok(()),
        Err(err) => Err(StoreError::Sql(err)),
    }
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            message.contains("duplicate column name")
        }
        _ => false,
    }
}
