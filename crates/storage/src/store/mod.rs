#![forbid(unsafe_code)]

mod error;
mod evidence;
mod memory;
mod receipts;
mod schema;
mod source;
mod time;
mod url;

pub use error::StoreError;
pub use memory::{MemoryClear, MemoryReceipts};
pub use receipts::ReceiptStore;
pub use source::{FallbackOutcome, ReceiptSource, SourceHit, SourceRows, first_with_rows};
pub use self::time::{now_stamp, parse_timestamp_ms};
pub use self::url::DbUrl;

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// SQLite-backed evidence and receipt store.
///
/// Holds only the database path; every operation opens its own short-lived connection so the
/// store can be shared across request handlers without a long-lived lock.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    db_path: PathBuf,
    label: String,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and installs the schema.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self::with_path(db_path);
        let conn = store.connect()?;
        schema::install(&conn)?;
        Ok(store)
    }

    /// Opens an existing database file; never creates one.
    pub fn open_existing(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if !db_path.is_file() {
            return Err(StoreError::Missing {
                path: db_path.to_string_lossy().to_string(),
            });
        }
        Self::open(db_path)
    }

    pub fn open_url(url: &DbUrl) -> Result<Self, StoreError> {
        match url {
            DbUrl::Sqlite(path) => Self::open(path),
            DbUrl::Unsupported { scheme } => Err(StoreError::UnsupportedUrl {
                scheme: scheme.clone(),
            }),
        }
    }

    fn with_path(db_path: PathBuf) -> Self {
        let name = db_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| db_path.to_string_lossy().to_string());
        Self {
            label: format!("sqlite:{name}"),
            db_path,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Cheap liveness check used by the health endpoint.
    pub fn ping(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }
}

/// Reads a column as text whatever its storage class; older files keep timestamps as integers.
fn column_text(row: &rusqlite::Row<'_>, index: usize) -> Result<Option<String>, StoreError> {
    let value = match row.get_ref(index)? {
        ValueRef::Null => None,
        ValueRef::Integer(v) => Some(v.to_string()),
        ValueRef::Real(v) => Some(v.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).to_string())
        }
    };
    Ok(value)
}
