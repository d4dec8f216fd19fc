#![forbid(unsafe_code)]

use std::path::PathBuf;
use vu_core::EvidenceUpdate;
use vu_storage::{SqliteStore, StoreError};

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("vu_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[test]
fn upsert_creates_then_merges_non_empty_fields() {
    let dir = temp_dir("upsert_creates_then_merges_non_empty_fields");
    let store = SqliteStore::open(dir.join("data.db")).expect("open store");

    assert!(store.evidence_get("cert-1").expect("get").is_none());

    let created = store
        .evidence_upsert(
            "cert-1",
            &EvidenceUpdate {
                file_path: Some("samples/demo.png".to_string()),
                sha256: Some("ab".repeat(32)),
                title: Some("Demo".to_string()),
                ..EvidenceUpdate::default()
            },
        )
        .expect("insert");
    assert!(created.created_at.is_some());

    let updated = store
        .evidence_upsert(
            "cert-1",
            &EvidenceUpdate {
                title: Some(String::new()),
                tsa_url: Some("https://tsa.example/stamp".to_string()),
                ..EvidenceUpdate::default()
            },
        )
        .expect("update");
    assert_eq!(updated.title.as_deref(), Some("Demo"));
    assert_eq!(updated.tsa_url.as_deref(), Some("https://tsa.example/stamp"));
    assert_eq!(updated.created_at, created.created_at);

    let loaded = store.evidence_get("cert-1").expect("get").expect("row");
    assert_eq!(loaded, updated);
    assert_eq!(store.evidence_count("cert-1").expect("count"), 1);
}

#[test]
fn upsert_rejects_blank_cert_id() {
    let dir = temp_dir("upsert_rejects_blank_cert_id");
    let store = SqliteStore::open(dir.join("data.db")).expect("open store");
    let err = store
        .evidence_upsert("  ", &EvidenceUpdate::default())
        .expect_err("blank id");
    assert!(matches!(err, StoreError::InvalidInput(_)));
}

#[test]
fn older_schema_gains_missing_columns() {
    let dir = temp_dir("older_schema_gains_missing_columns");
    let db_path = dir.join("legacy.sqlite3");
    {
        let conn = rusqlite::Connection::open(&db_path).expect("open raw");
        conn.execute_batch(
            r#"
            CREATE TABLE evidence (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              cert_id TEXT,
              file_path TEXT,
              sha256 TEXT,
              tsa_url TEXT,
              created_at INTEGER
            );
            INSERT INTO evidence(cert_id, file_path, sha256, created_at)
            VALUES ('old', 'a.pdf', 'ff', 1700000000);
            "#,
        )
        .expect("seed legacy schema");
    }

    let store = SqliteStore::open_existing(&db_path).expect("open legacy");
    let evidence = store.evidence_get("old").expect("get").expect("row");
    assert_eq!(evidence.created_at.as_deref(), Some("1700000000"));
    assert_eq!(evidence.c2pa_claim, None);

    let updated = store
        .evidence_upsert(
            "old",
            &EvidenceUpdate {
                sepolia_txhash: Some("0xabc".to_string()),
                tsq_b64: Some("MCkCAQE=".to_string()),
                ..EvidenceUpdate::default()
            },
        )
        .expect("update legacy row");
    assert_eq!(updated.sepolia_txhash.as_deref(), Some("0xabc"));
    assert_eq!(updated.tsq_b64.as_deref(), Some("MCkCAQE="));
    assert_eq!(
        store.evidence_get("old").expect("get").expect("row").tsq_b64,
        updated.tsq_b64
    );
    assert_eq!(updated.file_path.as_deref(), Some("a.pdf"));
}

#[test]
fn open_existing_does_not_create_files() {
    let dir = temp_dir("open_existing_does_not_create_files");
    let missing = dir.join("nope.db");
    let err = SqliteStore::open_existing(&missing).expect_err("missing file");
    assert!(matches!(err, StoreError::Missing { .. }));
    assert!(!missing.exists());
}
