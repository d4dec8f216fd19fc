#![forbid(unsafe_code)]

use std::path::PathBuf;
use vu_core::{NewReceipt, Provider};
use vu_storage::{
    MemoryReceipts, ReceiptSource, ReceiptStore, SourceRows, SqliteStore, first_with_rows,
};

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

struct Broken;

impl ReceiptSource for Broken {
    fn label(&self) -> &str {
        "broken"
    }

    fn recent(&self, _cert_id: &str, _limit: usize) -> SourceRows {
        SourceRows::Unavailable("disk on fire".to_string())
    }
}

fn tsa(cert_id: &str, txid: &str) -> NewReceipt {
    NewReceipt::new(cert_id, Provider::Tsa, "ok", Some(txid.to_string()))
}

#[test]
fn first_source_with_rows_wins() {
    let dir = temp_dir("first_source_with_rows_wins");
    let primary = SqliteStore::open(dir.join("primary.db")).expect("primary");
    let legacy = SqliteStore::open(dir.join("legacy.db")).expect("legacy");
    let memory = MemoryReceipts::new();

    legacy.append(tsa("c1", "from-legacy")).expect("append legacy");
    memory.append(tsa("c1", "from-memory")).expect("append memory");

    let outcome = first_with_rows(&[&primary, &legacy, &memory], "c1", 10);
    let hit = outcome.hit.expect("hit");
    assert_eq!(hit.label, "sqlite:legacy.db");
    assert_eq!(hit.rows[0].txid_str(), "from-legacy");
    assert!(outcome.skipped.is_empty());

    primary.append(tsa("c1", "from-primary")).expect("append primary");
    let hit = first_with_rows(&[&primary, &legacy, &memory], "c1", 10)
        .hit
        .expect("hit");
    assert_eq!(hit.label, "sqlite:primary.db");
}

#[test]
fn unavailable_sources_are_skipped_and_reported() {
    let memory = MemoryReceipts::new();
    memory.append(tsa("c1", "m1")).expect("append");

    let outcome = first_with_rows(&[&Broken, &memory], "c1", 10);
    assert_eq!(outcome.hit.expect("hit").label, "memory");
    assert_eq!(
        outcome.skipped,
        vec![("broken".to_string(), "disk on fire".to_string())]
    );
}

#[test]
fn all_empty_yields_no_hit() {
    let memory = MemoryReceipts::new();
    let outcome = first_with_rows(&[&memory], "nobody", 10);
    assert!(outcome.hit.is_none());
    assert!(outcome.skipped.is_empty());
}
