#![forbid(unsafe_code)]
#![allow(dead_code)]

use reqwest::StatusCode;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use vu_server::tools::ToolPaths;
use vu_server::tsa::TsaEnv;
use vu_server::{AppState, StateOptions};

pub(crate) struct Server {
    pub(crate) addr: SocketAddr,
    pub(crate) client: reqwest::Client,
    pub(crate) state: AppState,
    pub(crate) dir: PathBuf,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl Server {
    /// Service backed by a fresh SQLite file in a per-test directory.
    pub(crate) async fn start(test_name: &str) -> Self {
        Self::start_with(test_name, |_| {}).await
    }

    pub(crate) async fn start_with(test_name: &str, tweak: impl FnOnce(&mut StateOptions)) -> Self {
        let dir = temp_dir(test_name);
        let mut options = StateOptions {
            db_url: dir.join("data.db").display().to_string(),
            legacy_db: None,
            tsa_config: Some(dir.join("tsa_config.json")),
            tsa_env: TsaEnv::default(),
            tools: ToolPaths::default(),
            port: 0,
        };
        tweak(&mut options);
        let state = AppState::open(options).expect("open state");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let serve_state = state.clone();
        let task = tokio::spawn(async move {
            let _ = vu_server::serve(listener, serve_state, async move {
                let _ = rx.await;
            })
            .await;
        });

        Self {
            addr,
            client: reqwest::Client::new(),
            state,
            dir,
            shutdown: Some(tx),
            task,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub(crate) async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.expect("get");
        let status = resp.status();
        (status, resp.json().await.expect("json body"))
    }

    pub(crate) async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("post");
        let status = resp.status();
        (status, resp.json().await.expect("json body"))
    }

    pub(crate) async fn post_empty(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.post(self.url(path)).send().await.expect("post");
        let status = resp.status();
        (status, resp.json().await.expect("json body"))
    }

    /// Raw CSV export: (status, headers, body without BOM). Panics if the BOM is missing.
    pub(crate) async fn export(&self, query: &str) -> (StatusCode, reqwest::header::HeaderMap, String) {
        let resp = self
            .client
            .get(self.url(&format!("/api/receipts/export?{query}")))
            .send()
            .await
            .expect("export");
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.expect("body");
        assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF]), "csv must start with a BOM");
        let text = String::from_utf8(bytes[3..].to_vec()).expect("utf-8 csv");
        (status, headers, text)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.abort();
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

pub(crate) fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("vu_server_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// CSV data rows (header excluded), split on commas. Only for exports without quoted fields.
pub(crate) fn csv_rows(text: &str) -> Vec<Vec<String>> {
    text.split("\r\n")
        .filter(|line| !line.is_empty())
        .skip(1)
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}
