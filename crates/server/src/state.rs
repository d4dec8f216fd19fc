#![forbid(unsafe_code)]

use crate::error::StartupError;
use crate::tools::ToolPaths;
use crate::tsa::{TsaEnv, TsaSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use vu_storage::{DbUrl, MemoryReceipts, SqliteStore, StoreError};

/// Everything needed to assemble [`AppState`].
#[derive(Clone, Debug)]
pub struct StateOptions {
    pub db_url: String,
    /// Opened only if the file already exists.
    pub legacy_db: Option<PathBuf>,
    pub tsa_config: Option<PathBuf>,
    pub tsa_env: TsaEnv,
    pub tools: ToolPaths,
    pub port: u16,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    memory: MemoryReceipts,
    primary: Option<SqliteStore>,
    primary_error: Option<String>,
    legacy: Option<SqliteStore>,
    tsa: RwLock<TsaSettings>,
    http: reqwest::Client,
    tools: ToolPaths,
    port: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbHealth {
    Ok,
    Unavailable,
    Disabled,
}

impl DbHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Unavailable => "unavailable",
            Self::Disabled => "disabled",
        }
    }
}

impl AppState {
    /// Opens the configured stores. Storage problems degrade to memory-only operation instead of
    /// failing startup.
    pub fn open(options: StateOptions) -> Result<Self, StartupError> {
        let (primary, primary_error) = match SqliteStore::open_url(&DbUrl::parse(&options.db_url))
        {
            Ok(store) => {
                info!(store = store.label(), "primary store ready");
                (Some(store), None)
            }
            Err(err) => {
                warn!(db_url = %options.db_url, error = %err, "primary store unavailable; receipts stay in memory");
                (None, Some(err.to_string()))
            }
        };

        let legacy = options
            .legacy_db
            .as_ref()
            .and_then(|path| match SqliteStore::open_existing(path) {
                Ok(store) if primary.as_ref().is_some_and(|p| same_file(p, &store)) => None,
                Ok(store) => {
                    info!(store = store.label(), "legacy store attached");
                    Some(store)
                }
                Err(StoreError::Missing { .. }) => None,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "legacy store skipped");
                    None
                }
            });

        let (settings, tsa_warning) = TsaSettings::load(options.tsa_env, options.tsa_config);
        if let Some(message) = tsa_warning {
            warn!(%message, "tsa config file ignored");
        }

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                memory: MemoryReceipts::new(),
                primary,
                primary_error,
                legacy,
                tsa: RwLock::new(settings),
                http,
                tools: options.tools,
                port: options.port,
            }),
        })
    }

    pub fn memory(&self) -> &MemoryReceipts {
        &self.inner.memory
    }

    pub fn primary(&self) -> Option<&SqliteStore> {
        self.inner.primary.as_ref()
    }

    /// Why the primary store is missing, when it is.
    pub fn primary_error(&self) -> Option<&str> {
        self.inner.primary_error.as_deref()
    }

    pub fn legacy(&self) -> Option<&SqliteStore> {
        self.inner.legacy.as_ref()
    }

    pub fn tsa(&self) -> &RwLock<TsaSettings> {
        &self.inner.tsa
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.inner.tools
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    pub fn primary_health(&self) -> DbHealth {
        match (self.primary(), self.primary_error()) {
            (Some(store), _) => store_health(store),
            (None, Some(_)) => DbHealth::Unavailable,
            (None, None) => DbHealth::Disabled,
        }
    }

    pub fn legacy_health(&self) -> DbHealth {
        self.legacy().map_or(DbHealth::Disabled, store_health)
    }
}

fn store_health(store: &SqliteStore) -> DbHealth {
    match store.ping() {
        Ok(()) => DbHealth::Ok,
        Err(_) => DbHealth::Unavailable,
    }
}

fn same_file(a: &SqliteStore, b: &SqliteStore) -> bool {
    match (a.db_path().canonicalize(), b.db_path().canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.db_path() == b.db_path(),
    }
}
