#![forbid(unsafe_code)]

use crate::state::StateOptions;
use crate::tools::ToolPaths;
use crate::tsa::TsaEnv;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vu_core::DEFAULT_CERT_ID;

#[derive(Debug, Parser)]
#[command(name = "verify_upgrade")]
#[command(about = "Evidence verification service with TSA and chain receipt tracking")]
pub struct Cli {
    /// Primary database. `sqlite:///rel/path`, `sqlite:////abs/path`, `file:path` or a bare path.
    #[arg(long, env = "DB_URL", default_value = "sqlite:///./data.db", global = true)]
    pub db_url: String,

    /// Older database file consulted for history when present.
    #[arg(long, env = "VU_LEGACY_DB", default_value = "data/verify_upgrade.db", global = true)]
    pub legacy_db: PathBuf,

    #[arg(long, env = "VU_TSA_CONFIG", default_value = "data/tsa_config.json", global = true)]
    pub tsa_config: PathBuf,

    /// Log filter; `RUST_LOG` wins when set.
    #[arg(long, env = "VU_LOG", default_value = "info", global = true)]
    pub log: String,

    /// Provenance signing tool, a name on `PATH` or a path.
    #[arg(long, env = "VU_C2PATOOL", default_value = "c2patool", global = true)]
    pub c2patool: String,

    /// OpenSSL binary used to build timestamp queries.
    #[arg(long, env = "VU_OPENSSL", default_value = "openssl", global = true)]
    pub openssl: String,

    #[arg(long, default_value = "127.0.0.1", global = true)]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8011, global = true)]
    pub port: u16,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Insert demo evidence and three receipts.
    SeedDemo {
        #[arg(long, default_value = DEFAULT_CERT_ID)]
        cert_id: String,
    },
    /// Remove a certificate's receipts and evidence.
    ClearDemo {
        #[arg(long, default_value = DEFAULT_CERT_ID)]
        cert_id: String,
    },
}

impl Cli {
    pub fn state_options(&self) -> StateOptions {
        StateOptions {
            db_url: self.db_url.clone(),
            legacy_db: Some(self.legacy_db.clone()),
            tsa_config: Some(self.tsa_config.clone()),
            tsa_env: TsaEnv::from_process(),
            tools: ToolPaths {
                c2patool: self.c2patool.clone(),
                openssl: self.openssl.clone(),
            },
            port: self.port,
        }
    }
}
