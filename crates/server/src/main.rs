#![forbid(unsafe_code)]

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vu_server::config::{Cli, Command};
use vu_server::{AppState, demo};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Command::SeedDemo { ref cert_id }) => {
            let report = demo::seed_demo(&cli.db_url, cert_id)?;
            println!(
                "seeded {cert_id}: evidence {}, receipts +{} (total {})",
                if report.evidence_created { "created" } else { "kept" },
                report.receipts_added,
                report.receipts_total
            );
        }
        Some(Command::ClearDemo { ref cert_id }) => {
            let report = demo::clear_demo(&cli.db_url, cert_id)?;
            println!(
                "cleared {cert_id}: receipts -{} evidence -{}; remaining receipts={} evidence={}",
                report.receipts_removed,
                report.evidence_removed,
                report.receipts_left,
                report.evidence_left
            );
        }
        Some(Command::Serve) | None => {
            let state = AppState::open(cli.state_options())?;
            let listener = vu_server::bind(&cli.host, cli.port).await?;
            tracing::info!(addr = %listener.local_addr()?, "verify-upgrade listening");
            vu_server::serve(listener, state, shutdown_signal()).await?;
            tracing::info!("verify-upgrade stopped");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}
