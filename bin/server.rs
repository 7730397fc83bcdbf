// Wallet Screener - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use wallet_screener::api::{router, AppState};
use wallet_screener::{telemetry, Blockmate, Config, RequestRateLimiter, SqliteLedger};

#[derive(Parser)]
#[command(name = "wallet-screener-server", version)]
struct Args {
    /// PATH to TOML configuration file
    #[arg(long, env = "WALLET_SCREENER_CONFIG")]
    config: Option<PathBuf>,
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("http server start shutdown caused by interrupt"),
        _ = terminate => info!("http server start shutdown caused by terminate"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    telemetry::init_tracing(&config.log)?;
    config.validate()?;

    if let Err(e) = run(config).await {
        error!(error = %e, "unable to start service");
        return Err(e);
    }
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    // =========================================================================
    // Construct services

    let ledger = SqliteLedger::open(&config.ledger.path)
        .with_context(|| format!("unable to open ledger at {}", config.ledger.path.display()))?;
    info!(path = %config.ledger.path.display(), "ledger opened");

    let provider = Blockmate::new(&config.provider.blockmate)
        .context("unable to construct Blockmate risk provider")?;

    let limiter = RequestRateLimiter::new(config.http.rate_limit, config.http.rate_threshold())?;

    let state = AppState {
        provider: Arc::new(provider),
        ledger: Arc::new(ledger),
        limiter: Arc::new(limiter),
    };

    // =========================================================================
    // Start HTTP server

    let listener = tokio::net::TcpListener::bind(&config.http.address)
        .await
        .with_context(|| format!("failed to bind to {}", config.http.address))?;
    info!(address = %config.http.address, "http server listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    // =========================================================================
    // Shutdown

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    // Give outstanding requests a deadline for completion.
    match tokio::time::timeout(config.http.shutdown_timeout(), server).await {
        Ok(joined) => joined
            .context("server task panicked")?
            .context("could not stop server gracefully")?,
        Err(_) => anyhow::bail!(
            "graceful shutdown did not complete within {:?}",
            config.http.shutdown_timeout()
        ),
    }

    info!("http server stopped");
    Ok(())
}
