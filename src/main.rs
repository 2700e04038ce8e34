//! ghrecon - GitHub organization reconnaissance
//!
//! CLI entry point.

use clap::Parser;
use ghrecon::{Config, ReconError, ScanReport, Scanner, Shutdown};
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_tracing(&config);

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let scanner = match Scanner::new(config.clone(), shutdown) {
        Ok(scanner) => scanner,
        Err(e) => {
            error!("failed to initialize: {}", e);
            return ExitCode::from(1);
        }
    };

    match scanner.run().await {
        Ok(report) => {
            if let Err(e) = emit_report(&config, &report) {
                error!("failed to write report: {}", e);
                return ExitCode::from(1);
            }
            if report.repos_processed == 0 {
                error!("no repositories were processed for {}", report.target);
                return ExitCode::from(1);
            }
            ExitCode::SUCCESS
        }
        Err(e @ (ReconError::OrgNotFound(_) | ReconError::Auth(_))) => {
            error!("scan not started: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("scan failed: {}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(config: &Config) {
    let default_filter = if config.verbose {
        "ghrecon=debug,info"
    } else {
        "ghrecon=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Flip the shutdown flag on SIGINT/SIGTERM; the pipeline checks it
/// between units of work and finishes the report with what it has.
fn spawn_signal_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    debug!("no SIGINT handler: {}", e);
                    return;
                }
            };
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    debug!("no SIGTERM handler: {}", e);
                    return;
                }
            };
            tokio::select! {
                _ = sigint.recv() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
        }
        eprintln!("interrupt received, finishing current work...");
        shutdown.trigger();
    });
}

/// Emit the machine-readable report when requested: to stdout with
/// `--json`, and/or to a file with `--output`.
fn emit_report(config: &Config, report: &ScanReport) -> ghrecon::Result<()> {
    if config.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    if let Some(ref path) = config.output {
        std::fs::write(path, serde_json::to_string_pretty(report)?)?;
        debug!("report written to {}", path.display());
    }
    Ok(())
}
