use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use client_core::ScanSession;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;

use commands::{parse_line, OperatorCommand, HELP_TEXT};

#[derive(Parser, Debug)]
#[command(about = "Barcode scanning client for the inventory backend")]
struct Args {
    /// TOML settings file; defaults to <config dir>/inventory-scanner/scanner.toml
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    add_timeout_secs: Option<u64>,
    #[arg(long)]
    request_timeout_secs: Option<u64>,
}

impl Args {
    fn overrides(&self) -> config::Overrides {
        config::Overrides {
            backend_url: self.backend_url.clone(),
            add_mode_timeout_secs: self.add_timeout_secs,
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let settings = config::load_settings(args.config.as_deref(), &args.overrides())
        .context("failed to load scanner settings")?;
    let session = ScanSession::new(settings.session_config());
    let renderer = tokio::spawn(render::run(session.state().event_stream()));

    match &settings.backend_url {
        Some(url) => {
            session.configure(url).await?;
            probe_backend(&session).await;
        }
        None => println!("{}", render::NO_BACKEND_HINT),
    }
    println!("{}", render::mode_banner(session.mode().await));
    println!("Type :help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read scanner input")? else {
                    break;
                };
                if !handle_line(&session, &line).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    session.shutdown().await;
    renderer.abort();
    Ok(())
}

/// Returns `false` when the operator asked to quit.
async fn handle_line(session: &Arc<ScanSession>, line: &str) -> bool {
    match parse_line(line) {
        OperatorCommand::Scan(raw) => {
            // Outcomes arrive through the event stream; the next scan must not wait.
            let _dispatch = session.handle_scan(&raw).await;
        }
        OperatorCommand::SelectMode(mode) => session.select_mode(mode).await,
        OperatorCommand::SetBackendUrl(url) => match session.configure(&url).await {
            Ok(()) if url.trim().is_empty() => println!("{}", render::NO_BACKEND_HINT),
            Ok(()) => probe_backend(session).await,
            Err(err) => println!("Error: {err:#}"),
        },
        OperatorCommand::ListInventory => list_inventory(session).await,
        OperatorCommand::Status => print_status(session).await,
        OperatorCommand::Help => println!("{HELP_TEXT}"),
        OperatorCommand::Quit => return false,
        OperatorCommand::Unknown(input) => {
            println!("Unknown command '{input}'. Type :help for commands.")
        }
    }
    true
}

async fn probe_backend(session: &ScanSession) {
    let Some(gateway) = session.gateway().await else {
        return;
    };
    match gateway.check_health().await {
        Ok(health) if health.is_ok() => println!("Backend reachable."),
        Ok(health) => {
            warn!(status = %health.status, "backend reported unhealthy status");
            println!("Backend answered with status '{}'.", health.status);
        }
        Err(err) => {
            warn!(error = %err, "backend health check failed");
            println!(
                "Backend not reachable yet: {}",
                client_core::failure_message(&err)
            );
        }
    }
}

async fn list_inventory(session: &ScanSession) {
    let Some(gateway) = session.gateway().await else {
        println!("{}", render::NO_BACKEND_HINT);
        return;
    };
    match gateway.list_inventory().await {
        Ok(entries) => println!(
            "{}",
            render::describe_inventory(&entries, Local::now().date_naive())
        ),
        Err(err) => println!("Error: {}", client_core::failure_message(&err)),
    }
}

async fn print_status(session: &ScanSession) {
    let state = session.state();
    println!("{}", render::mode_banner(session.mode().await));
    if let Some(countdown) = state.countdown() {
        println!(
            "Reverts to REMOVE in {}",
            render::format_countdown(countdown.remaining_secs)
        );
    }
    match session.gateway().await {
        Some(_) => println!("Backend configured."),
        None => println!("{}", render::NO_BACKEND_HINT),
    }
    if state.is_loading() {
        println!("Request in flight.");
    }
}
