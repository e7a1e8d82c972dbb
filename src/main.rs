//! Ticket Notes Server
//!
//! Notes and users REST API with sequential ticket numbers.

use clap::{Arg, ArgMatches, Command};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use ticket_notes::api::{start_metrics_server, start_server};
use ticket_notes::core::config::StorageType;
use ticket_notes::{AppState, Config, Error, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("ticket-notes")
        .version(ticket_notes::VERSION)
        .about("Notes and users REST API with sequential ticket numbers.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("http-addr")
                .long("http-addr")
                .value_name("ADDR")
                .help("HTTP server bind address"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory path"),
        )
        .arg(
            Arg::new("storage-type")
                .long("storage-type")
                .value_name("TYPE")
                .help("Storage backend type (memory, disk)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .get_matches();

    // Load configuration
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            let mut config = Config::from_file(path)?;
            config.apply_env_overrides()?;
            config
        }
        None => Config::load()?,
    };

    // Apply CLI overrides
    apply_cli_overrides(&mut config, &matches)?;
    config.validate()?;

    ticket_notes::init(&config.logging)?;
    info!("Starting Ticket Notes v{}", ticket_notes::VERSION);

    // Initialize storage
    let store = ticket_notes::storage::create_store(&config.storage)
        .await
        .map_err(|e| Error::config(format!("Storage initialization failed: {}", e)))?;
    info!("Storage initialized: {:?}", config.storage.storage_type);

    let state = Arc::new(AppState::new(store, config));

    // A missing counter is created on first use, so startup continues
    match state.tickets.initialize().await {
        Ok(_) => info!("Counter initialized."),
        Err(e) => error!(error = %e, "Error initializing counter"),
    }

    // Setup graceful shutdown handling
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_handle = if state.config.metrics.enable_prometheus {
        let addr = state.config.metrics.metrics_addr;
        let shutdown = wait_for(shutdown_rx.clone());
        Some(tokio::spawn(async move {
            if let Err(e) = start_metrics_server(addr, shutdown).await {
                error!(error = %e, "Metrics server stopped");
            }
        }))
    } else {
        None
    };

    let mut server = tokio::spawn(start_server(state, wait_for(shutdown_rx)));

    let finished = tokio::select! {
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, initiating graceful shutdown...");
            let _ = shutdown_tx.send(true);
            server.await
        }
        // Bind failures end the server before any signal arrives
        finished = &mut server => {
            let _ = shutdown_tx.send(true);
            finished
        }
    };

    match finished {
        Ok(result) => result?,
        Err(e) => return Err(Error::internal(format!("HTTP server task failed: {}", e))),
    }
    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &ArgMatches) -> Result<()> {
    if let Some(addr) = matches.get_one::<String>("http-addr") {
        config.server.http_addr = addr
            .parse()
            .map_err(|e| Error::config(format!("Invalid HTTP address: {}", e)))?;
    }

    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.storage.data_dir = data_dir.into();
    }

    if let Some(storage_type) = matches.get_one::<String>("storage-type") {
        config.storage.storage_type = storage_type.parse::<StorageType>()?;
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    Ok(())
}

/// Resolve once the shutdown flag flips
async fn wait_for(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
