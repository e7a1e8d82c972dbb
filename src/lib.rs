//! Ticket Notes - notes and users REST service with sequential ticket numbers
//!
//! Notes belong to users and receive a ticket number from a shared counter
//! when they are created. Users cannot be deleted while notes still point at
//! them, and usernames are unique.

// Core foundational modules
pub mod core;

// Main functional modules
pub mod api;
pub mod security;
pub mod services;
pub mod storage;
pub mod system;

// Re-export commonly used items for convenience
pub use crate::core::{AppState, Config, Error, Result};

use crate::core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize tracing and the metrics registry.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| Error::config(format!("Invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match logging.format.as_str() {
        "compact" => builder.compact().try_init(),
        _ => builder.pretty().try_init(),
    };
    installed.map_err(|e| Error::config(format!("Failed to install subscriber: {}", e)))?;

    tracing::info!("Initializing {} v{}", NAME, VERSION);

    system::metrics::init_registry();

    Ok(())
}
