//! Core system types and foundations
//!
//! Document types, error handling, configuration and the shared application
//! state.

pub mod app_state;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use app_state::AppState;
pub use config::Config;
pub use error::{Error, Result, StorageError};
pub use types::{Counter, Id, Note, Role, User, UserView};
