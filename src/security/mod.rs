//! Credential handling

pub mod password;

// Re-export commonly used items
pub use password::{hash_password, hash_password_blocking, verify_password};
