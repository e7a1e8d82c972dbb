//! System utilities and monitoring

pub mod metrics;

pub use metrics::{gather, init_registry, Metrics, Timer};
