//! medagenda core library
//!
//! Local-first persistence and scheduling core for a medical appointment
//! app: a string-keyed JSON document store, domain repositories for
//! appointments and users, and services for notifications, statistics,
//! settings and backups. UI layers sit on top and pass explicit user ids;
//! there is no ambient session state here.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod storage;

pub use error::{AppError, Result};

/// Initialize the tracing subscriber.
///
/// Honors `RUST_LOG`; defaults to info level. Call once at startup.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
