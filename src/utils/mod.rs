//! Utility functions and helpers
//!
//! This module contains the processing clock, timestamp helpers and logging setup.

pub mod time;

pub use time::{epoch_score, ProcessingClock};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with the AUDIT_LOG environment variable.
///
/// Defaults to "info" level if AUDIT_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("AUDIT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
