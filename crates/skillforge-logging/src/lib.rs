//! # skillforge-logging
//!
//! Structured logging for skill evaluation and bootstrapping runs.
//!
//! ## Key Types
//!
//! - [`Logger`] - structured event logging
//! - [`RunEvent`] - run event types
//! - [`LogFormat`] - output formats (Pretty, JSON, Compact)
//!
//! Console output goes to stderr so stdout stays clean for JSON artifacts;
//! an optional file sink records every event as JSON lines regardless of the
//! console format.

mod events;

pub use events::{LogFormat, Logger, RunEvent};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false))
                .init();
        }
    }
}
