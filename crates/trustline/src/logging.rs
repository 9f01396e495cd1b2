//! Logging initialization
//!
//! Everything goes to stderr so `trustline m2m` keeps stdout for its
//! report. `RUST_LOG` takes precedence over the configured level; `-v`
//! flags raise the configured level.

use std::io;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingSettings;

/// Filter directive for the configured level raised by `verbose`
pub fn effective_level(configured: &str, verbose: u8) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if a subscriber is already installed.
pub fn init(settings: &LoggingSettings, verbose: u8) -> io::Result<()> {
    let level = effective_level(&settings.level, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    let subscriber = tracing_subscriber::registry().with(filter);

    if settings.structured {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}
