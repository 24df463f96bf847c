//! Logging setup
//!
//! This module provides logging configuration.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Setup logging with the specified level
///
/// `RUST_LOG` takes precedence when set.
pub fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .with(filter)
        .try_init()
        .ok();

    Ok(())
}

/// Map a `-v` count to a level name
pub fn level_from_verbosity(verbose: u8, default: &str) -> &str {
    match verbose {
        0 => default,
        1 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_twice_is_harmless() {
        setup_logging("warn").unwrap();
        setup_logging("debug").unwrap();
    }

    #[test]
    fn test_level_from_verbosity() {
        assert_eq!(level_from_verbosity(0, "info"), "info");
        assert_eq!(level_from_verbosity(1, "info"), "debug");
        assert_eq!(level_from_verbosity(4, "info"), "trace");
    }
}
