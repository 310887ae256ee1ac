//! Tracing subscriber setup
//!
//! The library itself only emits `tracing` events. Applications that want them
//! on stderr call [`init`] once at startup; `RUST_LOG` takes precedence over the
//! configured level.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::config::LoggingConfig;

/// Install a global fmt subscriber
///
/// # Arguments
/// * `config` - Level and timestamp settings
///
/// # Returns
/// * `bool` - `false` when a global subscriber was already installed
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level.to_tracing_level()).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // Configure timestamps
    if config.timestamps {
        subscriber.try_init().is_ok()
    } else {
        subscriber.without_time().try_init().is_ok()
    }
}
