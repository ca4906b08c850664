// SPDX-License-Identifier: GPL-3.0-only

//! Log subscriber setup shared by the CLI and the C entry points

use crate::config::{Config, ConfigError};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over the configured filter. Calling this more than once,
/// or after the host installed its own subscriber, is harmless.
pub fn init(config: &Config) {
    // Examples: RUST_LOG=debug, RUST_LOG=becam=debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .try_init();
}

/// Install the subscriber from a configuration load result, then report a
/// load failure through it. Returns the configuration to run with.
pub fn init_from(loaded: Result<Config, ConfigError>) -> Config {
    let (config, failure) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init(&config);
    if let Some(e) = failure {
        warn!(error = %e, "Using default configuration");
    }
    config
}
