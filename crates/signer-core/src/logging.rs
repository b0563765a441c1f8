//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; applications (and tests) pick
//! a subscriber with one of the initialisers below. Each returns an error
//! instead of panicking when a global subscriber is already installed.
//!
//! Private keys and mnemonics are never passed to `tracing`.

use std::error::Error as StdError;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Error returned when a subscriber cannot be installed.
pub type InitError = Box<dyn StdError + Send + Sync>;

/// Installs a JSON subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_tracing() -> Result<(), InitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).json())
        .try_init()?;
    Ok(())
}

/// Installs a JSON subscriber with an explicit filter directive such as
/// `"debug"` or `"wallet_signer_core=trace"`.
///
/// # Errors
///
/// Fails if the directive does not parse or a global subscriber is already
/// set.
pub fn init_tracing_with_level(level: &str) -> Result<(), InitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(level)?)
        .with(fmt::layer().with_target(true).json())
        .try_init()?;
    Ok(())
}

/// Installs a human-readable `debug` subscriber that writes through the
/// test harness, so output is captured per test.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_tracing_test() -> Result<(), InitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init()?;
    Ok(())
}
