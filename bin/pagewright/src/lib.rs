//! pagewright CLI library
//!
//! Wiring for the `pagewright` binary: configuration loading, the process
//! compiler and bundler, and the watch loop.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations

pub mod cmd;

pub use pagewright_core::Config;
pub use pagewright_generator::{CycleOutcome, Driver, ExitRequest};

/// Initialize tracing with the specified verbosity level.
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE)
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
