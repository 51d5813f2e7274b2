//! Logging setup for the `ipass` binary and library consumers.
//!
//! The library only emits `tracing` events; nothing is printed unless a
//! subscriber is installed, e.g. with [`init_logging`].

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to a tracing level.
    #[must_use]
    pub fn to_level_filter(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Install a stderr subscriber filtered by `verbosity`.
///
/// `RUST_LOG`, when set, replaces the verbosity-derived filter. Calling this
/// more than once is harmless.
///
/// # Examples
///
/// ```no_run
/// use implantpass::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    // Diagnostics go to stderr; stdout carries command output.
    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity >= Verbosity::Verbose)
            .with_file(false)
            .with_line_number(false),
    );

    // Already installed by an earlier call or by the embedding application.
    let _ = subscriber.try_init();
}

/// The filter used when `RUST_LOG` is unset.
#[must_use]
pub fn default_filter(verbosity: Verbosity) -> String {
    format!("implantpass={}", verbosity.to_level_filter())
}

/// Warn-level logging captured by the test harness.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
