#![forbid(unsafe_code)]

//! Logging setup.
//!
//! The store emits `tracing` events unconditionally; nothing is printed
//! unless the host installs a subscriber. Native binaries and tests can use
//! [`init_logging`] (feature `tracing-fmt`); browser hosts install their own
//! console subscriber.
//!
//! The filter is read from `SPRIG_LOG` using `EnvFilter` syntax and falls
//! back to `info`.

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "SPRIG_LOG";

/// Output format for [`init_logging`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, one line per event.
    #[default]
    Compact,
    /// One JSON object per line (feature `tracing-json`).
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Install a global `fmt` subscriber.
///
/// Returns `false` if a global subscriber was already installed, which is
/// the common case when several tests race to initialize logging.
#[cfg(feature = "tracing-fmt")]
pub fn init_logging(format: LogFormat) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Compact => builder.compact().try_init().is_ok(),
        #[cfg(feature = "tracing-json")]
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

#[cfg(all(test, feature = "tracing-fmt"))]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_existing_subscriber() {
        let _ = init_logging(LogFormat::Compact);
        assert!(!init_logging(LogFormat::Compact));
    }
}
