//! Utilities for logging.
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<u8> for Verbosity {
    fn from(value: u8) -> Self {
        match value {
            0 => Verbosity::Info,
            1 => Verbosity::Debug,
            _ => Verbosity::Trace,
        }
    }
}

impl From<Verbosity> for Level {
    fn from(value: Verbosity) -> Self {
        match value {
            Verbosity::Info => Level::INFO,
            Verbosity::Debug => Level::DEBUG,
            Verbosity::Trace => Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// Newline delimited json, one object per event.
    Json,
    /// Human readable, includes file and line numbers.
    #[default]
    Full,
    /// Human readable, single line per event.
    Compact,
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(Directive::from(level))
        .from_env_lossy()
}

/// Configure the global logger.
///
/// Returns false if a global subscriber was already installed.
pub fn configure_global_logger(verbosity: Verbosity, mode: LoggingMode) -> bool {
    let level: Level = verbosity.into();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_thread_ids(true);

    let result = match mode {
        LoggingMode::Json => builder
            .json()
            .with_current_span(false)
            .with_file(true)
            .with_line_number(true)
            .try_init(),
        LoggingMode::Full => builder.with_file(true).with_line_number(true).try_init(),
        LoggingMode::Compact => builder.compact().with_target(false).try_init(),
    };

    result.is_ok()
}

/// Install a subscriber writing to the test harness' captured output.
///
/// Safe to call from every test, only the first call installs the subscriber.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(Level::DEBUG))
        .with_test_writer()
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_from_count() {
        assert_eq!(Verbosity::Info, Verbosity::from(0));
        assert_eq!(Verbosity::Debug, Verbosity::from(1));
        assert_eq!(Verbosity::Trace, Verbosity::from(5));
        assert_eq!(Level::DEBUG, Level::from(Verbosity::Debug));
    }

    #[test]
    fn init_test_is_idempotent() {
        init_test();
        init_test();
        // Subscriber already installed.
        assert!(!configure_global_logger(Verbosity::Info, LoggingMode::Compact));
    }
}
