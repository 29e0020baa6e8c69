//! Shared logging setup for binaries and integration tests.
use tracing::Level;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::FmtSubscriber;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    HumanReadable,
    Json,
}

/// Build the env filter used by the global logger.
///
/// `RUST_LOG` takes precedence over the default level.
pub fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

/// Configure the global logger.
///
/// Logs are written through the test writer so they're captured by the test
/// harness. Calling this more than once is a no-op, the first subscriber
/// wins.
pub fn configure_global_logger(default_level: Level, format: LogFormat) {
    let filter = env_filter(default_level);

    let result = match format {
        LogFormat::HumanReadable => {
            let subscriber = FmtSubscriber::builder()
                .with_test_writer()
                .with_env_filter(filter)
                .with_file(true)
                .with_line_number(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .with_test_writer()
                .with_env_filter(filter)
                .with_file(true)
                .with_line_number(true)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    };

    if result.is_err() {
        tracing::trace!("global logger already configured");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_twice() {
        configure_global_logger(Level::ERROR, LogFormat::HumanReadable);
        configure_global_logger(Level::ERROR, LogFormat::Json);
    }
}
