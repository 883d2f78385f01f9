use crate::error::ConfigError;
use crate::settings::LoggingSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Driver crates are chatty at `info` (one line per TLS handshake, per prepared statement).
const QUIET_DEPENDENCIES: &str = "tiberius=warn,sqlx=warn";

/// Installs the global `tracing` subscriber.
///
/// Console output goes to stderr so report tables on stdout stay clean, and
/// through the indicatif layer so lines print above any active progress bar. When
/// `settings.directory` is set, a second, ANSI-free layer writes to a
/// daily-rolling file through a non-blocking writer. The returned guard must be
/// held until the process exits, otherwise buffered file lines are lost.
pub fn init_tracing(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("{},{QUIET_DEPENDENCIES}", settings.level))
            .map_err(|e| ConfigError::LoggingError(e.to_string()))?,
    };

    let progress_layer = IndicatifLayer::new();
    let console_layer = fmt::layer()
        .with_writer(progress_layer.get_stderr_writer())
        .with_timer(LocalTime::rfc_3339())
        .with_target(false);

    let (file_layer, guard) = match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .with(progress_layer)
        .try_init()
        .map_err(|e| ConfigError::LoggingError(e.to_string()))?;

    Ok(guard)
}
