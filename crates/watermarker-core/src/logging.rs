//! Logging configuration and initialization

use crate::config::LoggingConfig;
use crate::error::{Result, WatermarkError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging system
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr, plus the
/// configured file if any; keep the returned guard alive so buffered file
/// output is flushed on exit.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match &config.output_path {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().ok_or_else(|| WatermarkError::LoggingError {
                message: format!("Log path {:?} has no file name", path),
            })?;
            std::fs::create_dir_all(directory).map_err(|e| WatermarkError::LoggingError {
                message: format!("Failed to create log directory: {}", e),
            })?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        Ok(()) => Ok(guard),
        Err(e) => {
            let error_msg = e.to_string();
            if error_msg.contains("a global default trace dispatcher has already been set") {
                // already initialized
                Ok(guard)
            } else {
                Err(WatermarkError::LoggingError {
                    message: format!("Failed to initialize logging: {}", e),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_logging_init_twice() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_log_file_directory_created() {
        let temp_dir = tempdir().unwrap();
        let config = LoggingConfig {
            level: "debug".to_string(),
            output_path: Some(temp_dir.path().join("logs/watermarker.log")),
        };

        let _guard = init_logging(&config).unwrap();
        assert!(temp_dir.path().join("logs").is_dir());
    }
}
