//! Logging setup for the command line front-end.
//!
//! The filter comes from `TIAO_LOG` when set, otherwise from the configured
//! level. Logs go to stderr unless a file is configured, in which case they
//! are written through a non-blocking appender.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

const LOG_ENV: &str = "TIAO_LOG";

fn filter(config: &LoggingConfig) -> Result<EnvFilter> {
  match EnvFilter::try_from_env(LOG_ENV) {
    Ok(filter) => Ok(filter),
    Err(_) => EnvFilter::try_new(&config.level)
      .map_err(|e| eyre!("Invalid log level '{}': {}", config.level, e)),
  }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop, so keep it alive for
/// the whole run.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
  let filter = filter(config)?;

  match &config.file {
    Some(path) => {
      let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;

      let appender = tracing_appender::rolling::never(directory, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);

      tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

      Ok(None)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_invalid_level_is_rejected() {
    if std::env::var_os(LOG_ENV).is_some() {
      return;
    }
    let config = LoggingConfig {
      level: "tiao=loudest".to_string(),
      file: None,
    };
    assert!(filter(&config).is_err());
  }

  #[test]
  fn test_configured_level_is_used() {
    if std::env::var_os(LOG_ENV).is_some() {
      return;
    }
    let config = LoggingConfig {
      level: "tiao=debug".to_string(),
      file: None,
    };
    let filter = filter(&config).unwrap();
    assert_eq!(filter.to_string(), "tiao=debug");
  }
}
