/*!
 * Tracing setup for the CLI and test runs
 *
 * Diagnostics go to stderr in compact form so stdout stays clean for
 * `show` / `probe` / `exec` output. With `log_file` set they are written
 * as JSON lines instead, one object per event, including span close events
 * so per-host timings can be recovered.
 */

use std::fs::OpenOptions;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::HarnessConfig;
use crate::error::{NodeInfraError, Result};

/// Crates whose events are shown by default
const LOG_TARGETS: &[&str] = &["nodeinfra", "nodeinfra_core_dispatch"];

/// Level a configuration asks for; `verbose` forces debug
pub fn effective_level(config: &HarnessConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

fn filter_directive(level: Level) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// `RUST_LOG` when set, otherwise our crates at `level`
fn build_filter(level: Level) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(level)))
        .map_err(|e| NodeInfraError::Config(format!("Invalid log filter: {}", e)))
}

/// Install the global subscriber
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init_logging(config: &HarnessConfig) -> Result<()> {
    let filter = build_filter(effective_level(config))?;

    let installed = match &config.log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_thread_names(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .try_init()
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| NodeInfraError::Config(format!("Logging already initialised: {}", e)))
}

/// Append so consecutive runs share one log
fn open_log_file(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            NodeInfraError::Config(format!("Cannot open log file {}: {}", path.display(), e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use tempfile::TempDir;

    #[test]
    fn test_verbose_overrides_log_level() {
        let config = HarnessConfig {
            log_level: LogLevel::Error,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_configured_level_used() {
        let config = HarnessConfig {
            log_level: LogLevel::Warn,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::WARN);
    }

    #[test]
    fn test_filter_directive_covers_both_crates() {
        let directive = filter_directive(Level::INFO);
        assert_eq!(directive, "nodeinfra=INFO,nodeinfra_core_dispatch=INFO");
        assert!(EnvFilter::try_new(directive).is_ok());
    }

    #[test]
    fn test_log_file_is_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "previous\n").unwrap();

        open_log_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous\n");
    }

    #[test]
    fn test_log_file_in_missing_dir_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = open_log_file(&dir.path().join("no/such/dir/run.log")).unwrap_err();
        assert!(matches!(err, NodeInfraError::Config(_)));
    }
}
