/*!
 * Configuration types for nodeinfra
 */

use crate::error::{NodeInfraError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Harness-wide settings for remote access and logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// SSH port used to reach every host
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// Connect and read timeout for SSH sessions, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Private key used when a host has no password
    #[serde(default)]
    pub ssh_key: Option<PathBuf>,

    /// Worker threads for per-host fan-out (0 = one per host)
    #[serde(default)]
    pub probe_workers: usize,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            ssh_port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
            ssh_key: None,
            probe_workers: 0,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    30
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NodeInfraError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: HarnessConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| NodeInfraError::Config(format!("TOML encode error: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.ssh_port == 0 {
            return Err(NodeInfraError::Config("ssh_port must not be 0".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(NodeInfraError::Config(
                "connect_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Number of worker threads to use for `hosts` hosts
    pub fn workers_for(&self, hosts: usize) -> usize {
        match self.probe_workers {
            0 => hosts.max(1),
            n => n.min(hosts.max(1)),
        }
    }
}
