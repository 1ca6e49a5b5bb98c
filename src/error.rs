/*!
 * Error types for nodeinfra
 */

use nodeinfra_core_dispatch::DispatchError;
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, NodeInfraError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum NodeInfraError {
    /// I/O error
    Io(io::Error),

    /// Harness configuration error
    Config(String),

    /// Malformed INI input
    IniSyntax { line: usize, message: String },

    /// A section the input requires is absent
    MissingSection(String),

    /// A test parameter was requested but never set
    MissingParameter(String),

    /// A test parameter could not be interpreted
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    /// Probing, building or using a remote helper failed
    Remote(DispatchError),

    /// Some hosts failed during a fan-out operation
    PartialFailure { failed: usize, total: usize },

    /// Generic error with message
    Other(String),
}

impl NodeInfraError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            NodeInfraError::Io(_)
            | NodeInfraError::Config(_)
            | NodeInfraError::IniSyntax { .. }
            | NodeInfraError::MissingSection(_)
            | NodeInfraError::MissingParameter(_)
            | NodeInfraError::InvalidParameter { .. }
            | NodeInfraError::Other(_) => EXIT_FATAL,
            NodeInfraError::PartialFailure { .. } | NodeInfraError::Remote(_) => EXIT_PARTIAL,
        }
    }

    /// Check if this error comes from bad input rather than the environment
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            NodeInfraError::IniSyntax { .. }
                | NodeInfraError::MissingSection(_)
                | NodeInfraError::MissingParameter(_)
                | NodeInfraError::InvalidParameter { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            NodeInfraError::Io(_) => ErrorCategory::IoError,
            NodeInfraError::Config(_) => ErrorCategory::Configuration,
            NodeInfraError::IniSyntax { .. }
            | NodeInfraError::MissingSection(_)
            | NodeInfraError::MissingParameter(_)
            | NodeInfraError::InvalidParameter { .. } => ErrorCategory::Input,
            NodeInfraError::Remote(e) if e.is_auth_error() => ErrorCategory::Security,
            NodeInfraError::Remote(_) => ErrorCategory::Network,
            NodeInfraError::PartialFailure { .. } => ErrorCategory::Partial,
            NodeInfraError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// I/O operation errors
    IoError,
    /// Harness configuration errors
    Configuration,
    /// Test input (INI / parameter) errors
    Input,
    /// Network and remote execution errors
    Network,
    /// Authentication errors
    Security,
    /// Partial fan-out failures
    Partial,
    /// Uncategorized errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Security => write!(f, "security"),
            ErrorCategory::Partial => write!(f, "partial"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for NodeInfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeInfraError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            NodeInfraError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            NodeInfraError::IniSyntax { line, message } => {
                write!(f, "INI syntax error on line {}: {}", line, message)
            }
            NodeInfraError::MissingSection(section) => {
                write!(f, "Ini file needs '{}' section", section)
            }
            NodeInfraError::MissingParameter(name) => {
                write!(f, "Parameter '{}' must be set in the test configuration", name)
            }
            NodeInfraError::InvalidParameter {
                name,
                value,
                reason,
            } => {
                write!(f, "Invalid value '{}' for parameter '{}': {}", value, name, reason)
            }
            NodeInfraError::Remote(err) => {
                write!(f, "Remote error: {}", err)
            }
            NodeInfraError::PartialFailure { failed, total } => {
                write!(f, "{} of {} hosts failed", failed, total)
            }
            NodeInfraError::Other(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl std::error::Error for NodeInfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NodeInfraError::Io(err) => Some(err),
            NodeInfraError::Remote(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for NodeInfraError {
    fn from(err: io::Error) -> Self {
        NodeInfraError::Io(err)
    }
}

impl From<DispatchError> for NodeInfraError {
    fn from(err: DispatchError) -> Self {
        NodeInfraError::Remote(err)
    }
}

impl From<toml::de::Error> for NodeInfraError {
    fn from(err: toml::de::Error) -> Self {
        NodeInfraError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<serde_json::Error> for NodeInfraError {
    fn from(err: serde_json::Error) -> Self {
        NodeInfraError::Other(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert_eq!(
            NodeInfraError::Config("bad".to_string()).exit_code(),
            EXIT_FATAL
        );
        assert_eq!(
            NodeInfraError::MissingSection("membase".to_string()).exit_code(),
            EXIT_FATAL
        );
    }

    #[test]
    fn test_partial_errors() {
        let err = NodeInfraError::PartialFailure {
            failed: 1,
            total: 3,
        };
        assert_eq!(err.exit_code(), EXIT_PARTIAL);
        assert_eq!(err.to_string(), "1 of 3 hosts failed");
    }

    #[test]
    fn test_missing_parameter_display() {
        let err = NodeInfraError::MissingParameter("num_items".to_string());
        assert_eq!(
            err.to_string(),
            "Parameter 'num_items' must be set in the test configuration"
        );
        assert!(err.is_input_error());
        assert_eq!(err.category(), ErrorCategory::Input);
    }

    #[test]
    fn test_remote_error_category() {
        let auth = NodeInfraError::from(DispatchError::AuthenticationFailed {
            address: "10.0.0.1".to_string(),
            reason: "denied".to_string(),
        });
        assert_eq!(auth.category(), ErrorCategory::Security);

        let net = NodeInfraError::from(DispatchError::Unreachable {
            address: "10.0.0.1".to_string(),
            reason: "timeout".to_string(),
        });
        assert_eq!(net.category(), ErrorCategory::Network);
        assert!(std::error::Error::source(&net).is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: NodeInfraError = io::Error::other("disk gone").into();
        assert_eq!(err.category(), ErrorCategory::IoError);
        assert_eq!(err.to_string(), "I/O error: disk gone");
        assert_eq!(err.exit_code(), EXIT_FATAL);
    }
}
