//! Error types for the dispatch crate

use crate::os::OsVariant;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Host address must not be empty")]
    EmptyAddress,

    #[error("Host {address} is unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("Authentication to {address} failed: {reason}")]
    AuthenticationFailed { address: String, reason: String },

    #[error("Transport error talking to {address}: {reason}")]
    Transport { address: String, reason: String },

    #[error("Could not detect operating system of {address}: {reason}")]
    Detection { address: String, reason: String },

    #[error("Failed to construct {variant} helper for {address}: {reason}")]
    Construction {
        address: String,
        variant: OsVariant,
        reason: String,
    },
}

impl DispatchError {
    /// Host address this error refers to, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            DispatchError::EmptyAddress => None,
            DispatchError::Unreachable { address, .. }
            | DispatchError::AuthenticationFailed { address, .. }
            | DispatchError::Transport { address, .. }
            | DispatchError::Detection { address, .. }
            | DispatchError::Construction { address, .. } => Some(address),
        }
    }

    /// Check if a later attempt against the same host may succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            DispatchError::Unreachable { .. } => true,
            DispatchError::Transport { .. } => true,

            DispatchError::EmptyAddress => false,
            DispatchError::AuthenticationFailed { .. } => false,
            DispatchError::Detection { .. } => false,
            DispatchError::Construction { .. } => false,
        }
    }

    /// Check if this error is related to authentication
    pub fn is_auth_error(&self) -> bool {
        matches!(self, DispatchError::AuthenticationFailed { .. })
    }
}
