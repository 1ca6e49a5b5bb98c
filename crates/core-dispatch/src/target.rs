//! Host address plus the credentials used to reach it

use secrecy::{ExposeSecret, SecretString};

/// A host to probe and build a helper for
///
/// The password is held as a [`SecretString`] so it never shows up in
/// `Debug` output or tracing fields.
#[derive(Debug, Clone)]
pub struct Target {
    /// IP address or hostname; the cache key
    pub address: String,

    /// SSH username
    pub username: String,

    /// SSH password (may be empty when key or agent auth is used)
    pub password: SecretString,
}

impl Target {
    /// Create a new target
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Check whether a password was supplied
    pub fn has_password(&self) -> bool {
        !self.password.expose_secret().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let target = Target::new("10.0.0.1", "root", "hunter2");
        let rendered = format!("{:?}", target);
        assert!(rendered.contains("10.0.0.1"));
        assert!(!rendered.contains("hunter2"));
        assert!(target.has_password());
    }

    #[test]
    fn test_empty_password() {
        let target = Target::new("10.0.0.1", "root", "");
        assert!(!target.has_password());
    }
}
