/*!
 * nodeinfra - test-input loading and remote helper dispatch
 *
 * Building blocks for cluster integration test runs:
 * - INI test-input loader with command-line parameter overrides
 * - Per-host remote helper cache with OS detection (see `nodeinfra-core-dispatch`)
 * - SSH-backed helpers for Debian, RPM, SUSE, generic Linux, macOS and Windows
 * - Supported-platform tables
 * - TOML harness configuration and structured logging
 */

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod remote;
pub mod testinput;

// Re-export commonly used types
pub use config::{HarnessConfig, LogLevel};
pub use error::{NodeInfraError, Result};
pub use remote::{new_factory, RemoteHelperFactory, ShellHelper};
pub use testinput::{ParamValue, TestInput, TestInputParser, TestInputServer};

pub use nodeinfra_core_dispatch::{DispatchError, OsVariant, RemoteHelper, Target};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
