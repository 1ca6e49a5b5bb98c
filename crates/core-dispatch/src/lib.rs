//! nodeinfra core dispatch: per-host remote helper cache
//!
//! # Overview
//!
//! Integration tests talk to many hosts running different operating systems.
//! This crate keeps one helper per host address, chosen by what the host
//! actually runs:
//!
//! - **Detector**: probes a host and reports its OS family, packaging family
//!   and distribution
//! - **OsVariant**: the closed set of helper flavours (Debian, RPM, SUSE,
//!   generic Linux, Mac, Windows, fallback)
//! - **HelperConstructors**: one constructor per variant
//! - **RemoteConnectionFactory**: the thread-safe cache tying them together
//!
//! # Key Principles
//!
//! The crate has no knowledge of SSH, shells or package managers. Those live
//! behind the traits in [`capability`] and are supplied by the caller.
//!
//! ```text
//!   fetch(target)
//!        │
//!        ▼
//!  ┌──────────────────┐  miss   ┌────────────┐  OsInfo  ┌──────────────┐
//!  │ address → entry  │───────▶│  Detector  │────────▶│  OsVariant   │
//!  │ (DashMap)        │        └────────────┘          │  ::classify  │
//!  └────────┬─────────┘                                └──────┬───────┘
//!           │ hit                                             │
//!           ▼                                                 ▼
//!     Arc<Helper>  ◀────────────────────────────  HelperConstructors
//! ```

pub mod capability;
pub mod error;
pub mod factory;
pub mod os;
pub mod target;

// Re-export main types for convenience
pub use capability::{Detector, HelperConstructors, RemoteHelper};
pub use error::DispatchError;
pub use factory::{FactoryStats, RemoteConnectionFactory};
pub use os::{OsInfo, OsVariant, PACKAGING_DEB, PACKAGING_RPM};
pub use target::Target;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use nodeinfra_core_dispatch::prelude::*;
/// ```
pub mod prelude {
    pub use super::capability::{Detector, HelperConstructors, RemoteHelper};
    pub use super::error::DispatchError;
    pub use super::factory::{FactoryStats, RemoteConnectionFactory};
    pub use super::os::{OsInfo, OsVariant};
    pub use super::target::Target;
}
