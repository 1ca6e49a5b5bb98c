//! Collaborator traits consumed by the factory
//!
//! The factory knows nothing about SSH or shells. It asks a [`Detector`] what
//! a host runs and a [`HelperConstructors`] implementation to build the
//! matching [`RemoteHelper`].

use crate::error::DispatchError;
use crate::os::{OsInfo, OsVariant};
use crate::target::Target;
use std::sync::Arc;

/// Probes a host to find out what operating system it runs
pub trait Detector: Send + Sync {
    /// Classify the host behind `target`
    ///
    /// Implementations must release any transient connection before
    /// returning, on success and on failure.
    fn probe(&self, target: &Target) -> Result<OsInfo, DispatchError>;

    /// Forget any classification cached for `address`
    fn drop_cached_info(&self, address: &str);
}

/// A stateful command-execution handle bound to one host
pub trait RemoteHelper: Send + Sync {
    /// Address this helper talks to
    fn address(&self) -> &str;

    /// Variant this helper was built for
    fn variant(&self) -> OsVariant;

    /// Release the underlying connection resources
    ///
    /// Calling this on an already closed helper is a no-op.
    fn close(&self);

    /// Check whether [`close`](RemoteHelper::close) has been called
    fn is_closed(&self) -> bool;
}

/// One constructor per supported helper variant
///
/// `Helper` is usually a trait object such as `dyn ShellHelper`, letting each
/// constructor return its own concrete type behind a shared `Arc`.
pub trait HelperConstructors: Send + Sync {
    /// Handle type produced by every constructor
    type Helper: RemoteHelper + ?Sized;

    /// Linux host with Debian-style packaging
    fn debian(&self, target: &Target) -> Result<Arc<Self::Helper>, DispatchError>;

    /// Linux host with RPM packaging
    fn rpm(&self, target: &Target) -> Result<Arc<Self::Helper>, DispatchError>;

    /// Linux host with RPM packaging running SUSE
    fn suse(&self, target: &Target) -> Result<Arc<Self::Helper>, DispatchError>;

    /// Linux host with unrecognized packaging
    fn linux(&self, target: &Target) -> Result<Arc<Self::Helper>, DispatchError>;

    /// macOS host
    fn mac(&self, target: &Target) -> Result<Arc<Self::Helper>, DispatchError>;

    /// Windows host
    fn windows(&self, target: &Target) -> Result<Arc<Self::Helper>, DispatchError>;

    /// Any other host; must still provide the full helper surface
    fn fallback(&self, target: &Target) -> Result<Arc<Self::Helper>, DispatchError>;

    /// Build the helper for `variant`
    fn construct(
        &self,
        variant: OsVariant,
        target: &Target,
    ) -> Result<Arc<Self::Helper>, DispatchError> {
        match variant {
            OsVariant::Debian => self.debian(target),
            OsVariant::Rpm => self.rpm(target),
            OsVariant::Suse => self.suse(target),
            OsVariant::GenericLinux => self.linux(target),
            OsVariant::Mac => self.mac(target),
            OsVariant::Windows => self.windows(target),
            OsVariant::Unknown => self.fallback(target),
        }
    }
}
