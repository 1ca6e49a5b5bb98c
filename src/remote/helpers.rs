//! OS-specific remote helpers
//!
//! Every variant is a [`PlatformHelper`] parameterised by a platform marker
//! that supplies the shell commands for that OS. The SSH session is opened on
//! the first command and kept until [`RemoteHelper::close`].

use nodeinfra_core_dispatch::{DispatchError, HelperConstructors, OsVariant, RemoteHelper, Target};
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::session::{CommandOutput, SessionConfig, ShellSession};
use crate::config::HarnessConfig;

/// Service control action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Status,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Status => "status",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command surface shared by every helper variant
///
/// Operations a platform has no command for return `Ok(None)`.
pub trait ShellHelper: RemoteHelper {
    /// Run an arbitrary shell command
    fn run(&self, command: &str) -> Result<CommandOutput, DispatchError>;

    fn install_package(&self, package: &str) -> Result<Option<CommandOutput>, DispatchError>;

    fn remove_package(&self, package: &str) -> Result<Option<CommandOutput>, DispatchError>;

    fn is_package_installed(&self, package: &str) -> Result<Option<bool>, DispatchError>;

    fn service(
        &self,
        name: &str,
        action: ServiceAction,
    ) -> Result<Option<CommandOutput>, DispatchError>;

    fn kill_process(&self, name: &str) -> Result<Option<CommandOutput>, DispatchError>;
}

/// Shell commands for one platform
pub trait Platform: Send + Sync + 'static {
    const VARIANT: OsVariant;

    fn install_command(_package: &str) -> Option<String> {
        None
    }

    fn remove_command(_package: &str) -> Option<String> {
        None
    }

    /// Command that exits 0 only when the package is installed
    fn query_command(_package: &str) -> Option<String> {
        None
    }

    fn service_command(name: &str, action: ServiceAction) -> Option<String> {
        Some(format!("systemctl {} {}", action, quote(name)))
    }

    fn kill_command(name: &str) -> Option<String> {
        Some(format!("pkill -9 -x {}", quote(name)))
    }
}

/// Debian and Ubuntu
pub struct Debian;
/// RHEL, CentOS, Amazon Linux and friends
pub struct Rpm;
/// SLES and openSUSE
pub struct Suse;
pub struct GenericLinux;
pub struct Mac;
pub struct Windows;
/// Anything unrecognised
pub struct Fallback;

impl Platform for Debian {
    const VARIANT: OsVariant = OsVariant::Debian;

    fn install_command(package: &str) -> Option<String> {
        Some(format!(
            "DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
            quote(package)
        ))
    }

    fn remove_command(package: &str) -> Option<String> {
        Some(format!(
            "DEBIAN_FRONTEND=noninteractive apt-get remove -y {}",
            quote(package)
        ))
    }

    fn query_command(package: &str) -> Option<String> {
        Some(format!("dpkg -s {}", quote(package)))
    }
}

impl Platform for Rpm {
    const VARIANT: OsVariant = OsVariant::Rpm;

    fn install_command(package: &str) -> Option<String> {
        Some(format!("yum install -y {}", quote(package)))
    }

    fn remove_command(package: &str) -> Option<String> {
        Some(format!("yum remove -y {}", quote(package)))
    }

    fn query_command(package: &str) -> Option<String> {
        Some(format!("rpm -q {}", quote(package)))
    }
}

impl Platform for Suse {
    const VARIANT: OsVariant = OsVariant::Suse;

    fn install_command(package: &str) -> Option<String> {
        Some(format!("zypper --non-interactive install {}", quote(package)))
    }

    fn remove_command(package: &str) -> Option<String> {
        Some(format!("zypper --non-interactive remove {}", quote(package)))
    }

    fn query_command(package: &str) -> Option<String> {
        Some(format!("rpm -q {}", quote(package)))
    }
}

impl Platform for GenericLinux {
    const VARIANT: OsVariant = OsVariant::GenericLinux;
}

impl Platform for Mac {
    const VARIANT: OsVariant = OsVariant::Mac;

    fn install_command(package: &str) -> Option<String> {
        Some(format!("brew install {}", quote(package)))
    }

    fn remove_command(package: &str) -> Option<String> {
        Some(format!("brew uninstall {}", quote(package)))
    }

    fn query_command(package: &str) -> Option<String> {
        Some(format!("brew list {}", quote(package)))
    }

    fn service_command(name: &str, action: ServiceAction) -> Option<String> {
        let verb = match action {
            ServiceAction::Status => "info",
            other => other.as_str(),
        };
        Some(format!("brew services {} {}", verb, quote(name)))
    }
}

impl Platform for Windows {
    const VARIANT: OsVariant = OsVariant::Windows;

    fn service_command(name: &str, action: ServiceAction) -> Option<String> {
        let name = quote_windows(name);
        Some(match action {
            ServiceAction::Start => format!("sc start {}", name),
            ServiceAction::Stop => format!("sc stop {}", name),
            ServiceAction::Restart => format!("sc stop {0} & sc start {0}", name),
            ServiceAction::Status => format!("sc query {}", name),
        })
    }

    fn kill_command(name: &str) -> Option<String> {
        Some(format!("taskkill /F /T /IM {}", quote_windows(name)))
    }
}

impl Platform for Fallback {
    const VARIANT: OsVariant = OsVariant::Unknown;

    fn service_command(_name: &str, _action: ServiceAction) -> Option<String> {
        None
    }

    fn kill_command(_name: &str) -> Option<String> {
        None
    }
}

/// Single-quote for POSIX shells
fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn quote_windows(arg: &str) -> String {
    format!("\"{}\"", arg.replace('"', ""))
}

/// Remote helper for platform `P`
pub struct PlatformHelper<P: Platform> {
    address: String,
    session_config: SessionConfig,
    session: Mutex<Option<ShellSession>>,
    closed: AtomicBool,
    _platform: PhantomData<P>,
}

impl<P: Platform> PlatformHelper<P> {
    /// Create a helper; no connection is made until the first command
    pub fn new(target: &Target, config: &HarnessConfig) -> Self {
        Self {
            address: target.address.clone(),
            session_config: SessionConfig::for_target(target, config),
            session: Mutex::new(None),
            closed: AtomicBool::new(false),
            _platform: PhantomData,
        }
    }

    /// Check whether a session is currently open
    pub fn is_connected(&self) -> bool {
        self.session.lock().is_some()
    }

    fn exec(&self, command: &str) -> Result<CommandOutput, DispatchError> {
        // `close` flips the flag before taking this lock, so checking under
        // the lock keeps a closed helper from reconnecting
        let mut slot = self.session.lock();
        if self.is_closed() {
            return Err(DispatchError::Transport {
                address: self.address.clone(),
                reason: "helper is closed".to_string(),
            });
        }
        if slot.is_none() {
            *slot = Some(ShellSession::connect(&self.session_config)?);
        }
        let session = slot.as_ref().ok_or_else(|| DispatchError::Transport {
            address: self.address.clone(),
            reason: "session unavailable".to_string(),
        })?;

        let result = session.exec(command);
        if matches!(result, Err(DispatchError::Transport { .. })) {
            // Reconnect on next use
            *slot = None;
        }
        result
    }

    fn exec_optional(
        &self,
        command: Option<String>,
    ) -> Result<Option<CommandOutput>, DispatchError> {
        match command {
            Some(cmd) => self.exec(&cmd).map(Some),
            None => {
                debug!(
                    address = %self.address,
                    variant = %P::VARIANT,
                    "No command for this platform"
                );
                Ok(None)
            }
        }
    }
}

impl<P: Platform> RemoteHelper for PlatformHelper<P> {
    fn address(&self) -> &str {
        &self.address
    }

    fn variant(&self) -> OsVariant {
        P::VARIANT
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.session.lock().take();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<P: Platform> ShellHelper for PlatformHelper<P> {
    fn run(&self, command: &str) -> Result<CommandOutput, DispatchError> {
        self.exec(command)
    }

    fn install_package(&self, package: &str) -> Result<Option<CommandOutput>, DispatchError> {
        self.exec_optional(P::install_command(package))
    }

    fn remove_package(&self, package: &str) -> Result<Option<CommandOutput>, DispatchError> {
        self.exec_optional(P::remove_command(package))
    }

    fn is_package_installed(&self, package: &str) -> Result<Option<bool>, DispatchError> {
        Ok(self
            .exec_optional(P::query_command(package))?
            .map(|out| out.success()))
    }

    fn service(
        &self,
        name: &str,
        action: ServiceAction,
    ) -> Result<Option<CommandOutput>, DispatchError> {
        self.exec_optional(P::service_command(name, action))
    }

    fn kill_process(&self, name: &str) -> Result<Option<CommandOutput>, DispatchError> {
        self.exec_optional(P::kill_command(name))
    }
}

/// Builds SSH-backed helpers for every variant
pub struct SshHelperConstructors {
    config: HarnessConfig,
}

impl SshHelperConstructors {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    fn build<P: Platform>(&self, target: &Target) -> Result<Arc<dyn ShellHelper>, DispatchError> {
        info!(address = %target.address, variant = %P::VARIANT, "Creating remote helper");
        Ok(Arc::new(PlatformHelper::<P>::new(target, &self.config)))
    }
}

impl HelperConstructors for SshHelperConstructors {
    type Helper = dyn ShellHelper;

    fn debian(&self, target: &Target) -> Result<Arc<dyn ShellHelper>, DispatchError> {
        self.build::<Debian>(target)
    }

    fn rpm(&self, target: &Target) -> Result<Arc<dyn ShellHelper>, DispatchError> {
        self.build::<Rpm>(target)
    }

    fn suse(&self, target: &Target) -> Result<Arc<dyn ShellHelper>, DispatchError> {
        self.build::<Suse>(target)
    }

    fn linux(&self, target: &Target) -> Result<Arc<dyn ShellHelper>, DispatchError> {
        self.build::<GenericLinux>(target)
    }

    fn mac(&self, target: &Target) -> Result<Arc<dyn ShellHelper>, DispatchError> {
        self.build::<Mac>(target)
    }

    fn windows(&self, target: &Target) -> Result<Arc<dyn ShellHelper>, DispatchError> {
        self.build::<Windows>(target)
    }

    fn fallback(&self, target: &Target) -> Result<Arc<dyn ShellHelper>, DispatchError> {
        self.build::<Fallback>(target)
    }
}
