/*!
 * SSH-backed remote access
 *
 * Concrete [`Detector`](nodeinfra_core_dispatch::Detector) and
 * [`HelperConstructors`](nodeinfra_core_dispatch::HelperConstructors)
 * implementations for the helper cache in `nodeinfra-core-dispatch`.
 */

pub mod detector;
pub mod helpers;
pub mod session;

pub use detector::SshDetector;
pub use helpers::{PlatformHelper, ServiceAction, ShellHelper, SshHelperConstructors};
pub use session::{CommandOutput, SessionConfig, ShellSession, SshAuth};

use crate::config::HarnessConfig;
use crate::error::{NodeInfraError, Result};
use nodeinfra_core_dispatch::RemoteConnectionFactory;
use rayon::prelude::*;

/// Helper cache wired to SSH detection and SSH helpers
pub type RemoteHelperFactory = RemoteConnectionFactory<SshDetector, SshHelperConstructors>;

/// Create a helper cache for one test run
pub fn new_factory(config: &HarnessConfig) -> RemoteHelperFactory {
    RemoteConnectionFactory::new(
        SshDetector::new(config.clone()),
        SshHelperConstructors::new(config.clone()),
    )
}

/// Run `task` for every item on a pool of `workers` threads
///
/// Results come back in input order.
pub fn fan_out<S, T, F>(items: &[S], workers: usize, task: F) -> Result<Vec<T>>
where
    S: Sync,
    T: Send,
    F: Fn(&S) -> T + Sync + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.min(items.len().max(1)).max(1))
        .thread_name(|i| format!("nodeinfra-worker-{}", i))
        .build()
        .map_err(|e| NodeInfraError::Other(format!("Failed to create thread pool: {}", e)))?;

    Ok(pool.install(|| items.par_iter().map(&task).collect()))
}
