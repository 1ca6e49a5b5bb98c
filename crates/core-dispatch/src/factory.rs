//! Per-host helper cache with OS dispatch
//!
//! [`RemoteConnectionFactory`] hands out exactly one helper per host address.
//! The first fetch of an address probes the host through the [`Detector`],
//! picks the constructor for the detected [`OsVariant`] and caches the result.
//! Later fetches return the cached `Arc` until the address is invalidated.
//!
//! Locking is two-level. The address map (a `DashMap`) is only write-locked
//! to insert or remove entries. Each entry owns a build lock that serializes
//! probing and construction for that one address, so a slow host never holds
//! up fetches for other hosts.

use crate::capability::{Detector, HelperConstructors, RemoteHelper};
use crate::error::DispatchError;
use crate::os::OsVariant;
use crate::target::Target;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cache slot for a single address
struct CacheEntry<H: ?Sized> {
    address: String,
    /// Absent until the first successful construction
    helper: RwLock<Option<Arc<H>>>,
    /// Held while probing and constructing; true once the entry left the map
    build_lock: Mutex<bool>,
}

impl<H: RemoteHelper + ?Sized> CacheEntry<H> {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            helper: RwLock::new(None),
            build_lock: Mutex::new(false),
        }
    }

    fn current(&self) -> Option<Arc<H>> {
        self.helper.read().clone()
    }

    /// Take the helper out of the slot and close it
    ///
    /// With `retire` the entry is marked dead so a fetch still holding it
    /// starts over instead of building into it.
    fn release(&self, retire: bool) -> bool {
        let mut retired = self.build_lock.lock();
        if retire {
            *retired = true;
        }
        let taken = self.helper.write().take();
        match taken {
            Some(helper) => {
                helper.close();
                debug!(address = %self.address, variant = %helper.variant(), "Closed helper");
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    entries_created: AtomicU64,
    probes: AtomicU64,
    constructions: AtomicU64,
    failures: AtomicU64,
    invalidations: AtomicU64,
}

/// Snapshot of factory activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FactoryStats {
    /// Entries currently in the address map
    pub entries: usize,
    /// Entries currently holding a helper
    pub cached: usize,
    /// Entries ever inserted into the map
    pub entries_created: u64,
    /// Detector probes issued
    pub probes: u64,
    /// Helpers constructed
    pub constructions: u64,
    /// Fetches that failed during probing or construction
    pub failures: u64,
    /// Invalidations that found an entry
    pub invalidations: u64,
}

/// Lazily built, per-address cache of OS-specific helpers
///
/// Create one per test run, share it by reference (or behind an `Arc`) with
/// everything that needs remote execution, and call
/// [`shutdown`](Self::shutdown) at the end. Dropping the factory shuts it down
/// as well.
///
/// # Example
///
/// ```ignore
/// use nodeinfra_core_dispatch::{RemoteConnectionFactory, Target};
///
/// let factory = RemoteConnectionFactory::new(detector, constructors);
/// let target = Target::new("10.1.2.3", "root", "secret");
///
/// let helper = factory.fetch(&target)?;
/// println!("{} runs {}", helper.address(), helper.variant());
///
/// // Force a fresh OS probe on next use
/// factory.invalidate("10.1.2.3");
/// ```
pub struct RemoteConnectionFactory<D, C>
where
    D: Detector,
    C: HelperConstructors,
{
    entries: DashMap<String, Arc<CacheEntry<C::Helper>>>,
    detector: D,
    constructors: C,
    counters: Counters,
}

impl<D, C> RemoteConnectionFactory<D, C>
where
    D: Detector,
    C: HelperConstructors,
{
    /// Create an empty factory
    pub fn new(detector: D, constructors: C) -> Self {
        Self {
            entries: DashMap::new(),
            detector,
            constructors,
            counters: Counters::default(),
        }
    }

    /// Detector used for probing
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Constructors used to build helpers
    pub fn constructors(&self) -> &C {
        &self.constructors
    }

    /// Return the helper for `target.address`, building it on first use
    ///
    /// Concurrent first fetches of the same address probe and construct
    /// exactly once; every caller gets the same `Arc`.
    ///
    /// # Errors
    ///
    /// Returns the detector's or constructor's error unchanged. The address
    /// keeps an empty entry and the next fetch retries from scratch.
    pub fn fetch(&self, target: &Target) -> Result<Arc<C::Helper>, DispatchError> {
        if target.address.is_empty() {
            return Err(DispatchError::EmptyAddress);
        }

        loop {
            let entry = self.entry_for(&target.address);

            if let Some(helper) = entry.current() {
                debug!(address = %target.address, "Reusing cached helper");
                return Ok(helper);
            }

            let retired = entry.build_lock.lock();
            if *retired {
                // Invalidated while we waited; go again with a fresh entry
                continue;
            }

            // Another caller may have finished while we waited
            if let Some(helper) = entry.current() {
                debug!(address = %target.address, "Helper built by concurrent fetch");
                return Ok(helper);
            }

            let helper = self.build(target).inspect_err(|e| {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(address = %target.address, error = %e, "Failed to build helper");
            })?;

            *entry.helper.write() = Some(Arc::clone(&helper));
            return Ok(helper);
        }
    }

    /// Probe the host and run the matching constructor
    fn build(&self, target: &Target) -> Result<Arc<C::Helper>, DispatchError> {
        self.counters.probes.fetch_add(1, Ordering::Relaxed);
        let info = self.detector.probe(target)?;
        let variant = OsVariant::classify(&info);

        debug!(
            address = %target.address,
            family = %info.family,
            packaging = ?info.packaging,
            distribution = ?info.distribution,
            "Detected operating system"
        );

        self.counters.constructions.fetch_add(1, Ordering::Relaxed);
        let helper = self.constructors.construct(variant, target)?;

        info!(address = %target.address, variant = %variant, "Constructed remote helper");
        Ok(helper)
    }

    /// Existing entry for `address`, or a freshly inserted empty one
    fn entry_for(&self, address: &str) -> Arc<CacheEntry<C::Helper>> {
        let existing = self.entries.get(address).map(|e| Arc::clone(e.value()));
        if let Some(entry) = existing {
            return entry;
        }

        let inserted = self
            .entries
            .entry(address.to_string())
            .or_insert_with(|| {
                self.counters.entries_created.fetch_add(1, Ordering::Relaxed);
                debug!(address = %address, "Created cache entry");
                Arc::new(CacheEntry::new(address))
            });
        Arc::clone(inserted.value())
    }

    /// Close the helper for `address` and forget everything known about it
    ///
    /// Same as `invalidate_with(address, true)`.
    pub fn invalidate(&self, address: &str) {
        self.invalidate_with(address, true);
    }

    /// Close the helper for `address`
    ///
    /// With `fully_remove` the entry is dropped from the map and the
    /// detector's cached classification is discarded, so the next fetch
    /// re-probes the host. Without it the empty entry stays in place and the
    /// next fetch only rebuilds the helper.
    ///
    /// Unknown addresses are ignored.
    pub fn invalidate_with(&self, address: &str, fully_remove: bool) {
        let entry = if fully_remove {
            self.entries.remove(address).map(|(_, entry)| entry)
        } else {
            self.entries.get(address).map(|e| Arc::clone(e.value()))
        };

        let Some(entry) = entry else {
            debug!(address = %address, "Nothing cached, invalidate is a no-op");
            return;
        };

        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        let closed = entry.release(fully_remove);

        if fully_remove {
            self.detector.drop_cached_info(address);
        }

        info!(address = %address, closed, fully_remove, "Invalidated helper");
    }

    /// Close every helper and empty the cache
    pub fn shutdown(&self) {
        let addresses = self.addresses();
        if addresses.is_empty() {
            return;
        }

        info!(hosts = addresses.len(), "Shutting down remote helpers");
        for address in addresses {
            if let Some((_, entry)) = self.entries.remove(&address) {
                entry.release(true);
                self.detector.drop_cached_info(&address);
            }
        }
    }

    /// Check whether an entry exists for `address`, with or without a helper
    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    /// Check whether a helper is currently cached for `address`
    pub fn is_cached(&self, address: &str) -> bool {
        let entry = self.entries.get(address).map(|e| Arc::clone(e.value()));
        entry.map(|e| e.current().is_some()).unwrap_or(false)
    }

    /// Number of entries in the map
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Addresses with an entry, sorted
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        addresses.sort();
        addresses
    }

    /// Current statistics
    pub fn stats(&self) -> FactoryStats {
        let entries: Vec<Arc<CacheEntry<C::Helper>>> =
            self.entries.iter().map(|e| Arc::clone(e.value())).collect();
        let cached = entries.iter().filter(|e| e.current().is_some()).count();

        FactoryStats {
            entries: entries.len(),
            cached,
            entries_created: self.counters.entries_created.load(Ordering::Relaxed),
            probes: self.counters.probes.load(Ordering::Relaxed),
            constructions: self.counters.constructions.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl<D, C> Drop for RemoteConnectionFactory<D, C>
where
    D: Detector,
    C: HelperConstructors,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::OsInfo;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    struct TestHelper {
        address: String,
        variant: OsVariant,
        closed: AtomicBool,
    }

    impl RemoteHelper for TestHelper {
        fn address(&self) -> &str {
            &self.address
        }

        fn variant(&self) -> OsVariant {
            self.variant
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    struct TestDetector {
        info: OsInfo,
        probes: AtomicUsize,
        dropped: AtomicUsize,
    }

    impl Detector for TestDetector {
        fn probe(&self, _target: &Target) -> Result<OsInfo, DispatchError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(self.info.clone())
        }

        fn drop_cached_info(&self, _address: &str) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct TestConstructors;

    impl TestConstructors {
        fn make(&self, variant: OsVariant, target: &Target) -> Arc<TestHelper> {
            Arc::new(TestHelper {
                address: target.address.clone(),
                variant,
                closed: AtomicBool::new(false),
            })
        }
    }

    impl HelperConstructors for TestConstructors {
        type Helper = TestHelper;

        fn debian(&self, t: &Target) -> Result<Arc<TestHelper>, DispatchError> {
            Ok(self.make(OsVariant::Debian, t))
        }
        fn rpm(&self, t: &Target) -> Result<Arc<TestHelper>, DispatchError> {
            Ok(self.make(OsVariant::Rpm, t))
        }
        fn suse(&self, t: &Target) -> Result<Arc<TestHelper>, DispatchError> {
            Ok(self.make(OsVariant::Suse, t))
        }
        fn linux(&self, t: &Target) -> Result<Arc<TestHelper>, DispatchError> {
            Ok(self.make(OsVariant::GenericLinux, t))
        }
        fn mac(&self, t: &Target) -> Result<Arc<TestHelper>, DispatchError> {
            Ok(self.make(OsVariant::Mac, t))
        }
        fn windows(&self, t: &Target) -> Result<Arc<TestHelper>, DispatchError> {
            Ok(self.make(OsVariant::Windows, t))
        }
        fn fallback(&self, t: &Target) -> Result<Arc<TestHelper>, DispatchError> {
            Ok(self.make(OsVariant::Unknown, t))
        }
    }

    fn factory(info: OsInfo) -> RemoteConnectionFactory<TestDetector, TestConstructors> {
        RemoteConnectionFactory::new(
            TestDetector {
                info,
                probes: AtomicUsize::new(0),
                dropped: AtomicUsize::new(0),
            },
            TestConstructors,
        )
    }

    #[test]
    fn test_fetch_caches_helper() {
        let factory = factory(OsInfo::new("linux").with_packaging("deb"));
        let target = Target::new("10.0.0.1", "root", "pw");

        let first = factory.fetch(&target).unwrap();
        let second = factory.fetch(&target).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.variant(), OsVariant::Debian);
        assert_eq!(factory.detector().probes.load(Ordering::SeqCst), 1);
        assert!(factory.is_cached("10.0.0.1"));
    }

    #[test]
    fn test_empty_address_rejected() {
        let factory = factory(OsInfo::new("linux"));
        let result = factory.fetch(&Target::new("", "root", "pw"));
        assert!(matches!(result, Err(DispatchError::EmptyAddress)));
        assert!(factory.is_empty());
    }

    #[test]
    fn test_invalidate_closes_helper() {
        let factory = factory(OsInfo::new("mac"));
        let target = Target::new("10.0.0.2", "admin", "pw");

        let helper = factory.fetch(&target).unwrap();
        factory.invalidate("10.0.0.2");

        assert!(helper.is_closed());
        assert!(!factory.contains("10.0.0.2"));
        assert_eq!(factory.detector().dropped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_unknown_address_is_noop() {
        let factory = factory(OsInfo::new("linux"));
        factory.invalidate("10.9.9.9");
        factory.invalidate_with("10.9.9.9", false);

        let stats = factory.stats();
        assert_eq!(stats.invalidations, 0);
        assert_eq!(factory.detector().dropped.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let factory = factory(OsInfo::new("windows"));
        let a = factory.fetch(&Target::new("10.0.0.3", "u", "p")).unwrap();
        let b = factory.fetch(&Target::new("10.0.0.4", "u", "p")).unwrap();

        factory.shutdown();

        assert!(a.is_closed());
        assert!(b.is_closed());
        assert!(factory.is_empty());
        assert_eq!(factory.detector().dropped.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stats_snapshot() {
        let factory = factory(OsInfo::new("linux").with_packaging("rpm"));
        factory.fetch(&Target::new("10.0.0.5", "u", "p")).unwrap();
        factory.fetch(&Target::new("10.0.0.5", "u", "p")).unwrap();
        factory.fetch(&Target::new("10.0.0.6", "u", "p")).unwrap();

        let stats = factory.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.cached, 2);
        assert_eq!(stats.entries_created, 2);
        assert_eq!(stats.probes, 2);
        assert_eq!(stats.constructions, 2);
        assert_eq!(stats.failures, 0);
        assert_eq!(factory.addresses(), vec!["10.0.0.5", "10.0.0.6"]);
    }
}
