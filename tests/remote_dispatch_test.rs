/*!
 * Integration tests for SSH helper dispatch
 *
 * A scripted detector stands in for SSH probing; helpers are the real SSH
 * helpers, which never connect until a command is run.
 */

use std::collections::HashMap;
use std::sync::Arc;

use nodeinfra::config::HarnessConfig;
use nodeinfra::remote::{ServiceAction, SshHelperConstructors};
use nodeinfra::testinput::TestInputParser;
use nodeinfra_core_dispatch::{
    Detector, DispatchError, OsInfo, OsVariant, RemoteConnectionFactory, Target,
};
use parking_lot::Mutex;

struct ScriptedDetector {
    hosts: HashMap<String, OsInfo>,
    dropped: Mutex<Vec<String>>,
}

impl ScriptedDetector {
    fn new(hosts: &[(&str, OsInfo)]) -> Self {
        Self {
            hosts: hosts
                .iter()
                .map(|(addr, info)| (addr.to_string(), info.clone()))
                .collect(),
            dropped: Mutex::new(Vec::new()),
        }
    }
}

impl Detector for ScriptedDetector {
    fn probe(&self, target: &Target) -> Result<OsInfo, DispatchError> {
        self.hosts
            .get(&target.address)
            .cloned()
            .ok_or_else(|| DispatchError::Unreachable {
                address: target.address.clone(),
                reason: "no route to host".to_string(),
            })
    }

    fn drop_cached_info(&self, address: &str) {
        self.dropped.lock().push(address.to_string());
    }
}

fn lab() -> Vec<(&'static str, OsInfo)> {
    vec![
        (
            "10.0.0.1",
            OsInfo::new("linux")
                .with_packaging("deb")
                .with_distribution("Ubuntu 22.04.3 LTS"),
        ),
        (
            "10.0.0.2",
            OsInfo::new("Linux")
                .with_packaging("RPM")
                .with_distribution("CentOS Linux 7 (Core)"),
        ),
        (
            "10.0.0.3",
            OsInfo::new("linux")
                .with_packaging("rpm")
                .with_distribution("SUSE Linux Enterprise Server 15 SP4"),
        ),
        ("10.0.0.4", OsInfo::new("linux")),
        ("10.0.0.5", OsInfo::new("mac").with_distribution("macOS 12.3")),
        ("10.0.0.6", OsInfo::new("windows")),
        ("10.0.0.7", OsInfo::new("freebsd")),
    ]
}

fn factory() -> RemoteConnectionFactory<ScriptedDetector, SshHelperConstructors> {
    RemoteConnectionFactory::new(
        ScriptedDetector::new(&lab()),
        SshHelperConstructors::new(HarnessConfig::default()),
    )
}

#[test]
fn test_dispatch_for_every_platform() {
    let factory = factory();
    let expected = [
        ("10.0.0.1", OsVariant::Debian),
        ("10.0.0.2", OsVariant::Rpm),
        ("10.0.0.3", OsVariant::Suse),
        ("10.0.0.4", OsVariant::GenericLinux),
        ("10.0.0.5", OsVariant::Mac),
        ("10.0.0.6", OsVariant::Windows),
        ("10.0.0.7", OsVariant::Unknown),
    ];

    for (address, variant) in expected {
        let helper = factory
            .fetch(&Target::new(address, "root", "pw"))
            .unwrap();
        assert_eq!(helper.variant(), variant, "wrong helper for {}", address);
        assert_eq!(helper.address(), address);
    }
    assert_eq!(factory.len(), 7);
    assert_eq!(factory.stats().constructions, 7);
}

#[test]
fn test_fetch_returns_cached_helper() {
    let factory = factory();
    let target = Target::new("10.0.0.1", "root", "pw");

    let first = factory.fetch(&target).unwrap();
    let second = factory.fetch(&target).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.stats().probes, 1);
}

#[test]
fn test_fallback_helper_is_best_effort() {
    let factory = factory();
    let helper = factory
        .fetch(&Target::new("10.0.0.7", "root", "pw"))
        .unwrap();

    assert_eq!(helper.install_package("curl").unwrap(), None);
    assert_eq!(
        helper.service("couchbase-server", ServiceAction::Restart).unwrap(),
        None
    );
    assert_eq!(helper.kill_process("beam.smp").unwrap(), None);
}

#[test]
fn test_invalidate_closes_helper_and_drops_detection() {
    let factory = factory();
    let target = Target::new("10.0.0.2", "root", "pw");
    let helper = factory.fetch(&target).unwrap();

    factory.invalidate("10.0.0.2");
    assert!(helper.is_closed());
    assert!(matches!(
        helper.run("uptime"),
        Err(DispatchError::Transport { .. })
    ));
    assert!(!factory.contains("10.0.0.2"));
    assert_eq!(*factory.detector().dropped.lock(), vec!["10.0.0.2".to_string()]);

    let fresh = factory.fetch(&target).unwrap();
    assert!(!Arc::ptr_eq(&helper, &fresh));
    assert!(!fresh.is_closed());
}

#[test]
fn test_unreachable_host_propagates() {
    let factory = factory();
    let err = factory
        .fetch(&Target::new("10.0.0.99", "root", "pw"))
        .err()
        .unwrap();
    assert!(matches!(err, DispatchError::Unreachable { .. }));
    assert!(!factory.is_cached("10.0.0.99"));
}

#[test]
fn test_servers_from_ini_dispatch() {
    let input = TestInputParser::parse_from_str(
        "[global]\nusername = root\npassword = pw\n[servers]\n1 = 10.0.0.1\n2 = 10.0.0.6\n",
    )
    .unwrap();
    let factory = factory();

    let variants: Vec<OsVariant> = input
        .servers
        .iter()
        .map(|server| factory.fetch(&server.target()).unwrap().variant())
        .collect();
    assert_eq!(variants, vec![OsVariant::Debian, OsVariant::Windows]);

    let helpers: Vec<_> = input
        .servers
        .iter()
        .map(|server| factory.fetch(&server.target()).unwrap())
        .collect();
    factory.shutdown();
    assert!(factory.is_empty());
    assert!(helpers.iter().all(|h| h.is_closed()));
}
