//! OS detection over SSH
//!
//! A probe opens a short-lived session, asks the host what it runs and closes
//! the session again. Results are cached per address until the factory asks
//! for them to be dropped.

use dashmap::DashMap;
use nodeinfra_core_dispatch::{
    Detector, DispatchError, OsInfo, Target, PACKAGING_DEB, PACKAGING_RPM,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::session::{SessionConfig, ShellSession};
use crate::config::HarnessConfig;
use crate::constants::is_supported_os;

const DEB_IDS: &[&str] = &["debian", "ubuntu"];
const RPM_IDS: &[&str] = &[
    "rhel", "centos", "fedora", "suse", "opensuse", "sles", "amzn", "ol", "rocky", "almalinux",
];

/// Everything a probe learned about a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub info: OsInfo,
    /// Platform tag such as `ubuntu20.04`, when one could be derived
    pub tag: Option<String>,
}

/// [`Detector`] that inspects hosts over SSH
pub struct SshDetector {
    config: HarnessConfig,
    cache: DashMap<String, OsInfo>,
}

impl SshDetector {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            cache: DashMap::new(),
        }
    }

    /// Cached classification for `address`, if any
    pub fn cached(&self, address: &str) -> Option<OsInfo> {
        self.cache.get(address).map(|info| info.clone())
    }

    /// Number of addresses with a cached classification
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    fn detect(session: &ShellSession) -> Result<Detection, DispatchError> {
        let uname = session.exec("uname -s")?;
        let kernel = uname.stdout.trim();

        if !uname.success() || kernel.is_empty() {
            let ver = session.exec("ver")?;
            if is_windows_banner(&ver.stdout) {
                return Ok(windows_detection());
            }
            debug!(address = session.address(), "Neither uname nor ver answered");
            return Ok(Detection {
                info: OsInfo::new("unknown"),
                tag: None,
            });
        }

        let family = family_from_kernel(kernel);
        match family.as_str() {
            "linux" => {
                let release = session.exec("cat /etc/os-release")?;
                if release.success() {
                    Ok(linux_detection(&parse_os_release(&release.stdout)))
                } else {
                    debug!(address = session.address(), "No /etc/os-release");
                    Ok(Detection {
                        info: OsInfo::new("linux"),
                        tag: None,
                    })
                }
            }
            "mac" => {
                let version = session.exec("sw_vers -productVersion")?;
                Ok(mac_detection(version.stdout.trim()))
            }
            "windows" => Ok(windows_detection()),
            _ => Ok(Detection {
                info: OsInfo::new(family),
                tag: None,
            }),
        }
    }
}

impl Detector for SshDetector {
    fn probe(&self, target: &Target) -> Result<OsInfo, DispatchError> {
        if let Some(info) = self.cached(&target.address) {
            debug!(address = %target.address, "Using cached OS info");
            return Ok(info);
        }

        let detection = {
            let session = ShellSession::connect(&SessionConfig::for_target(target, &self.config))?;
            Self::detect(&session)?
        };

        info!(
            address = %target.address,
            family = %detection.info.family,
            distribution = detection.info.distribution.as_deref().unwrap_or("-"),
            "Detected operating system"
        );
        if let Some(tag) = &detection.tag {
            if !is_supported_os(tag) {
                warn!(
                    address = %target.address,
                    tag = %tag,
                    "Platform is not in the supported list"
                );
            }
        }

        self.cache
            .insert(target.address.clone(), detection.info.clone());
        Ok(detection.info)
    }

    fn drop_cached_info(&self, address: &str) {
        if self.cache.remove(address).is_some() {
            debug!(address, "Dropped cached OS info");
        }
    }
}

/// Map `uname -s` output to an OS family
pub fn family_from_kernel(kernel: &str) -> String {
    let upper = kernel.trim().to_ascii_uppercase();
    if upper == "LINUX" {
        "linux".to_string()
    } else if upper == "DARWIN" {
        "mac".to_string()
    } else if ["CYGWIN", "MINGW", "MSYS"]
        .iter()
        .any(|prefix| upper.starts_with(prefix))
    {
        "windows".to_string()
    } else {
        kernel.trim().to_ascii_lowercase()
    }
}

pub fn is_windows_banner(output: &str) -> bool {
    output.contains("Microsoft Windows")
}

/// Parse `KEY=value` lines of /etc/os-release, unquoting values
pub fn parse_os_release(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Lower-cased `ID` followed by every `ID_LIKE` entry
fn release_ids(release: &BTreeMap<String, String>) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(id) = release.get("ID") {
        ids.push(id.to_ascii_lowercase());
    }
    if let Some(like) = release.get("ID_LIKE") {
        ids.extend(like.split_whitespace().map(str::to_ascii_lowercase));
    }
    ids
}

pub fn packaging_from_release(release: &BTreeMap<String, String>) -> Option<&'static str> {
    let ids = release_ids(release);
    if ids.iter().any(|id| DEB_IDS.contains(&id.as_str())) {
        Some(PACKAGING_DEB)
    } else if ids.iter().any(|id| RPM_IDS.contains(&id.as_str())) {
        Some(PACKAGING_RPM)
    } else {
        None
    }
}

pub fn distribution_from_release(release: &BTreeMap<String, String>) -> Option<String> {
    if let Some(pretty) = release.get("PRETTY_NAME").filter(|p| !p.is_empty()) {
        return Some(pretty.clone());
    }
    match (release.get("NAME"), release.get("VERSION_ID")) {
        (Some(name), Some(version)) => Some(format!("{} {}", name, version)),
        (Some(name), None) => Some(name.clone()),
        _ => None,
    }
}

/// Platform tag in the form used by the supported-OS table
pub fn distro_tag(release: &BTreeMap<String, String>) -> Option<String> {
    let id = release.get("ID")?.to_ascii_lowercase();
    let version = release.get("VERSION_ID").map(String::as_str).unwrap_or("");
    let major = version.split('.').next().unwrap_or("");

    let tag = match id.as_str() {
        "ubuntu" => format!("ubuntu{}", version),
        "debian" => format!("debian{}", major),
        "centos" => format!("centos{}", major),
        "rhel" => format!("rhel{}", major),
        "ol" => format!("oel{}", major),
        "amzn" => format!("amzn{}", major),
        "sles" | "opensuse" | "opensuse-leap" => format!("suse{}", major),
        "almalinux" => format!("alma{}", major),
        "rocky" => format!("rocky{}", major),
        other => format!("{}{}", other, version),
    };
    Some(tag)
}

fn linux_detection(release: &BTreeMap<String, String>) -> Detection {
    let mut info = OsInfo::new("linux");
    if let Some(packaging) = packaging_from_release(release) {
        info = info.with_packaging(packaging);
    }
    if let Some(distribution) = distribution_from_release(release) {
        info = info.with_distribution(distribution);
    }
    Detection {
        info,
        tag: distro_tag(release),
    }
}

fn mac_detection(product_version: &str) -> Detection {
    if product_version.is_empty() {
        return Detection {
            info: OsInfo::new("mac"),
            tag: Some("macos".to_string()),
        };
    }
    // Tags carry major.minor only
    let tag: Vec<&str> = product_version.split('.').take(2).collect();
    Detection {
        info: OsInfo::new("mac").with_distribution(format!("macOS {}", product_version)),
        tag: Some(tag.join(".")),
    }
}

fn windows_detection() -> Detection {
    Detection {
        info: OsInfo::new("windows"),
        tag: Some("windows".to_string()),
    }
}
