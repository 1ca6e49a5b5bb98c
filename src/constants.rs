/*!
 * Platform tables shared by the detector and the CLI
 */

pub const AMAZON: &[&str] = &["amzn2"];
pub const CENTOS: &[&str] = &["centos6", "centos7", "centos8"];
pub const DEBIAN: &[&str] = &["debian8", "debian9", "debian10", "debian11", "debian12"];
pub const OEL: &[&str] = &["oel7", "oel8", "oel9"];
pub const RHEL: &[&str] = &["rhel7", "rhel8", "rhel9"];
pub const SUSE: &[&str] = &["suse12", "suse15"];
pub const UBUNTU: &[&str] = &["ubuntu16.04", "ubuntu18.04", "ubuntu20.04", "ubuntu22.04"];
pub const ALMA: &[&str] = &["alma9"];
pub const ROCKY: &[&str] = &["rocky9"];
pub const MACOS: &[&str] = &[
    "10.13", "10.14", "10.15", "11.1", "11.2", "11.3", "12.3", "macos",
];
pub const WINDOWS: &[&str] = &["2016", "2019", "2022", "windows"];

/// Every supported platform tag, grouped by platform
pub const SUPPORTED_OS: &[(&str, &[&str])] = &[
    ("amazon", AMAZON),
    ("centos", CENTOS),
    ("debian", DEBIAN),
    ("oel", OEL),
    ("rhel", RHEL),
    ("suse", SUSE),
    ("ubuntu", UBUNTU),
    ("alma", ALMA),
    ("rocky", ROCKY),
    ("mac", MACOS),
    ("windows", WINDOWS),
];

/// Check a platform tag such as `ubuntu20.04` or `centos7`
pub fn is_supported_os(tag: &str) -> bool {
    let tag = tag.to_ascii_lowercase();
    SUPPORTED_OS
        .iter()
        .any(|(_, tags)| tags.contains(&tag.as_str()))
}

/// Platform group a tag belongs to
pub fn platform_of(tag: &str) -> Option<&'static str> {
    let tag = tag.to_ascii_lowercase();
    SUPPORTED_OS
        .iter()
        .find(|(_, tags)| tags.contains(&tag.as_str()))
        .map(|(platform, _)| *platform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_tags() {
        assert!(is_supported_os("ubuntu20.04"));
        assert!(is_supported_os("CentOS7"));
        assert!(is_supported_os("12.3"));
        assert!(is_supported_os("windows"));
        assert!(!is_supported_os("ubuntu14.04"));
        assert!(!is_supported_os(""));
    }

    #[test]
    fn test_platform_of() {
        assert_eq!(platform_of("suse15"), Some("suse"));
        assert_eq!(platform_of("2019"), Some("windows"));
        assert_eq!(platform_of("amzn2"), Some("amazon"));
        assert_eq!(platform_of("solaris11"), None);
    }
}
