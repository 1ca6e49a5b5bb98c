//! Operating-system classification
//!
//! A [`Detector`](crate::Detector) reports what it found on a host as raw
//! strings in an [`OsInfo`]. [`OsVariant::classify`] turns that into the closed
//! set of helper variants the factory knows how to build.

use std::fmt;

/// Packaging family reported for Debian-style hosts
pub const PACKAGING_DEB: &str = "deb";

/// Packaging family reported for RPM-style hosts
pub const PACKAGING_RPM: &str = "rpm";

/// Raw classification of a host as reported by a detector
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OsInfo {
    /// OS family, e.g. "linux", "mac", "windows"
    pub family: String,

    /// Packaging family for Linux hosts ("deb" or "rpm")
    pub packaging: Option<String>,

    /// Human readable distribution string, e.g. "CentOS Linux 7 (Core)"
    pub distribution: Option<String>,
}

impl OsInfo {
    /// Create an OsInfo with only the family set
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            packaging: None,
            distribution: None,
        }
    }

    /// Set the packaging family
    pub fn with_packaging(mut self, packaging: impl Into<String>) -> Self {
        self.packaging = Some(packaging.into());
        self
    }

    /// Set the distribution string
    pub fn with_distribution(mut self, distribution: impl Into<String>) -> Self {
        self.distribution = Some(distribution.into());
        self
    }

    /// Variant selected for this host
    pub fn variant(&self) -> OsVariant {
        OsVariant::classify(self)
    }
}

/// Helper variant selected for a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsVariant {
    /// Linux with Debian-style packaging
    Debian,
    /// Linux with RPM packaging
    Rpm,
    /// Linux with RPM packaging and a SUSE distribution
    Suse,
    /// Linux with unrecognized packaging
    GenericLinux,
    /// macOS
    Mac,
    /// Windows
    Windows,
    /// Anything else; served by the generic fallback helper
    Unknown,
}

impl OsVariant {
    /// All variants, in dispatch order
    pub const ALL: [OsVariant; 7] = [
        OsVariant::Debian,
        OsVariant::Rpm,
        OsVariant::Suse,
        OsVariant::GenericLinux,
        OsVariant::Mac,
        OsVariant::Windows,
        OsVariant::Unknown,
    ];

    /// Classify a detector result
    ///
    /// Comparisons are case-insensitive. A SUSE host is an RPM host whose
    /// distribution string contains "suse".
    pub fn classify(info: &OsInfo) -> OsVariant {
        let family = info.family.trim().to_ascii_lowercase();
        match family.as_str() {
            "linux" => {
                let packaging = info
                    .packaging
                    .as_deref()
                    .map(|p| p.trim().to_ascii_lowercase())
                    .unwrap_or_default();
                match packaging.as_str() {
                    PACKAGING_DEB => OsVariant::Debian,
                    PACKAGING_RPM => {
                        let is_suse = info
                            .distribution
                            .as_deref()
                            .map(|d| d.to_ascii_lowercase().contains("suse"))
                            .unwrap_or(false);
                        if is_suse {
                            OsVariant::Suse
                        } else {
                            OsVariant::Rpm
                        }
                    }
                    _ => OsVariant::GenericLinux,
                }
            }
            "mac" => OsVariant::Mac,
            "windows" => OsVariant::Windows,
            _ => OsVariant::Unknown,
        }
    }

    /// Short lowercase name used in logs and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            OsVariant::Debian => "debian",
            OsVariant::Rpm => "rpm",
            OsVariant::Suse => "suse",
            OsVariant::GenericLinux => "linux",
            OsVariant::Mac => "mac",
            OsVariant::Windows => "windows",
            OsVariant::Unknown => "unknown",
        }
    }

    /// Check if this variant is one of the Linux flavours
    pub fn is_linux(&self) -> bool {
        matches!(
            self,
            OsVariant::Debian | OsVariant::Rpm | OsVariant::Suse | OsVariant::GenericLinux
        )
    }
}

impl fmt::Display for OsVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
