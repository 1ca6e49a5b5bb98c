/*!
 * Server descriptions loaded from test input
 */

use nodeinfra_core_dispatch::Target;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Legacy default SSH password for server-list shorthand
pub const DEFAULT_SSH_PASSWORD: &str = "northscale!23";

/// Default SSH user for server-list shorthand
pub const DEFAULT_SSH_USERNAME: &str = "root";

/// Default install location of the database CLI tools
pub const DEFAULT_CLI_PATH: &str = "/opt/membase/bin/";

/// Default REST port
pub const DEFAULT_REST_PORT: &str = "8091";

const REDACTED: &str = "********";

/// Bucket/scope/TTL triple for a named collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionSpec {
    pub bucket: Option<String>,
    pub scope: Option<String>,
    #[serde(rename = "maxTTL")]
    pub max_ttl: Option<String>,
}

impl CollectionSpec {
    pub fn is_empty(&self) -> bool {
        self.bucket.is_none() && self.scope.is_none() && self.max_ttl.is_none()
    }
}

/// One node of the system under test
///
/// Every string field defaults to empty; ports are kept as text so an
/// unset value stays distinguishable from a configured one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestInputServer {
    pub ip: String,
    pub internal_ip: String,
    pub hostname: String,
    pub ssh_username: String,
    #[serde(serialize_with = "redact")]
    pub ssh_password: String,
    pub ssh_key: String,
    pub rest_username: String,
    #[serde(serialize_with = "redact")]
    pub rest_password: String,
    pub services: String,
    pub port: String,
    pub cli_path: String,
    pub data_path: String,
    pub index_path: String,
    pub cbas_path: String,
    pub n1ql_port: String,
    pub index_port: String,
    pub fts_port: String,
    pub eventing_port: String,
    pub es_username: String,
    #[serde(serialize_with = "redact")]
    pub es_password: String,
    pub upgraded: bool,
    pub collections_map: BTreeMap<String, CollectionSpec>,
    pub bkrs_client: bool,
    pub hosted_on_cloud: bool,
    pub dummy: bool,
}

impl TestInputServer {
    /// Create a server with only its address set
    pub fn with_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Default::default()
        }
    }

    /// Address other cluster members use to reach this node
    pub fn cluster_ip(&self) -> &str {
        if self.internal_ip.is_empty() {
            &self.ip
        } else {
            &self.internal_ip
        }
    }

    /// REST port as a number, if set and valid
    pub fn rest_port(&self) -> Option<u16> {
        self.port.parse().ok()
    }

    /// SSH target used by the remote helper factory
    pub fn target(&self) -> Target {
        Target::new(
            self.ip.clone(),
            self.ssh_username.clone(),
            self.ssh_password.clone(),
        )
    }
}

impl fmt::Display for TestInputServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ip:{} port:{} ssh_username:{}",
            self.ip, self.port, self.ssh_username
        )
    }
}

pub(crate) fn redact<S: Serializer>(
    value: &str,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if value.is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str(REDACTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_ip_prefers_internal() {
        let mut server = TestInputServer::with_ip("34.1.2.3");
        assert_eq!(server.cluster_ip(), "34.1.2.3");

        server.internal_ip = "10.0.0.3".to_string();
        assert_eq!(server.cluster_ip(), "10.0.0.3");
    }

    #[test]
    fn test_display() {
        let server = TestInputServer {
            ip: "10.0.0.1".to_string(),
            port: "8091".to_string(),
            ssh_username: "root".to_string(),
            ..Default::default()
        };
        assert_eq!(server.to_string(), "ip:10.0.0.1 port:8091 ssh_username:root");
    }

    #[test]
    fn test_rest_port() {
        let mut server = TestInputServer::with_ip("10.0.0.1");
        assert_eq!(server.rest_port(), None);
        server.port = "18091".to_string();
        assert_eq!(server.rest_port(), Some(18091));
    }

    #[test]
    fn test_serialize_redacts_passwords() {
        let server = TestInputServer {
            ip: "10.0.0.1".to_string(),
            ssh_password: "hunter2".to_string(),
            rest_password: "password".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&server).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("\"password\""));
        assert!(json.contains("\"ssh_password\":\"********\""));
        assert!(json.contains("\"es_password\":\"\""));
    }

    #[test]
    fn test_target_carries_credentials() {
        let server = TestInputServer {
            ip: "10.0.0.1".to_string(),
            ssh_username: "admin".to_string(),
            ssh_password: "secret".to_string(),
            ..Default::default()
        };
        let target = server.target();
        assert_eq!(target.address, "10.0.0.1");
        assert_eq!(target.username, "admin");
        assert!(target.has_password());
    }

    #[test]
    fn test_collection_spec_serializes_max_ttl() {
        let spec = CollectionSpec {
            max_ttl: Some("60".to_string()),
            ..Default::default()
        };
        assert!(!spec.is_empty());
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"maxTTL\":\"60\""));
    }
}
