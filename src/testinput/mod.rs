/*!
 * Test input model
 *
 * A [`TestInput`] is built once per run from an INI file plus optional
 * `key=value` overrides and handed to every test case. See
 * [`TestInputParser`] for the file layout.
 */

pub mod ini;
pub mod parser;
pub mod server;

pub use parser::{ServerListOverrides, TestInputParser};
pub use server::{CollectionSpec, TestInputServer};

use crate::error::{NodeInfraError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Backup-manager name used when the ini has no `[cbbackupmgr]` section
pub const LOCAL_BKRS: &str = "local_bkrs";

/// A test parameter as received on the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawParam {
    /// Plain value (`key=value`)
    Single(String),
    /// Comma-separated values (`key=a,b`)
    List(Vec<String>),
    /// Expanded `vbuckets` ranges
    Ranges(Vec<u32>),
}

impl From<&str> for RawParam {
    fn from(value: &str) -> Self {
        RawParam::Single(value.to_string())
    }
}

/// A typed test parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    List(Vec<String>),
    Ranges(Vec<u32>),
}

impl ParamValue {
    /// Interpret a textual value: integer, then float, then true/false
    /// (any case), else plain text
    pub fn parse(value: &str) -> Self {
        if let Ok(i) = value.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = value.parse::<f64>() {
            return ParamValue::Float(f);
        }
        if value.eq_ignore_ascii_case("false") {
            return ParamValue::Bool(false);
        }
        if value.eq_ignore_ascii_case("true") {
            return ParamValue::Bool(true);
        }
        ParamValue::Text(value.to_string())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_ranges(&self) -> Option<&[u32]> {
        match self {
            ParamValue::Ranges(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&RawParam> for ParamValue {
    fn from(raw: &RawParam) -> Self {
        match raw {
            RawParam::Single(s) => ParamValue::parse(s),
            RawParam::List(items) => ParamValue::List(items.clone()),
            RawParam::Ranges(items) => ParamValue::Ranges(items.clone()),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// REST credentials from the `[membase]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembaseSettings {
    pub rest_username: String,
    #[serde(serialize_with = "server::redact")]
    pub rest_password: String,
}

/// Everything a test run knows about its environment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestInput {
    pub servers: Vec<TestInputServer>,
    /// Cluster index (order of `cluster*` sections) to its servers
    pub clusters: BTreeMap<usize, Vec<TestInputServer>>,
    pub clients: Vec<String>,
    pub test_params: BTreeMap<String, RawParam>,
    pub elastic: Option<TestInputServer>,
    pub cbbackupmgr: BTreeMap<String, String>,
    pub membase_settings: Option<MembaseSettings>,
    pub bkrs_client: Option<TestInputServer>,
}

impl TestInput {
    /// Typed value of a test parameter
    pub fn param(&self, name: &str) -> Result<ParamValue> {
        self.test_params
            .get(name)
            .map(ParamValue::from)
            .ok_or_else(|| NodeInfraError::MissingParameter(name.to_string()))
    }

    /// Typed value of a test parameter, or `default` when unset
    pub fn param_or(&self, name: &str, default: impl Into<ParamValue>) -> ParamValue {
        self.test_params
            .get(name)
            .map(ParamValue::from)
            .unwrap_or_else(|| default.into())
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.test_params.contains_key(name)
    }

    /// Value of a `[cbbackupmgr]` option
    ///
    /// A missing option is only an error when a remote backup manager is
    /// configured; with the local default it yields `Ok(None)`.
    pub fn cbbackupmgr_param(&self, name: &str) -> Result<Option<ParamValue>> {
        if let Some(value) = self.cbbackupmgr.get(name) {
            return Ok(Some(ParamValue::parse(value)));
        }
        match self.cbbackupmgr.get("name").map(String::as_str) {
            Some(LOCAL_BKRS) => Ok(None),
            _ => Err(NodeInfraError::MissingParameter(name.to_string())),
        }
    }

    /// Find a server by address in `servers` or any cluster
    pub fn server(&self, ip: &str) -> Option<&TestInputServer> {
        self.servers
            .iter()
            .chain(self.clusters.values().flatten())
            .find(|s| s.ip == ip)
    }
}
