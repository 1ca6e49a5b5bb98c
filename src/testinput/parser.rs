/*!
 * Builds a [`TestInput`] from an ini file and command-line overrides
 *
 * Recognised sections:
 *
 * - `[servers]`, `[clients]`, `[cluster*]`: option values are addresses,
 *   taken in file order. An address may have its own section carrying
 *   per-server settings.
 * - `[global]`: defaults for every server field left unset.
 * - `[membase]`: REST credentials.
 * - `[elastic]`, `[bkrs_client]`: auxiliary hosts.
 * - `[cbbackupmgr]`: free-form backup-manager options.
 */

use super::ini::IniDocument;
use super::server::{
    CollectionSpec, TestInputServer, DEFAULT_CLI_PATH, DEFAULT_REST_PORT, DEFAULT_SSH_PASSWORD,
    DEFAULT_SSH_USERNAME,
};
use super::{MembaseSettings, RawParam, TestInput, LOCAL_BKRS};
use crate::error::{NodeInfraError, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Values applied to empty fields of server-list shorthand entries
#[derive(Debug, Clone, Default)]
pub struct ServerListOverrides {
    pub ssh_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cli_path: Option<String>,
}

/// Entry points for loading test input
pub struct TestInputParser;

impl TestInputParser {
    /// Parse the ini file and apply `k=v,...` overrides
    pub fn get_test_input(ini: &Path, params: Option<&str>) -> Result<TestInput> {
        let mut input = Self::parse_from_file(ini)?;
        input.test_params = match params {
            Some(p) if !p.trim().is_empty() => Self::parse_params(p)?,
            _ => BTreeMap::new(),
        };
        Self::apply_params(&mut input);
        Ok(input)
    }

    /// Split `k=v,k2=v2` into parameters
    ///
    /// Values may themselves contain commas: `a=1,2,b=3` yields
    /// `a = [1, 2]` and `b = 3`. The `vbuckets` key takes ranges such as
    /// `1-3,7`. A repeated key keeps its last value.
    pub fn parse_params(params: &str) -> Result<BTreeMap<String, RawParam>> {
        let keys: Vec<(String, usize, usize)> = PARAM_KEY
            .captures_iter(params)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let key = caps.get(1)?;
                Some((key.as_str().trim().to_string(), whole.start(), whole.end()))
            })
            .collect();

        let mut parsed = BTreeMap::new();
        for (i, (key, _, value_start)) in keys.iter().enumerate() {
            let value_end = keys.get(i + 1).map_or(params.len(), |next| next.1);
            let value = params[*value_start..value_end].trim();

            let param = if key == "vbuckets" {
                RawParam::Ranges(parse_vbuckets(value)?)
            } else {
                let items: Vec<String> = value.split(',').map(|s| s.trim().to_string()).collect();
                if items.len() > 1 {
                    RawParam::List(items)
                } else {
                    RawParam::Single(value.to_string())
                }
            };
            parsed.insert(key.clone(), param);
        }
        Ok(parsed)
    }

    /// Apply overrides that depend on parsed parameters
    fn apply_params(input: &mut TestInput) {
        if let Some(RawParam::Single(user)) = input.test_params.get("run_as_user") {
            for server in &mut input.servers {
                if server.rest_username != *user {
                    server.rest_username = user.clone();
                }
            }
        }
        if !input.test_params.contains_key("num_clients") && !input.clients.is_empty() {
            let count = input.clients.len().to_string();
            input
                .test_params
                .insert("num_clients".to_string(), RawParam::Single(count));
        }
        if !input.test_params.contains_key("num_nodes") && !input.servers.is_empty() {
            let count = input.servers.len().to_string();
            input
                .test_params
                .insert("num_nodes".to_string(), RawParam::Single(count));
        }
    }

    /// Load test input from an ini file
    pub fn parse_from_file(path: &Path) -> Result<TestInput> {
        debug!("Loading test input from {}", path.display());
        let doc = IniDocument::from_file(path)?;
        Self::parse_document(&doc)
    }

    /// Load test input from ini text
    pub fn parse_from_str(text: &str) -> Result<TestInput> {
        let doc = IniDocument::parse(text)?;
        Self::parse_document(&doc)
    }

    fn parse_document(doc: &IniDocument) -> Result<TestInput> {
        let mut input = TestInput::default();
        let global: BTreeMap<String, String> = doc
            .items("global")
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut server_ips = Vec::new();
        let mut cluster_ips: Vec<Vec<String>> = Vec::new();

        for section in doc.sections() {
            match section {
                "servers" => server_ips = section_values(doc, section),
                "clients" => input.clients = section_values(doc, section),
                "membase" => input.membase_settings = Some(membase_settings(doc, section)),
                "global" => {}
                "elastic" => input.elastic = Some(elastic_config(doc, section, &global)),
                "bkrs_client" => {
                    input.bkrs_client = Some(bkrs_client_config(doc, section, &global)?)
                }
                "cbbackupmgr" => {
                    input.cbbackupmgr = doc
                        .items(section)
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();
                }
                s if s.starts_with("cluster") => cluster_ips.push(section_values(doc, s)),
                _ => {}
            }
        }

        let membase = input.membase_settings.as_ref();
        for (index, ips) in cluster_ips.iter().enumerate() {
            let servers = ips
                .iter()
                .map(|ip| server_with_defaults(doc, ip, membase, &global))
                .collect();
            input.clusters.insert(index, servers);
        }
        input.servers = server_ips
            .iter()
            .map(|ip| server_with_defaults(doc, ip, membase, &global))
            .collect();

        if !doc.has_section("cbbackupmgr") {
            input
                .cbbackupmgr
                .insert("name".to_string(), LOCAL_BKRS.to_string());
        }

        debug!(
            "Parsed {} servers, {} clusters, {} clients",
            input.servers.len(),
            input.clusters.len(),
            input.clients.len()
        );
        Ok(input)
    }

    /// Parse `ip:port:username:password:cli_path,...`
    ///
    /// Entries without a `:` are skipped. Empty fields take the override
    /// first, then the legacy defaults.
    pub fn parse_server_list(
        argument: &str,
        overrides: &ServerListOverrides,
    ) -> Result<Vec<TestInputServer>> {
        let mut servers = Vec::new();
        for entry in argument.split(',') {
            if !entry.contains(':') {
                if !entry.trim().is_empty() {
                    warn!("Skipping server entry without ':': {}", entry);
                }
                continue;
            }

            let fields: Vec<&str> = entry.split(':').collect();
            if fields.len() < 5 {
                return Err(NodeInfraError::InvalidParameter {
                    name: "servers".to_string(),
                    value: entry.to_string(),
                    reason: "expected ip:port:username:password:cli_path".to_string(),
                });
            }

            let mut server = TestInputServer {
                ip: fields[0].to_string(),
                port: fields[1].to_string(),
                ssh_username: fields[2].to_string(),
                ssh_password: fields[3].to_string(),
                cli_path: fields[4].to_string(),
                ..Default::default()
            };

            fill_empty(&mut server.ssh_key, overrides.ssh_key.as_deref());
            fill_empty(&mut server.ssh_username, overrides.username.as_deref());
            fill_empty(&mut server.ssh_password, overrides.password.as_deref());
            fill_empty(&mut server.cli_path, overrides.cli_path.as_deref());

            fill_empty(&mut server.ssh_username, Some(DEFAULT_SSH_USERNAME));
            fill_empty(&mut server.ssh_password, Some(DEFAULT_SSH_PASSWORD));
            fill_empty(&mut server.cli_path, Some(DEFAULT_CLI_PATH));
            fill_empty(&mut server.port, Some(DEFAULT_REST_PORT));

            servers.push(server);
        }
        Ok(servers)
    }
}

/// Matches `key=` with an optional leading comma
static PARAM_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,]?([^,=]+)=").expect("param key pattern"));

/// Expand `1-100,140,150-160` into a sorted, de-duplicated list
fn parse_vbuckets(value: &str) -> Result<Vec<u32>> {
    let invalid = |reason: &str| NodeInfraError::InvalidParameter {
        name: "vbuckets".to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let mut vbuckets = BTreeSet::new();
    for part in value.split(',') {
        let bounds: Vec<&str> = part.split('-').collect();
        let (first, last) = match bounds.as_slice() {
            [single] => (*single, *single),
            [first, .., last] => (*first, *last),
            [] => return Err(invalid("empty range")),
        };
        let start: u32 = first
            .trim()
            .parse()
            .map_err(|_| invalid("range bounds must be integers"))?;
        let end: u32 = last
            .trim()
            .parse()
            .map_err(|_| invalid("range bounds must be integers"))?;
        vbuckets.extend(start..=end);
    }
    Ok(vbuckets.into_iter().collect())
}

fn fill_empty(field: &mut String, value: Option<&str>) {
    if field.is_empty() {
        if let Some(v) = value {
            *field = v.to_string();
        }
    }
}

fn section_values(doc: &IniDocument, section: &str) -> Vec<String> {
    doc.items(section)
        .into_iter()
        .map(|(_, v)| v.to_string())
        .collect()
}

fn membase_settings(doc: &IniDocument, section: &str) -> MembaseSettings {
    MembaseSettings {
        rest_username: doc.get(section, "rest_username").unwrap_or_default().to_string(),
        rest_password: doc.get(section, "rest_password").unwrap_or_default().to_string(),
    }
}

/// A server as described by its own section, before global defaults
fn server_section(doc: &IniDocument, ip: &str) -> TestInputServer {
    let mut server = TestInputServer::with_ip(ip);
    for (option, value) in doc.items(ip) {
        let value = value.to_string();
        match option {
            "username" => server.ssh_username = value,
            "password" => server.ssh_password = value,
            "cli" => server.cli_path = value,
            "ssh_key" => server.ssh_key = value,
            "port" => server.port = value,
            "ip" => server.ip = value,
            "internal_ip" => server.internal_ip = value,
            "services" => server.services = value,
            "n1ql_port" => server.n1ql_port = value,
            "index_port" => server.index_port = value,
            "fts_port" => server.fts_port = value,
            "eventing_port" => server.eventing_port = value,
            "collections" => {
                for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    server
                        .collections_map
                        .insert(name.to_string(), collection_spec(doc, name));
                }
            }
            _ => {}
        }
    }
    server
}

fn collection_spec(doc: &IniDocument, name: &str) -> CollectionSpec {
    CollectionSpec {
        bucket: doc.get(name, "bucket").map(str::to_string),
        scope: doc.get(name, "scope").map(str::to_string),
        max_ttl: doc.get(name, "maxttl").map(str::to_string),
    }
}

fn server_with_defaults(
    doc: &IniDocument,
    ip: &str,
    membase: Option<&MembaseSettings>,
    global: &BTreeMap<String, String>,
) -> TestInputServer {
    let mut server = server_section(doc, ip);
    let g = |key: &str| global.get(key).map(String::as_str);

    fill_empty(&mut server.ssh_username, g("username"));
    fill_empty(&mut server.ssh_password, g("password"));
    let key = g("ssh_key").map(expand_home);
    fill_empty(&mut server.ssh_key, key.as_deref());
    fill_empty(&mut server.port, g("port"));
    fill_empty(&mut server.cli_path, g("cli"));
    if let Some(m) = membase {
        if !m.rest_username.is_empty() {
            fill_empty(&mut server.rest_username, Some(m.rest_username.as_str()));
        }
        if !m.rest_password.is_empty() {
            fill_empty(&mut server.rest_password, Some(m.rest_password.as_str()));
        }
    }
    fill_empty(&mut server.data_path, g("data_path"));
    fill_empty(&mut server.index_path, g("index_path"));
    fill_empty(&mut server.cbas_path, g("cbas_path"));
    fill_empty(&mut server.services, g("services"));
    fill_empty(&mut server.n1ql_port, g("n1ql_port"));
    fill_empty(&mut server.index_port, g("index_port"));
    fill_empty(&mut server.eventing_port, g("eventing_port"));
    fill_empty(&mut server.es_username, g("es_username"));
    fill_empty(&mut server.es_password, g("es_password"));
    server
}

fn elastic_config(
    doc: &IniDocument,
    section: &str,
    global: &BTreeMap<String, String>,
) -> TestInputServer {
    let mut server = TestInputServer::default();
    for (option, value) in doc.items(section) {
        let value = value.to_string();
        match option {
            "ip" => server.ip = value,
            "port" => server.port = value,
            "es_username" => server.es_username = value,
            "es_password" => server.es_password = value,
            "username" => server.ssh_username = value,
            "password" => server.ssh_password = value,
            _ => {}
        }
    }
    fill_empty(&mut server.ssh_username, global.get("username").map(String::as_str));
    fill_empty(&mut server.ssh_password, global.get("password").map(String::as_str));
    server
}

fn bkrs_client_config(
    doc: &IniDocument,
    section: &str,
    global: &BTreeMap<String, String>,
) -> Result<TestInputServer> {
    let required = |key: &str| -> Result<String> {
        doc.get(section, key)
            .or_else(|| global.get(key).map(String::as_str))
            .map(str::to_string)
            .ok_or_else(|| NodeInfraError::MissingParameter(format!("{}.{}", section, key)))
    };

    let membase = if doc.has_section("membase") {
        membase_settings(doc, "membase")
    } else {
        return Err(NodeInfraError::MissingSection("membase".to_string()));
    };

    Ok(TestInputServer {
        ip: doc.get(section, "ip").unwrap_or_default().to_string(),
        ssh_username: required("username")?,
        ssh_password: required("password")?,
        port: doc
            .get(section, "port")
            .or_else(|| global.get("port").map(String::as_str))
            .unwrap_or_default()
            .to_string(),
        rest_username: membase.rest_username,
        rest_password: membase.rest_password,
        bkrs_client: true,
        ..Default::default()
    })
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.display(), rest),
        None => path.to_string(),
    }
}
