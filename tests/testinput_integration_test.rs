/*!
 * Integration tests for test-input loading
 *
 * These tests write ini files to a temporary directory and load them
 * through the public parser entry points.
 */

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use nodeinfra::error::NodeInfraError;
use nodeinfra::testinput::{ParamValue, RawParam, TestInputParser, LOCAL_BKRS};

const CLUSTER_INI: &str = "\
# two-node cluster plus a client
[global]
username:root
password:couchbase
port:8091
cli:/opt/couchbase/bin/

[membase]
rest_username:Administrator
rest_password:password

[servers]
1:10.112.0.101
2:10.112.0.102

[10.112.0.102]
services:kv,n1ql,index
port:18091

[clients]
1:10.112.0.200

[cbbackupmgr]
name:remote
directory:/backups
threads:4
";

fn write_ini(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_cluster_ini() {
    let dir = TempDir::new().unwrap();
    let ini = write_ini(&dir, "cluster.ini", CLUSTER_INI);

    let input = TestInputParser::get_test_input(&ini, None).unwrap();

    assert_eq!(input.servers.len(), 2);
    assert_eq!(input.servers[0].to_string(), "ip:10.112.0.101 port:8091 ssh_username:root");
    assert_eq!(input.servers[0].cli_path, "/opt/couchbase/bin/");
    assert_eq!(input.servers[1].port, "18091");
    assert_eq!(input.servers[1].services, "kv,n1ql,index");
    assert!(input
        .servers
        .iter()
        .all(|s| s.rest_username == "Administrator"));

    assert_eq!(input.param("num_nodes").unwrap(), ParamValue::Int(2));
    assert_eq!(input.param("num_clients").unwrap(), ParamValue::Int(1));
}

#[test]
fn test_params_override_counts_and_user() {
    let dir = TempDir::new().unwrap();
    let ini = write_ini(&dir, "cluster.ini", CLUSTER_INI);

    let input = TestInputParser::get_test_input(
        &ini,
        Some("num_nodes=1,run_as_user=tester,nodes_init=1,2,vbuckets=0-3,skip_cleanup=True"),
    )
    .unwrap();

    assert_eq!(input.param("num_nodes").unwrap().as_i64(), Some(1));
    assert!(input.servers.iter().all(|s| s.rest_username == "tester"));
    assert_eq!(
        input.test_params["nodes_init"],
        RawParam::List(vec!["1".to_string(), "2".to_string()])
    );
    assert_eq!(
        input.param("vbuckets").unwrap().as_ranges(),
        Some(&[0, 1, 2, 3][..])
    );
    assert_eq!(input.param("skip_cleanup").unwrap().as_bool(), Some(true));
    assert_eq!(input.param_or("bucket_size", 256i64).as_i64(), Some(256));
}

#[test]
fn test_cbbackupmgr_params() {
    let dir = TempDir::new().unwrap();
    let ini = write_ini(&dir, "cluster.ini", CLUSTER_INI);
    let input = TestInputParser::get_test_input(&ini, None).unwrap();

    assert_eq!(
        input.cbbackupmgr_param("threads").unwrap(),
        Some(ParamValue::Int(4))
    );
    assert!(matches!(
        input.cbbackupmgr_param("archive"),
        Err(NodeInfraError::MissingParameter(_))
    ));
}

#[test]
fn test_minimal_ini_uses_local_backup_manager() {
    let dir = TempDir::new().unwrap();
    let ini = write_ini(&dir, "single.ini", "[servers]\n1:127.0.0.1\n");
    let input = TestInputParser::get_test_input(&ini, Some("")).unwrap();

    assert_eq!(input.servers.len(), 1);
    assert_eq!(input.servers[0].ssh_username, "");
    assert_eq!(input.cbbackupmgr["name"], LOCAL_BKRS);
    assert_eq!(input.cbbackupmgr_param("archive").unwrap(), None);
    assert!(!input.has_param("num_clients"));
    assert_eq!(input.param("num_nodes").unwrap().as_i64(), Some(1));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = TestInputParser::get_test_input(&dir.path().join("absent.ini"), None).unwrap_err();
    assert!(matches!(err, NodeInfraError::Io(_)));
    assert_eq!(err.exit_code(), nodeinfra::error::EXIT_FATAL);
}

#[test]
fn test_syntax_error_reports_line() {
    let dir = TempDir::new().unwrap();
    let ini = write_ini(&dir, "broken.ini", "[servers]\n1:10.0.0.1\n[servers\n");
    let err = TestInputParser::get_test_input(&ini, None).unwrap_err();
    assert!(matches!(err, NodeInfraError::IniSyntax { line: 3, .. }));
    assert_eq!(err.exit_code(), nodeinfra::error::EXIT_FATAL);
}

#[test]
fn test_show_output_redacts_passwords() {
    let dir = TempDir::new().unwrap();
    let ini = write_ini(&dir, "cluster.ini", CLUSTER_INI);
    let input = TestInputParser::get_test_input(&ini, None).unwrap();

    let json = serde_json::to_string(&input).unwrap();
    assert!(json.contains("10.112.0.101"));
    assert!(!json.contains("couchbase\""));
    assert!(!json.contains(":\"password\""));
}
