use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "udp-forwarder-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn run_demo(args: &[&str]) -> (String, Value) {
    let dir = unique_temp_dir("demo");
    let out_json = dir.join("summary.json");

    let output = Command::new(env!("CARGO_BIN_EXE_forwarder_demo"))
        .args(args)
        .args(["--summary-json", out_json.to_str().unwrap()])
        .env("RUST_LOG", "warn")
        .output()
        .expect("run forwarder_demo");
    assert!(
        output.status.success(),
        "forwarder_demo failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let raw = fs::read_to_string(&out_json).expect("read summary.json");
    let v: Value = serde_json::from_str(&raw).expect("parse summary.json");
    let _ = fs::remove_dir_all(&dir);
    (String::from_utf8_lossy(&output.stdout).into_owned(), v)
}

fn field(v: &Value, key: &str) -> u64 {
    v.get(key)
        .and_then(Value::as_u64)
        .unwrap_or_else(|| panic!("missing numeric field {key}: {v}"))
}

#[test]
fn accept_all_creates_one_endpoint_per_flow_and_loses_nothing() {
    let (stdout, v) = run_demo(&[
        "--flows",
        "20",
        "--packets-per-flow",
        "3",
        "--threads",
        "4",
        "--policy",
        "accept-all",
    ]);

    assert!(
        stdout.contains("done flows=20, endpoints=20, received=60, unreachable=0"),
        "unexpected stdout: {stdout}"
    );
    assert_eq!(field(&v, "packets_sent"), 60);
    assert_eq!(field(&v, "endpoints"), 20);
    assert_eq!(field(&v, "received"), 60);

    let stats = v.get("stats").expect("stats object");
    assert_eq!(field(stats, "forwarded_to_handler"), 20);
    assert_eq!(field(stats, "delivered_to_endpoint"), 40);
    assert_eq!(field(stats, "registration_conflicts"), 0);
    assert_eq!(field(stats, "endpoints_released"), 20);
}

#[test]
fn ignore_all_claims_every_packet_without_endpoints() {
    let (_, v) = run_demo(&[
        "--flows",
        "10",
        "--packets-per-flow",
        "2",
        "--policy",
        "ignore-all",
    ]);

    assert_eq!(field(&v, "endpoints"), 0);
    assert_eq!(field(&v, "received"), 0);
    assert_eq!(field(&v, "unreachable"), 0);
    let stats = v.get("stats").expect("stats object");
    assert_eq!(field(stats, "forwarded_to_handler"), 20);
    assert_eq!(field(stats, "endpoints_allocated"), 0);
}

#[test]
fn port_policy_accepts_only_listed_ports() {
    // Even flows go to port 53, odd flows to 123.
    let (_, v) = run_demo(&[
        "--flows",
        "10",
        "--packets-per-flow",
        "2",
        "--policy",
        "ports",
        "--accept-port",
        "53",
    ]);

    assert_eq!(field(&v, "endpoints"), 5);
    assert_eq!(field(&v, "received"), 10);
}

#[test]
fn config_file_limits_table_size() {
    let dir = unique_temp_dir("config");
    let cfg = dir.join("stack.json");
    fs::write(&cfg, r#"{ "max_endpoints": 3 }"#).expect("write config");

    let (stdout, v) = run_demo(&[
        "--config",
        cfg.to_str().unwrap(),
        "--flows",
        "8",
        "--packets-per-flow",
        "1",
        "--threads",
        "1",
    ]);
    let _ = fs::remove_dir_all(&dir);

    assert!(stdout.contains("endpoints=3"), "unexpected stdout: {stdout}");
    assert_eq!(field(&v, "endpoints"), 3);
    assert_eq!(field(&v, "received"), 3);
}

#[test]
fn bad_config_file_fails() {
    let dir = unique_temp_dir("bad-config");
    let cfg = dir.join("stack.json");
    fs::write(&cfg, "not json").expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_forwarder_demo"))
        .args(["--config", cfg.to_str().unwrap()])
        .output()
        .expect("run forwarder_demo");
    let _ = fs::remove_dir_all(&dir);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("parse config"));
}

#[test]
fn too_many_flows_is_rejected() {
    let output = Command::new(env!("CARGO_BIN_EXE_forwarder_demo"))
        .args(["--flows", "55537"])
        .output()
        .expect("run forwarder_demo");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--flows"));
}
