#[test]
fn webcloud_version_contract() {
    let bin = assert_cmd::cargo::cargo_bin!("webcloud");
    let out = std::process::Command::new(bin)
        .args(["version"])
        .output()
        .expect("run webcloud version");

    assert!(out.status.success(), "webcloud version failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse version json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("version"));
    assert_eq!(v["name"].as_str(), Some("webcloud"));
    assert!(v["ruleset_version"].as_u64().is_some());
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
}

#[test]
fn webcloud_version_text_output_contract() {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("webcloud"))
        .args(["version", "--output", "text"])
        .assert()
        .success()
        .stdout(predicates::str::starts_with("webcloud "));
}
