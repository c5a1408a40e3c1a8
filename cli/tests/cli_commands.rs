//! Integration tests driving the depot binary

mod common;

use assert_cmd::Command;
use common::Fixture;
use predicates::prelude::*;
use std::fs;

#[test]
fn test_help_lists_commands() {
    let mut cmd = Command::cargo_bin("depot").unwrap();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("repos"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("components"))
        .stdout(predicate::str::contains("info"));
}

#[test]
fn test_resolve_requires_coordinates() {
    let fixture = Fixture::new();

    fixture
        .cmd()
        .arg("resolve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_info_shows_paths_and_statistics() {
    let fixture = Fixture::new();
    fixture.write_repository_config();

    fixture
        .cmd()
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Config file:"))
        .stdout(predicate::str::contains(fixture.config_path().display().to_string()))
        .stdout(predicate::str::contains("Statistics:"))
        .stdout(predicate::str::contains("Repositories: 1"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let fixture = Fixture::new();
    fixture.write_config("[[mirrors]]\nid = \"m\"\nurl = \"file:///m\"\nmirror_of = \"\"\n");

    fixture
        .cmd()
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config validation failed"))
        .stderr(predicate::str::contains("Mirror 'm' has an empty mirror_of"));
}

#[test]
fn test_repos_empty() {
    let fixture = Fixture::new();

    fixture
        .cmd()
        .arg("repos")
        .assert()
        .success()
        .stdout(predicate::str::contains("No repositories configured."));
}

#[test]
fn test_repos_add_then_list_json() {
    let fixture = Fixture::new();

    fixture
        .cmd()
        .args(["repos", "add", "central", "file:///srv/central", "--no-snapshots"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added repository: central"));

    let output = fixture.cmd().args(["repos", "--json"]).output().unwrap();
    assert!(output.status.success());
    let repositories: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(repositories[0]["id"], "central");
    assert_eq!(repositories[0]["releases"], true);
    assert_eq!(repositories[0]["snapshots"], false);

    fixture
        .cmd()
        .args(["repos", "remove", "central"])
        .assert()
        .success();
    fixture
        .cmd()
        .args(["repos", "remove", "central"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("repository 'central' not found"));
}

#[test]
fn test_repos_applies_mirrors_unless_raw() {
    let fixture = Fixture::new();
    fixture.write_config(
        r#"
[[repositories]]
id = "central"
url = "https://repo.example.org/maven2"

[[mirrors]]
id = "internal"
url = "file:///srv/mirror"
mirror_of = "*"

[[servers]]
id = "internal"
username = "ci"
password = "secret"
"#,
    );

    fixture
        .cmd()
        .arg("repos")
        .assert()
        .success()
        .stdout(predicate::str::contains("internal (file:///srv/mirror, default) [authenticated]"))
        .stdout(predicate::str::contains("mirror of: central"))
        .stdout(predicate::str::contains("secret").not());

    fixture
        .cmd()
        .args(["repos", "--raw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("central (https://repo.example.org/maven2, default)"))
        .stdout(predicate::str::contains("internal").not());
}

#[test]
fn test_resolve_tree_from_file_repository() {
    let fixture = Fixture::new();
    fixture.write_repository_config();
    fixture.publish("org/example/app/1.0/app-1.0.jar", "app");
    fixture.publish(
        "org/example/app/1.0/app-1.0.deps.toml",
        "[[dependencies]]\ncoords = \"org.example:lib:2.0\"\n",
    );
    fixture.publish("org/example/lib/2.0/lib-2.0.jar", "lib");

    fixture
        .cmd()
        .args(["resolve", "org.example:app:1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("org.example:app:jar:1.0 (compile) [resolved]"))
        .stdout(predicate::str::contains("   org.example:lib:jar:2.0 (compile) [resolved]"))
        .stdout(predicate::str::contains("Resolved:"))
        .stdout(predicate::str::contains("org.example:lib:jar:2.0 < files"));

    let stored = fixture.local_store().join("org/example/lib/2.0/lib-2.0.jar");
    assert_eq!(fs::read_to_string(stored).unwrap(), "lib");
}

#[test]
fn test_resolve_reports_partial_failure() {
    let fixture = Fixture::new();
    fixture.write_repository_config();
    fixture.publish("org/example/app/1.0/app-1.0.jar", "app");
    fixture.publish(
        "org/example/app/1.0/app-1.0.deps.toml",
        "[[dependencies]]\ncoords = \"org.example:gone:1.0\"\n",
    );

    fixture
        .cmd()
        .args(["resolve", "org.example:app:1.0"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Failed:"))
        .stdout(predicate::str::contains("org.example:gone:jar:1.0"))
        .stderr(predicate::str::contains("could not resolve artifact org.example:gone:jar:1.0"));
}

#[test]
fn test_resolve_json_with_several_roots() {
    let fixture = Fixture::new();
    fixture.write_repository_config();
    fixture.publish("org/example/a/1/a-1.jar", "a");
    fixture.publish("org/example/b/1/b-1-tests.jar", "b");

    let output = fixture
        .cmd()
        .args(["resolve", "org.example:a:1", "org.example:b:test-jar:1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["tree"][0], "depot:resolve:pom:0");
    let resolved: Vec<&str> = report["resolved"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["coords"].as_str().unwrap())
        .collect();
    assert_eq!(resolved, vec!["org.example:a:jar:1", "org.example:b:jar:tests:1"]);
}

#[test]
fn test_install_then_resolve_offline() {
    let fixture = Fixture::new();
    fixture.write_config("offline = true\n");
    let built = fixture.home.path().join("tool.jar");
    fs::write(&built, "tool").unwrap();

    fixture
        .cmd()
        .args(["install", "org.example:tool:0.1"])
        .arg(&built)
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed org.example:tool:jar:0.1"));

    assert_eq!(
        fs::read_to_string(fixture.local_store().join("org/example/tool/0.1/tool-0.1.jar")).unwrap(),
        "tool"
    );

    fixture
        .cmd()
        .args(["resolve", "org.example:tool:0.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("org.example:tool:jar:0.1 < local"));
}

#[test]
fn test_install_missing_file_fails() {
    let fixture = Fixture::new();
    fixture.write_config("");

    fixture
        .cmd()
        .args(["install", "org.example:tool:0.1", "does-not-exist.jar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to locate"));
}

#[test]
fn test_components_ranked_and_disabled() {
    let fixture = Fixture::new();
    fixture.write_config("[properties]\n\"depot.priority.FileTransporter\" = nan\n");

    fixture
        .cmd()
        .arg("components")
        .assert()
        .success()
        .stdout(predicate::str::contains("Repository connectors:"))
        .stdout(predicate::str::contains("BasicConnectorFactory"))
        .stdout(predicate::str::contains("DefaultLayoutFactory"))
        .stdout(predicate::str::contains("FileTransporterFactory"))
        .stdout(predicate::str::contains("(disabled)"));
}

#[test]
fn test_disabled_transporter_leaves_repository_unreachable() {
    let fixture = Fixture::new();
    fixture.write_config(&format!(
        "[properties]\n\"depot.priority.FileTransporter\" = nan\n\n[[repositories]]\nid = \"files\"\nurl = \"{}\"\n",
        fixture.remote_url()
    ));
    fixture.publish("org/example/app/1.0/app-1.0.jar", "app");

    fixture
        .cmd()
        .args(["resolve", "org.example:app:1.0"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("no repository connector available for repository files"));
}
