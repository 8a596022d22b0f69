//! Behavioural smoke tests for the CLI entrypoint.

#[path = "common/fixtures.rs"]
#[expect(dead_code, reason = "key generation is unused by this test crate")]
mod fixtures;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use fixtures::Workspace;
use predicates::prelude::*;

fn isolated(workspace: &Workspace) -> Command {
    let mut cmd = cargo_bin_cmd!("stackreach");
    cmd.current_dir(workspace.root())
        .env("HOME", workspace.root())
        .env("XDG_CONFIG_HOME", workspace.root())
        .env_remove("OS_COMPUTE_ENDPOINT")
        .env_remove("OS_AUTH_TOKEN")
        .env_remove("STACKREACH_CONFIG_PATH");
    cmd
}

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("stackreach");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn validate_prints_normalised_launch_settings() {
    let workspace = Workspace::new();
    let path = workspace.write(
        "launch.toml",
        "[launch]\nsource_image = \"img\"\nflavor = \"m1.tiny\"\nsecurity_groups = \"default\"\n",
    );

    isolated(&workspace)
        .arg("validate")
        .arg(path.as_str())
        .assert()
        .success()
        .stdout(predicate::str::contains("flavor: m1.tiny"))
        .stdout(predicate::str::contains("security_groups: default"));
}

#[test]
fn validate_fails_with_every_error_listed() {
    let workspace = Workspace::new();
    let path = workspace.write("launch.toml", "[launch]\nssh_timeout = \"soon\"\n");

    isolated(&workspace)
        .arg("validate")
        .arg(path.as_str())
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("A source_image must be specified"))
        .stderr(predicate::str::contains("A flavor must be specified"))
        .stderr(predicate::str::contains("Failed parsing ssh_timeout"));
}

#[test]
fn resolve_without_compute_settings_is_a_configuration_error() {
    let workspace = Workspace::new();
    let path = workspace.write(
        "launch.toml",
        "[launch]\nsource_image = \"img\"\nflavor = \"m1.tiny\"\n",
    );

    isolated(&workspace)
        .args(["resolve", path.as_str(), "--instance-id", "srv-1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration error"));
}
