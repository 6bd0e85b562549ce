//! End-to-end tests for the argument surface.

mod common;
use common::prelude::*;
use common::UNSET_TOKEN_VARIABLE;

#[test]
fn test_help_lists_subcommands() {
    filesync_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("onboard"))
        .stdout(predicate::str::contains("fix"))
        .stdout(predicate::str::contains("<TEMPLATE>"));
}

#[test]
fn test_help_lists_global_options() {
    let output = filesync_cmd().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for option in [
        "--no-autoclean",
        "--clone-root",
        "--dry-run",
        "--interactive",
        "--log-level",
        "--logging-config",
        "--template-branch",
        "--template-config",
        "--token-variable-name",
        "--config",
    ] {
        assert!(stdout.contains(option), "missing {} in help", option);
    }
}

#[test]
fn test_update_help() {
    filesync_cmd()
        .args(["acme/acme-template", "update", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--single-repo"))
        .stdout(predicate::str::contains("--cache"));
}

#[test]
fn test_fix_help_names_arguments() {
    filesync_cmd()
        .args(["acme/acme-template", "fix", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<REPO>"))
        .stdout(predicate::str::contains("<EXISTING_BRANCH>"));
}

/// The token variable name can come from the --config file.
#[test]
fn test_token_variable_from_config_file() {
    let fixture = TestFixture::new();
    let config = fixture.file(
        "filesync-cli.yaml",
        &format!("token-variable-name: {}\n", UNSET_TOKEN_VARIABLE),
    );
    filesync_cmd()
        .arg("acme/acme-template")
        .arg("--config")
        .arg(&config)
        .arg("-r")
        .arg(fixture.clone_root())
        .args(["onboard", "widgets"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(UNSET_TOKEN_VARIABLE));
}

/// A command-line option wins over the --config file.
#[test]
fn test_command_line_overrides_config_file() {
    let fixture = TestFixture::new();
    let config = fixture.file("filesync-cli.yaml", "token-variable-name: FROM_FILE_TOKEN\n");
    filesync_cmd()
        .arg("acme/acme-template")
        .arg("--config")
        .arg(&config)
        .arg("-e")
        .arg(UNSET_TOKEN_VARIABLE)
        .arg("-r")
        .arg(fixture.clone_root())
        .arg("update")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(UNSET_TOKEN_VARIABLE))
        .stderr(predicate::str::contains("FROM_FILE_TOKEN").not());
}
