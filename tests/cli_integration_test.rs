mod common;

use std::path::Path;
use std::process::{Command, Output};

use common::{OrderTree, write_file};

fn xsdgate(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xsdgate"))
        .current_dir(cwd)
        .env_remove("XSDGATE_LOG")
        .args(args)
        .output()
        .expect("Failed to run xsdgate")
}

#[test]
fn test_help() {
    let tree = OrderTree::new();
    let output = xsdgate(tree.dir.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--schema"));
    assert!(stdout.contains("--root"));
}

#[test]
fn test_valid_documents_exit_zero() {
    let tree = OrderTree::new();
    let output = xsdgate(
        tree.dir.path(),
        &["--schema", "schemas/order.xsd", "docs/nested", "--format", "summary"],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "{stdout}");
    assert!(stdout.contains("Total files: 1"));
}

#[test]
fn test_exit_code_reflects_worst_outcome() {
    let tree = OrderTree::new();
    let output = xsdgate(tree.dir.path(), &["-s", "schemas/order.xsd", "docs"]);
    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Not valid: 1"));
    assert!(stdout.contains("Parser errors: 1"));

    let output = xsdgate(
        tree.dir.path(),
        &["-s", "schemas/order.xsd", "--exclude", "**/broken.xml", "docs"],
    );
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_root_paths_from_config_file() {
    let tree = OrderTree::new();
    write_file(
        tree.dir.path(),
        "xsdgate.toml",
        r#"
[validation]
root_paths = ["Invoice"]

[schemas]
files = ["schemas/order.xsd"]
"#,
    );

    let output = xsdgate(tree.dir.path(), &["docs/nested", "--format", "json"]);
    assert_eq!(output.status.code(), Some(2));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["illegal_root_files"], 1);
}

#[test]
fn test_missing_path_is_rejected() {
    let tree = OrderTree::new();
    let output = xsdgate(tree.dir.path(), &["does-not-exist"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Path does not exist"));
}

#[test]
fn test_unreadable_static_schema_fails_at_startup() {
    let tree = OrderTree::new();
    let output = xsdgate(tree.dir.path(), &["-s", "schemas/missing.xsd", "docs"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Schema not found"));
}
