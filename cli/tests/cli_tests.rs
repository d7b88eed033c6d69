use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn codedigest() -> Command {
    Command::cargo_bin("codedigest").unwrap()
}

fn sample_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/main.rs"), "// entry\nfn main() {}\n").unwrap();
    fs::write(dir.path().join("README.md"), "# sample\n").unwrap();
    fs::write(dir.path().join("logo.png"), "binary").unwrap();
    dir
}

#[test]
fn no_arguments_prints_help() {
    codedigest()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn generate_writes_single_digest() {
    let project = sample_project();
    let out = TempDir::new().unwrap();

    codedigest()
        .args(["generate", "--no-token-count", "--project-name", "sample"])
        .arg(project.path())
        .arg("-o")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved 1 part(s) for sample"));

    let digest = fs::read_to_string(out.path().join("sample_Digest.txt")).unwrap();
    assert!(digest.contains("File: src/main.rs"));
    assert!(digest.contains("logo.png"));
    assert!(!digest.contains("binary"));
}

#[test]
fn generate_json_summary() {
    let project = sample_project();
    let out = TempDir::new().unwrap();

    codedigest()
        .args(["g", "--json", "--no-token-count", "--remove-comments"])
        .arg(project.path())
        .arg("--output-dir")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\": \"success\""))
        .stdout(predicate::str::contains("\"total_source_files\": 2"));
}

#[test]
fn config_file_is_picked_up_from_project() {
    let project = sample_project();
    fs::create_dir_all(project.path().join(".codedigest")).unwrap();
    fs::write(
        project.path().join(".codedigest/codedigest.toml"),
        "[general]\nproject_name = \"configured\"\n\n[output]\nformat = \"markdown\"\ncount_tokens = false\n",
    )
    .unwrap();
    let out = TempDir::new().unwrap();

    codedigest()
        .arg("generate")
        .arg(project.path())
        .arg("-o")
        .arg(out.path())
        .assert()
        .success();

    let digest = fs::read_to_string(out.path().join("configured_Digest.txt")).unwrap();
    assert!(digest.starts_with("# Project: configured"));
    assert!(digest.contains("## File: src/main.rs"));
}

#[test]
fn unknown_config_field_fails() {
    let project = sample_project();
    let config = project.path().join("bad.toml");
    fs::write(&config, "[output]\nbogus = 1\n").unwrap();

    codedigest()
        .arg("generate")
        .arg(project.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn unknown_preset_fails() {
    let project = sample_project();
    let out = TempDir::new().unwrap();

    codedigest()
        .args(["generate", "--preset", "cobol"])
        .arg(project.path())
        .arg("-o")
        .arg(out.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cobol"));
}

#[test]
fn invalid_token_limit_is_argument_error() {
    let project = sample_project();

    codedigest()
        .args(["generate", "--token-limit", "lots"])
        .arg(project.path())
        .assert()
        .code(5);
}

#[test]
fn empty_project_reports_no_files() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("only.png"), "x").unwrap();
    let out = TempDir::new().unwrap();

    codedigest()
        .args(["generate", "--no-token-count"])
        .arg(project.path())
        .arg("-o")
        .arg(out.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No matching files found after filtering"));
}

#[test]
fn missing_root_is_io_error() {
    let parent = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    codedigest()
        .args(["generate", "--no-token-count"])
        .arg(parent.path().join("does-not-exist"))
        .arg("-o")
        .arg(out.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Cannot access source"));
}

#[test]
fn presets_lists_builtin_bundles() {
    codedigest()
        .arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("android"))
        .stdout(predicate::str::contains("node_modules"));
}

#[test]
fn completion_for_bash() {
    codedigest()
        .args(["completion", "--shell", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("codedigest"));
}

#[test]
fn completion_save_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("_codedigest");

    codedigest()
        .args(["completion", "--shell", "zsh", "--save", "--dir"])
        .arg(dir.path())
        .assert()
        .success();
    assert!(fs::read_to_string(&script).unwrap().contains("codedigest"));

    codedigest()
        .args(["completion", "--shell", "zsh", "--save", "--dir"])
        .arg(dir.path())
        .assert()
        .code(5)
        .stderr(predicate::str::contains("--force"));

    fs::write(&script, "stale").unwrap();
    codedigest()
        .args(["completion", "--shell", "zsh", "--save", "--force", "--dir"])
        .arg(dir.path())
        .assert()
        .success();
    assert_ne!(fs::read_to_string(&script).unwrap(), "stale");
}

#[test]
fn completion_rejects_unknown_shell() {
    codedigest()
        .args(["completion", "--shell", "tcsh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tcsh"));
}
