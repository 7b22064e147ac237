use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn run_cli(args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_fsdiff");
    Command::new(exe)
        .args(args)
        .output()
        .expect("failed to run fsdiff")
}

fn write_tree(dir: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let full = dir.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, contents).unwrap();
    }
}

#[test]
fn identical_trees_print_noop() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    write_tree(left.path(), &[("a.txt", "same")]);
    write_tree(right.path(), &[("a.txt", "same")]);

    let output = run_cli(&[
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
        "--no-mtime",
        "--progress",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.trim(), "Noop");
}

#[test]
fn content_difference_is_reported_with_reason() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    write_tree(left.path(), &[("a.txt", "hello")]);
    write_tree(right.path(), &[("a.txt", "world")]);

    let output = run_cli(&[
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
        "--no-mtime",
        "--progress",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("ChangeDir: ."), "stdout: {}", stdout);
    assert!(stdout.contains("ChangeFile: a.txt"), "stdout: {}", stdout);
    assert!(
        stdout.contains("content differs (len before 5, after 5)"),
        "stdout: {}",
        stdout
    );
}

#[test]
fn fast_mode_ignores_content() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    write_tree(left.path(), &[("a.txt", "hello")]);
    write_tree(right.path(), &[("a.txt", "world")]);

    let output = run_cli(&[
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
        "--mode",
        "fast",
        "--progress",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.trim(), "Noop");
}

#[test]
fn json_format_encodes_the_operation_tree() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    write_tree(left.path(), &[("a.txt", "one"), ("gone.txt", "x")]);
    write_tree(right.path(), &[("a.txt", "two"), ("new.txt", "y")]);

    let output = run_cli(&[
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
        "--no-mtime",
        "--format",
        "json",
        "--progress",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["relativePath"], ".");
    assert_eq!(json["operand"], "ChangeDir");

    let operations = json["value"]["operations"].as_array().unwrap();
    let operands: Vec<&str> = operations
        .iter()
        .map(|op| op["operand"].as_str().unwrap())
        .collect();
    assert_eq!(operands, vec!["ChangeFile", "RemoveFile", "CreateFile"]);
}

#[test]
fn paths_format_lists_leaf_operations() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    write_tree(left.path(), &[("keep.txt", "1"), ("sub/old.txt", "x")]);
    write_tree(right.path(), &[("keep.txt", "2"), ("sub/new.txt", "y")]);

    let output = run_cli(&[
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
        "--no-mtime",
        "--format",
        "paths",
        "--progress",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["keep.txt", "sub/new.txt", "sub/old.txt"]);
}

#[test]
fn excludes_hide_matching_entries() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    write_tree(left.path(), &[("keep.txt", "1"), ("tmp/x.log", "a")]);
    write_tree(right.path(), &[("keep.txt", "2"), ("tmp/x.log", "b")]);

    let output = run_cli(&[
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
        "--no-mtime",
        "--exclude",
        "tmp/**",
        "--format",
        "paths",
        "--progress",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["keep.txt"]);
}

#[test]
fn checksum_require_without_cache_reports_because() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    write_tree(left.path(), &[("a.txt", "hello")]);
    write_tree(right.path(), &[("a.txt", "hello")]);

    let output = run_cli(&[
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
        "--mode",
        "checksum-require",
        "--progress",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(
        stdout.contains("because: missing checksum → missing checksum"),
        "stdout: {}",
        stdout
    );
}

#[test]
fn precompute_with_sidecar_makes_require_clean() {
    let temp = TempDir::new().unwrap();
    let left = temp.path().join("left");
    let right = temp.path().join("right");
    write_tree(&left, &[("a.txt", "hello"), ("sub/b.txt", "deep")]);
    write_tree(&right, &[("a.txt", "hello"), ("sub/b.txt", "deep")]);
    let cache = temp.path().join("cache");

    // precompute under the ensure mode populates the sidecar for both roots
    for root in [&left, &right] {
        let output = run_cli(&[
            root.to_str().unwrap(),
            root.to_str().unwrap(),
            "--mode",
            "checksum-ensure",
            "--sidecar",
            cache.to_str().unwrap(),
            "--root",
            root.to_str().unwrap(),
            "--precompute",
            "--progress",
            "off",
        ]);
        assert_eq!(output.status.code(), Some(0));
    }
    assert!(cache.join("a.txt.sha256").exists());
    assert!(cache.join("sub/b.txt.sha256").exists());
}

#[test]
fn checksum_cache_dir_is_an_alias_for_sidecar() {
    let temp = TempDir::new().unwrap();
    let left = temp.path().join("left");
    write_tree(&left, &[("a.txt", "hello")]);
    let cache = temp.path().join("cache");

    let output = run_cli(&[
        left.to_str().unwrap(),
        left.to_str().unwrap(),
        "--mode",
        "checksum-ensure",
        "--checksum-cache-dir",
        cache.to_str().unwrap(),
        "--precompute",
        "--progress",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(0));
    assert!(cache.join("a.txt.sha256").exists());
}

#[test]
fn case_insensitive_flag_pairs_folded_names() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    write_tree(left.path(), &[("README.md", "#")]);
    write_tree(right.path(), &[("readme.md", "#")]);

    let output = run_cli(&[
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
        "--no-mtime",
        "--ci",
        "--progress",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.trim(), "Noop");
}

#[test]
fn missing_left_directory_exits_2() {
    let right = TempDir::new().unwrap();
    let output = run_cli(&["/no/such/tree", right.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!output.stderr.is_empty());
}

#[test]
fn file_argument_exits_2() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("plain.txt");
    fs::write(&file, "not a dir").unwrap();
    let right = TempDir::new().unwrap();

    let output = run_cli(&[file.to_str().unwrap(), right.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn empty_algo_exits_2() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    let output = run_cli(&[
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
        "--algo",
        "",
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn tree_format_omits_reasons() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    write_tree(left.path(), &[("a.txt", "hello")]);
    write_tree(right.path(), &[("a.txt", "world")]);

    let output = run_cli(&[
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
        "--no-mtime",
        "--format",
        "tree",
        "--progress",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("ChangeFile: a.txt"));
    assert!(!stdout.contains("content differs"));
}
