use std::fs;

use fsdiff_common::Config;
use fsdiff_core::archive::{read_tar_file, write_tar_file};
use fsdiff_core::tree::{FileOptions, Folder};
use fsdiff_core::{diff, load_from, LoadOptions};
use tempfile::TempDir;

fn sample_tree() -> Folder {
    let mut tree = Folder::new();
    tree.file("a.txt", "hello");
    tree.file_with(
        "script.sh",
        FileOptions {
            content: Some(b"#!/bin/sh\necho hi\n".to_vec()),
            mode: Some(0o755),
            ..FileOptions::default()
        },
    );
    {
        let sub = tree.folder("sub");
        sub.file("b.txt", "world");
        sub.folder("empty");
    }
    tree.symlink("lnk", "a.txt");
    tree
}

#[test]
fn write_then_load_is_noop_under_bytes() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("tree");
    let tree = sample_tree();
    tree.write_to(&target).unwrap();

    let loaded = load_from(&target, &LoadOptions::default()).unwrap();

    // mtimes differ between the built tree (none) and disk, so mask them
    assert!(diff(&tree, &loaded, &Config::accurate_no_mtime()).is_noop());
}

#[test]
fn write_is_idempotent_over_existing_directories() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("tree");

    // symlink creation is not idempotent, so exercise dirs and files only
    let tree = Folder::from_strings(&[("a.txt", "hello"), ("sub/b.txt", "world")]);
    tree.write_to(&target).unwrap();
    tree.write_to(&target).unwrap();

    let loaded = load_from(&target, &LoadOptions::default()).unwrap();
    assert!(diff(&tree, &loaded, &Config::accurate_no_mtime()).is_noop());
}

#[cfg(unix)]
#[test]
fn modes_survive_the_round_trip() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let target = temp.path().join("tree");
    sample_tree().write_to(&target).unwrap();

    let mode = fs::metadata(target.join("script.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o7777, 0o755);

    let loaded = load_from(&target, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.get("script.sh").as_file().unwrap().mode(), 0o755);
}

#[cfg(unix)]
#[test]
fn symlinks_survive_the_round_trip() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("tree");
    sample_tree().write_to(&target).unwrap();

    let loaded = load_from(&target, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.get("lnk").as_symlink().unwrap().target(), "a.txt");
}

#[test]
fn disk_round_trip_detects_real_changes() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("tree");
    let tree = sample_tree();
    tree.write_to(&target).unwrap();

    fs::write(target.join("a.txt"), "tampered").unwrap();

    let loaded = load_from(&target, &LoadOptions::default()).unwrap();
    let result = diff(&tree, &loaded, &Config::accurate_no_mtime());
    assert!(!result.is_noop());
    let paths = fsdiff_core::collect_paths(&result);
    assert_eq!(paths, vec!["a.txt"]);
}

#[test]
fn pinned_mtimes_make_accurate_mode_clean_on_disk() {
    use filetime::{set_file_mtime, FileTime};

    let temp = TempDir::new().unwrap();
    let left = temp.path().join("left");
    let right = temp.path().join("right");
    fs::create_dir_all(&left).unwrap();
    fs::create_dir_all(&right).unwrap();
    fs::write(left.join("a.txt"), "same").unwrap();
    fs::write(right.join("a.txt"), "same").unwrap();

    let pinned = FileTime::from_unix_time(1_700_000_000, 0);
    set_file_mtime(left.join("a.txt"), pinned).unwrap();
    set_file_mtime(right.join("a.txt"), pinned).unwrap();

    let left_tree = load_from(&left, &LoadOptions::default()).unwrap();
    let right_tree = load_from(&right, &LoadOptions::default()).unwrap();
    assert!(diff(&left_tree, &right_tree, &Config::accurate()).is_noop());

    // shifting one side's mtime is detected by accurate mode only
    set_file_mtime(right.join("a.txt"), FileTime::from_unix_time(1_700_000_100, 0)).unwrap();
    let right_tree = load_from(&right, &LoadOptions::default()).unwrap();
    assert!(!diff(&left_tree, &right_tree, &Config::accurate()).is_noop());
    assert!(diff(&left_tree, &right_tree, &Config::accurate_no_mtime()).is_noop());
}

#[test]
fn tar_round_trip_is_noop_under_bytes() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("tree.tar");
    let tree = sample_tree();
    write_tar_file(&tree, &archive).unwrap();

    let loaded = read_tar_file(&archive).unwrap();
    assert!(diff(&tree, &loaded, &Config::accurate_no_mtime()).is_noop());
}

#[test]
fn tar_gz_round_trip_is_noop_under_bytes() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("tree.tgz");
    let tree = sample_tree();
    write_tar_file(&tree, &archive).unwrap();

    let loaded = read_tar_file(&archive).unwrap();
    assert!(diff(&tree, &loaded, &Config::accurate_no_mtime()).is_noop());
}

#[test]
fn tar_preserves_mtimes_for_accurate_mode() {
    use std::time::{Duration, SystemTime};

    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("tree.tar");

    let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let mut tree = Folder::new();
    tree.file_with(
        "pinned.txt",
        FileOptions {
            content: Some(b"data".to_vec()),
            mtime: Some(mtime),
            ..FileOptions::default()
        },
    );
    write_tar_file(&tree, &archive).unwrap();

    let loaded = read_tar_file(&archive).unwrap();
    assert_eq!(
        loaded.get("pinned.txt").as_file().unwrap().mtime(),
        Some(mtime)
    );
    assert!(diff(&tree, &loaded, &Config::accurate()).is_noop());
}
