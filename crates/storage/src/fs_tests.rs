// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::driver::Driver;
use tempfile::TempDir;

async fn driver() -> (TempDir, FsDriver) {
    let dir = TempDir::new().unwrap();
    let drv = FsDriver::new(dir.path().join("mount")).await.unwrap();
    (dir, drv)
}

#[tokio::test]
async fn upload_creates_parents_and_round_trips() {
    let (_dir, drv) = driver().await;
    let mut src: &[u8] = b"hello backup";
    drv.upload(&mut src, "10.0.0.1/deep/nested/file.txt").await.unwrap();

    let mut out: Vec<u8> = Vec::new();
    drv.download(&mut out, "10.0.0.1/deep/nested/file.txt").await.unwrap();
    assert_eq!(out, b"hello backup");
}

#[tokio::test]
async fn download_missing_is_not_found_with_relative_path() {
    let (_dir, drv) = driver().await;
    let mut out: Vec<u8> = Vec::new();
    let err = drv.download(&mut out, "10.0.0.1/nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("10.0.0.1/nope"));
    assert!(!err.to_string().contains("mount"));
}

#[tokio::test]
async fn list_returns_sorted_entries() {
    let (_dir, drv) = driver().await;
    for name in ["b.txt", "a.txt"] {
        let mut src: &[u8] = b"x";
        drv.upload(&mut src, &format!("ns/{}", name)).await.unwrap();
    }
    let infos = drv.list("ns").await.unwrap();
    let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert!(infos.iter().all(|i| !i.is_dir && i.size == 1));
}

#[tokio::test]
async fn stat_reports_size_and_kind() {
    let (_dir, drv) = driver().await;
    let mut src: &[u8] = b"12345";
    drv.upload(&mut src, "ns/sub/file").await.unwrap();

    let info = drv.stat("ns/sub/file").await.unwrap();
    assert_eq!(info.size, 5);
    assert_eq!(info.name, "file");
    assert!(!info.is_dir);

    let dir_info = drv.stat("ns/sub").await.unwrap();
    assert!(dir_info.is_dir);

    assert!(drv.stat("ns/ghost").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn delete_removes_files_and_trees() {
    let (_dir, drv) = driver().await;
    let mut src: &[u8] = b"x";
    drv.upload(&mut src, "ns/tree/leaf").await.unwrap();

    drv.delete("ns/tree").await.unwrap();
    assert!(drv.stat("ns/tree").await.unwrap_err().is_not_found());
    assert!(drv.delete("ns/tree").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn rsync_mirrors_directory_contents() {
    let (dir, drv) = driver().await;
    let local = dir.path().join("local");
    std::fs::create_dir_all(local.join("sub")).unwrap();
    std::fs::write(local.join("top.txt"), "top").unwrap();
    std::fs::write(local.join("sub/inner.txt"), "inner").unwrap();

    drv.rsync(&local, "ns/archive").await.unwrap();
    let mut out: Vec<u8> = Vec::new();
    drv.download(&mut out, "ns/archive/sub/inner.txt").await.unwrap();
    assert_eq!(out, b"inner");

    // A second pass replaces pre-existing files.
    std::fs::write(local.join("top.txt"), "changed").unwrap();
    drv.rsync(&local, "ns/archive").await.unwrap();
    let mut out: Vec<u8> = Vec::new();
    drv.download(&mut out, "ns/archive/top.txt").await.unwrap();
    assert_eq!(out, b"changed");
}

#[tokio::test]
async fn probe_checks_the_mount_root() {
    let (dir, drv) = driver().await;
    drv.probe().await.unwrap();
    std::fs::remove_dir_all(dir.path().join("mount")).unwrap();
    assert!(drv.probe().await.is_err());
}
