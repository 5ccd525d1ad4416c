#![cfg(unix)]

use dupelint::duplicates::{DuplicateFinder, FinderConfig};
use dupelint::scanner::WalkerConfig;
use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::symlink;
use tempfile::tempdir;

#[test]
fn test_hardlinks_are_collapsed_by_default() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.txt");
    File::create(&original)
        .unwrap()
        .write_all(b"identical content")
        .unwrap();
    fs::hard_link(&original, dir.path().join("hardlink.txt")).unwrap();

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert!(sets.is_empty());
    assert_eq!(summary.total_files, 1);
}

#[test]
fn test_hardlinks_reported_when_kept() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.txt");
    File::create(&original)
        .unwrap()
        .write_all(b"identical content")
        .unwrap();
    fs::hard_link(&original, dir.path().join("hardlink.txt")).unwrap();

    let walker = WalkerConfig::default().with_keep_hardlinks(true);
    let finder = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker));
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 2);
}

#[test]
fn test_hardlink_plus_copy_is_one_set_of_two() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("a.txt");
    File::create(&original).unwrap().write_all(b"payload").unwrap();
    fs::hard_link(&original, dir.path().join("b.txt")).unwrap();
    File::create(dir.path().join("c.txt"))
        .unwrap()
        .write_all(b"payload")
        .unwrap();

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 2);
    assert!(sets[0].paths().iter().any(|p| p.ends_with("c.txt")));
}

#[test]
fn test_symlinks_not_followed_by_default() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.txt");
    File::create(&original).unwrap().write_all(b"content").unwrap();
    symlink(&original, dir.path().join("symlink.txt")).unwrap();

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert_eq!(summary.total_files, 1);
    assert!(sets.is_empty());
}

#[test]
fn test_symlinks_followed_when_enabled() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.txt");
    File::create(&original).unwrap().write_all(b"content").unwrap();
    symlink(&original, dir.path().join("symlink.txt")).unwrap();

    let walker = WalkerConfig {
        follow_symlinks: true,
        ..WalkerConfig::default()
    };
    let finder = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker));
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    // the target has a single link, so the symlink is read as a second file
    assert_eq!(summary.total_files, 2);
    assert_eq!(sets.len(), 1);
}

#[test]
fn test_symlink_cycle_terminates() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    symlink(&sub, sub.join("link")).unwrap();

    let walker = WalkerConfig {
        follow_symlinks: true,
        ..WalkerConfig::default()
    };
    let finder = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker));
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert!(sets.is_empty());
    assert_eq!(summary.total_files, 0);
}
