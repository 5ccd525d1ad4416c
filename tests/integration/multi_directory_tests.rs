use dupelint::duplicates::{DuplicateFinder, FinderError};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tempfile::tempdir;

fn write(path: PathBuf, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

#[test]
fn test_scan_two_non_overlapping_directories() {
    let dir1 = tempdir().unwrap();
    let dir2 = tempdir().unwrap();
    write(dir1.path().join("a.txt"), b"dup");
    write(dir2.path().join("b.txt"), b"dup");

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder
        .find(vec![dir1.path().to_path_buf(), dir2.path().to_path_buf()])
        .unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 2);
    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.roots.len(), 2);
}

#[test]
fn test_nested_root_is_walked_once() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    write(dir.path().join("a.txt"), b"content");
    write(sub.join("b.txt"), b"content");

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder
        .find(vec![sub.clone(), dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.roots.len(), 1);
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 2);
}

#[test]
fn test_scan_same_path_twice() {
    let dir = tempdir().unwrap();
    write(dir.path().join("a.txt"), b"content");

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder
        .find(vec![dir.path().to_path_buf(), dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.total_files, 1);
    assert!(sets.is_empty());
}

#[test]
fn test_cross_directory_duplicate_detection() {
    let dirs: Vec<_> = (0..3).map(|_| tempdir().unwrap()).collect();
    for (i, dir) in dirs.iter().enumerate() {
        write(dir.path().join(format!("{i}.txt")), b"triple");
    }

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder
        .find(dirs.iter().map(|d| d.path().to_path_buf()).collect())
        .unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 3);
    assert_eq!(summary.total_files, 3);
}

#[test]
fn test_first_root_wins_discovery_order() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    write(first.path().join("z.txt"), b"ordered");
    write(second.path().join("a.txt"), b"ordered");

    let config = dupelint::duplicates::FinderConfig::default()
        .with_original_policy(dupelint::duplicates::OriginalPolicy::FirstDiscovered);
    let (sets, _) = DuplicateFinder::new(config)
        .find(vec![first.path().to_path_buf(), second.path().to_path_buf()])
        .unwrap();

    assert!(sets[0].original().path.ends_with("z.txt"));
    assert_eq!(sets[0].id, 0);
}

#[test]
fn test_missing_root_is_a_warning() {
    let dir = tempdir().unwrap();
    write(dir.path().join("a.txt"), b"dup");
    write(dir.path().join("b.txt"), b"dup");
    let missing = dir.path().join("does-not-exist");

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder
        .find(vec![missing.clone(), dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(summary.warnings.len(), 1);
    assert_eq!(summary.warnings[0].path.as_deref(), Some(missing.as_path()));
}

#[test]
fn test_all_roots_missing_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("gone");
    let file = dir.path().join("file.txt");
    write(file.clone(), b"not a directory");

    let finder = DuplicateFinder::default();
    let err = finder.find(vec![missing, file]).unwrap_err();

    assert!(matches!(err, FinderError::NoAccessibleRoots(ref roots) if roots.len() == 2));
}
