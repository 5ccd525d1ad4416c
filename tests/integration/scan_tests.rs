use dupelint::duplicates::{DuplicateFinder, FinderConfig, OriginalPolicy};
use dupelint::scanner::{ChecksumAlgorithm, WalkerConfig};
use filetime::{set_file_mtime, FileTime};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write(dir: &Path, name: &str, content: &[u8]) {
    if let Some(parent) = Path::new(name).parent() {
        fs::create_dir_all(dir.join(parent)).unwrap();
    }
    File::create(dir.join(name))
        .unwrap()
        .write_all(content)
        .unwrap();
}

fn names(paths: &[std::path::PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let finder = DuplicateFinder::default();

    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert!(sets.is_empty());
    assert_eq!(summary.total_files, 0);
    assert_eq!(summary.duplicate_sets, 0);
    assert!(!summary.has_duplicates());
}

#[test]
fn test_scan_unique_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"content a");
    write(dir.path(), "b.txt", b"content b");
    write(dir.path(), "c.txt", b"content c");

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert!(sets.is_empty());
    assert_eq!(summary.total_files, 3);
    // same size, so everything reaches the prefix stage
    assert_eq!(summary.eliminated_by_size, 0);
    assert_eq!(summary.eliminated_by_prefix, 3);
}

#[test]
fn test_scan_duplicate_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"duplicate");
    write(dir.path(), "b.txt", b"duplicate");
    write(dir.path(), "c.txt", b"unique");

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 2);
    assert_eq!(sets[0].size, 9);
    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.eliminated_by_size, 1);
    assert_eq!(summary.duplicate_sets, 1);
    assert_eq!(summary.duplicate_files, 1);
    assert_eq!(summary.reclaimable_space, 9);
}

#[test]
fn test_scan_nested_directories() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"nested duplicate");
    write(dir.path(), "sub/b.txt", b"nested duplicate");
    write(dir.path(), "sub/deeper/c.txt", b"nested duplicate");

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 3);
    assert_eq!(sets[0].twin_count(), 2);
    assert_eq!(summary.duplicate_files, 2);
}

#[test]
fn test_multiple_sets_of_equal_size() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a1", b"aaaa");
    write(dir.path(), "a2", b"aaaa");
    write(dir.path(), "b1", b"bbbb");
    write(dir.path(), "b2", b"bbbb");
    write(dir.path(), "c", b"cccc");

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert_eq!(sets.len(), 2);
    assert_eq!(summary.eliminated_by_prefix, 1);
    let mut all: Vec<String> = sets.iter().flat_map(|s| names(&s.paths())).collect();
    all.sort();
    assert_eq!(all, vec!["a1", "a2", "b1", "b2"]);
}

#[test]
fn test_large_files_differing_after_prefix() {
    let dir = tempdir().unwrap();
    let mut a = vec![7u8; 64 * 1024];
    let b = a.clone();
    write(dir.path(), "same1.bin", &a);
    write(dir.path(), "same2.bin", &b);
    a[60 * 1024] = 8;
    write(dir.path(), "other.bin", &a);

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(names(&sets[0].paths()).len(), 2);
    assert!(!names(&sets[0].paths()).contains(&"other.bin".to_string()));
    // the prefix cannot tell the three apart
    assert_eq!(summary.eliminated_by_prefix, 0);
    assert!(summary.bytes_hashed >= 3 * 64 * 1024);
}

#[test]
fn test_empty_files_are_skipped_by_default() {
    let dir = tempdir().unwrap();
    write(dir.path(), "empty1", b"");
    write(dir.path(), "empty2", b"");

    let finder = DuplicateFinder::default();
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();
    assert!(sets.is_empty());
    assert_eq!(summary.total_files, 0);

    let config = FinderConfig::default()
        .with_walker_config(WalkerConfig::default().with_include_empty(true));
    let (sets, _) = DuplicateFinder::new(config)
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].size, 0);
}

#[test]
fn test_size_limits() {
    let dir = tempdir().unwrap();
    write(dir.path(), "small1", b"12");
    write(dir.path(), "small2", b"12");
    write(dir.path(), "big1", &[1u8; 100]);
    write(dir.path(), "big2", &[1u8; 100]);

    let walker = WalkerConfig {
        min_size: Some(10),
        ..WalkerConfig::default()
    };
    let finder = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker));
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].size, 100);
    assert_eq!(summary.total_files, 2);

    let walker = WalkerConfig {
        max_size: Some(10),
        ..WalkerConfig::default()
    };
    let finder = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker));
    let (sets, _) = finder.find(vec![dir.path().to_path_buf()]).unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].size, 2);
}

#[test]
fn test_ignore_patterns() {
    let dir = tempdir().unwrap();
    write(dir.path(), "keep1.txt", b"same");
    write(dir.path(), "keep2.txt", b"same");
    write(dir.path(), "skip.log", b"same");
    write(dir.path(), "build/out.txt", b"same");

    let walker = WalkerConfig::default()
        .with_ignore_patterns(vec!["*.log".to_string(), "build/".to_string()]);
    let finder = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker));
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(sets.len(), 1);
    let mut found = names(&sets[0].paths());
    found.sort();
    assert_eq!(found, vec!["keep1.txt", "keep2.txt"]);
}

#[test]
fn test_gitignore_is_honored() {
    let dir = tempdir().unwrap();
    write(dir.path(), ".gitignore", b"ignored/\n");
    write(dir.path(), "a.txt", b"dup");
    write(dir.path(), "ignored/b.txt", b"dup");

    let finder = DuplicateFinder::default();
    let (sets, _) = finder.find(vec![dir.path().to_path_buf()]).unwrap();
    assert!(sets.is_empty());
}

#[test]
fn test_skip_hidden() {
    let dir = tempdir().unwrap();
    write(dir.path(), "visible.txt", b"hidden twin");
    write(dir.path(), ".hidden.txt", b"hidden twin");

    let finder = DuplicateFinder::default();
    let (sets, _) = finder.find(vec![dir.path().to_path_buf()]).unwrap();
    assert_eq!(sets.len(), 1);

    let walker = WalkerConfig {
        skip_hidden: true,
        ..WalkerConfig::default()
    };
    let finder = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker));
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();
    assert!(sets.is_empty());
    assert_eq!(summary.total_files, 1);
}

#[test]
fn test_max_depth_one_only_sees_root_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "top.txt", b"deep twin");
    write(dir.path(), "sub/nested.txt", b"deep twin");

    let walker = WalkerConfig::default().with_max_depth(Some(1));
    let finder = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker));
    let (sets, summary) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert!(sets.is_empty());
    assert_eq!(summary.total_files, 1);
}

#[test]
fn test_oldest_file_is_original() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a_new.txt", b"versioned");
    write(dir.path(), "b_old.txt", b"versioned");
    write(dir.path(), "c_mid.txt", b"versioned");
    set_file_mtime(dir.path().join("a_new.txt"), FileTime::from_unix_time(3_000, 0)).unwrap();
    set_file_mtime(dir.path().join("b_old.txt"), FileTime::from_unix_time(1_000, 0)).unwrap();
    set_file_mtime(dir.path().join("c_mid.txt"), FileTime::from_unix_time(2_000, 0)).unwrap();

    let finder = DuplicateFinder::default();
    let (sets, _) = finder.find(vec![dir.path().to_path_buf()]).unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(
        names(&sets[0].paths()),
        vec!["b_old.txt", "c_mid.txt", "a_new.txt"]
    );
}

#[test]
fn test_smallest_path_policy() {
    let dir = tempdir().unwrap();
    write(dir.path(), "b.txt", b"policy");
    write(dir.path(), "a.txt", b"policy");
    set_file_mtime(dir.path().join("a.txt"), FileTime::from_unix_time(5_000, 0)).unwrap();
    set_file_mtime(dir.path().join("b.txt"), FileTime::from_unix_time(1_000, 0)).unwrap();

    let config = FinderConfig::default().with_original_policy(OriginalPolicy::SmallestPath);
    let (sets, _) = DuplicateFinder::new(config)
        .find(vec![dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(names(&sets[0].paths()), vec!["a.txt", "b.txt"]);
    assert!(sets[0].original().path.ends_with("a.txt"));
}

#[test]
fn test_every_algorithm_finds_the_same_sets() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x1", b"algorithm agnostic");
    write(dir.path(), "x2", b"algorithm agnostic");
    write(dir.path(), "y", b"algorithm agnostiC");

    for algorithm in ChecksumAlgorithm::ALL {
        let config = FinderConfig::default().with_algorithm(algorithm);
        let (sets, summary) = DuplicateFinder::new(config)
            .find(vec![dir.path().to_path_buf()])
            .unwrap();
        assert_eq!(sets.len(), 1, "{algorithm}");
        assert_eq!(sets[0].digest.algorithm(), algorithm);
        assert_eq!(sets[0].digest.len(), algorithm.digest_len());
        assert_eq!(summary.algorithm, algorithm);
    }
}

#[test]
fn test_single_stage_and_buffered_reads_agree() {
    let dir = tempdir().unwrap();
    let content = vec![42u8; 200 * 1024];
    write(dir.path(), "big1", &content);
    write(dir.path(), "big2", &content);
    write(dir.path(), "small1", b"tiny");
    write(dir.path(), "small2", b"tiny");

    let default_sets = DuplicateFinder::default()
        .find(vec![dir.path().to_path_buf()])
        .unwrap()
        .0;
    let config = FinderConfig::default()
        .with_two_stage(false)
        .with_mmap(false)
        .with_prefetch(false)
        .with_io_threads(1);
    let plain_sets = DuplicateFinder::new(config)
        .find(vec![dir.path().to_path_buf()])
        .unwrap()
        .0;

    assert_eq!(default_sets.len(), 2);
    let digests = |sets: &[std::sync::Arc<dupelint::duplicates::DuplicateSet>]| {
        let mut d: Vec<String> = sets.iter().map(|s| s.digest.to_hex()).collect();
        d.sort();
        d
    };
    assert_eq!(digests(&default_sets), digests(&plain_sets));
}

#[test]
fn test_set_ids_are_stable_across_runs() {
    let dir = tempdir().unwrap();
    for i in 0..6 {
        write(dir.path(), &format!("f{i}"), format!("group{}", i % 3).as_bytes());
    }

    let ids = || {
        DuplicateFinder::default()
            .find(vec![dir.path().to_path_buf()])
            .unwrap()
            .0
            .iter()
            .map(|s| (s.id, s.paths()))
            .collect::<Vec<_>>()
    };
    let first = ids();
    assert_eq!(first.len(), 3);
    for _ in 0..3 {
        assert_eq!(ids(), first);
    }
}
