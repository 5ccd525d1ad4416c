use dupelint::duplicates::{DuplicateFinder, FinderConfig, FinderError, RunState};
use dupelint::emitter::{Emitter, LintElement, LintSubscriber, RunOutcome};
use dupelint::scanner::{FileCandidate, HashError, ScanError};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tempfile::tempdir;

fn missing_pair() -> Vec<FileCandidate> {
    vec![
        FileCandidate::new(PathBuf::from("nonexistent_1.txt"), 100, SystemTime::now()),
        FileCandidate::new(PathBuf::from("nonexistent_2.txt"), 100, SystemTime::now()),
    ]
}

/// Make `path` unreadable. Returns false when the current user can read
/// it anyway (e.g. root).
#[cfg(unix)]
fn make_unreadable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
    File::open(path).is_err()
}

#[cfg(unix)]
fn make_readable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644)).unwrap();
}

#[cfg(unix)]
fn open_directory(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn test_run_from_candidates_continues_on_error() {
    let finder = DuplicateFinder::default();
    let emitter = Emitter::new();

    let summary = finder.run_from_candidates(missing_pair(), &emitter).unwrap();

    assert!(!summary.has_duplicates());
    assert_eq!(summary.warnings.len(), 2);
    for warning in &summary.warnings {
        assert!(warning.message.starts_with("File not found"), "{}", warning.message);
    }
}

#[test]
fn test_run_from_candidates_strict_fails() {
    let finder = DuplicateFinder::new(FinderConfig::default().with_strict(true));
    let emitter = Emitter::new();

    let result = finder.run_from_candidates(missing_pair(), &emitter);

    match result.unwrap_err() {
        FinderError::Scan(ScanError::Hash(HashError::NotFound(_))) => {}
        other => panic!("Expected NotFound hash error, got: {:?}", other),
    }
}

#[test]
fn test_cancelled_run_ends_failed() {
    #[derive(Clone, Default)]
    struct States(Arc<Mutex<Vec<RunState>>>);

    impl LintSubscriber for States {
        fn on_state_changed(&mut self, _from: RunState, to: RunState) {
            self.0.lock().unwrap().push(to);
        }
        fn on_element_added(&mut self, _element: &LintElement) {}
        fn on_finished(&mut self, outcome: &RunOutcome) {
            assert!(matches!(outcome, Err(FinderError::Cancelled)));
        }
    }

    let dir = tempdir().unwrap();
    File::create(dir.path().join("a")).unwrap().write_all(b"x").unwrap();

    let flag = Arc::new(AtomicBool::new(true));
    let finder = DuplicateFinder::new(FinderConfig::default().with_shutdown_flag(flag));
    let states = States::default();
    let emitter = Emitter::new().with_subscriber(states.clone());

    let result = finder.run(vec![dir.path().to_path_buf()], &emitter);

    assert!(matches!(result, Err(FinderError::Cancelled)));
    assert_eq!(*states.0.lock().unwrap(), vec![RunState::Failed]);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_a_warning() {
    let dir = tempdir().unwrap();
    let locked = dir.path().join("locked.bin");
    File::create(dir.path().join("a.bin")).unwrap().write_all(b"same size").unwrap();
    File::create(dir.path().join("b.bin")).unwrap().write_all(b"same size").unwrap();
    File::create(&locked).unwrap().write_all(b"same size").unwrap();
    if !make_unreadable(&locked) {
        make_readable(&locked);
        eprintln!("Skipping: permissions are not enforced for this user");
        return;
    }

    let finder = DuplicateFinder::default();
    let result = finder.find(vec![dir.path().to_path_buf()]);
    make_readable(&locked);
    let (sets, summary) = result.unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 2);
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0]
        .path
        .as_deref()
        .is_some_and(|p| p.ends_with("locked.bin")));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_aborts_strict_run() {
    let dir = tempdir().unwrap();
    let locked = dir.path().join("locked.bin");
    File::create(dir.path().join("a.bin")).unwrap().write_all(b"same size").unwrap();
    File::create(&locked).unwrap().write_all(b"same size").unwrap();
    if !make_unreadable(&locked) {
        make_readable(&locked);
        eprintln!("Skipping: permissions are not enforced for this user");
        return;
    }

    let finder = DuplicateFinder::new(FinderConfig::default().with_strict(true));
    let result = finder.find(vec![dir.path().to_path_buf()]);
    make_readable(&locked);

    match result.unwrap_err() {
        FinderError::Scan(err) => assert!(err.path().is_some_and(|p| p.ends_with("locked.bin"))),
        other => panic!("Expected a scan error, got: {:?}", other),
    }
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_a_warning() {
    let dir = tempdir().unwrap();
    let closed = dir.path().join("closed");
    fs::create_dir(&closed).unwrap();
    File::create(closed.join("inside.txt")).unwrap().write_all(b"dup").unwrap();
    File::create(dir.path().join("a.txt")).unwrap().write_all(b"dup").unwrap();
    File::create(dir.path().join("b.txt")).unwrap().write_all(b"dup").unwrap();
    if !make_unreadable(&closed) || fs::read_dir(&closed).is_ok() {
        open_directory(&closed);
        eprintln!("Skipping: permissions are not enforced for this user");
        return;
    }

    let finder = DuplicateFinder::default();
    let result = finder.find(vec![dir.path().to_path_buf()]);
    open_directory(&closed);
    let (sets, summary) = result.unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 2);
    assert!(!summary.warnings.is_empty());
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_of_unique_size_is_a_warning() {
    let dir = tempdir().unwrap();
    let locked = dir.path().join("locked.bin");
    File::create(dir.path().join("a.txt")).unwrap().write_all(b"x").unwrap();
    File::create(dir.path().join("b.txt")).unwrap().write_all(b"x").unwrap();
    File::create(dir.path().join("c.txt")).unwrap().write_all(b"y").unwrap();
    File::create(&locked).unwrap().write_all(b"7 bytes").unwrap();
    if !make_unreadable(&locked) {
        make_readable(&locked);
        eprintln!("Skipping: permissions are not enforced for this user");
        return;
    }

    let result = DuplicateFinder::default().find(vec![dir.path().to_path_buf()]);
    make_readable(&locked);
    let (sets, summary) = result.unwrap();

    assert_eq!(sets.len(), 1);
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0]
        .path
        .as_deref()
        .is_some_and(|p| p.ends_with("locked.bin")));
}

/// A directory among the candidates opens but cannot be read, whoever
/// runs the tests.
fn candidates_with_directory(dir: &Path) -> (Vec<FileCandidate>, PathBuf) {
    let file = dir.join("file.bin");
    let subdir = dir.join("subdir");
    fs::write(&file, b"nine byte").unwrap();
    fs::create_dir(&subdir).unwrap();
    // keeps the directory's reported length above zero on every filesystem
    fs::write(subdir.join("entry"), b"x").unwrap();
    let now = SystemTime::now();
    let candidates = vec![
        FileCandidate::new(file.clone(), 9, now),
        FileCandidate::new(subdir.clone(), 9, now),
    ];
    (candidates, subdir)
}

#[test]
fn test_unreadable_candidate_is_a_warning() {
    let dir = tempdir().unwrap();
    let (candidates, subdir) = candidates_with_directory(dir.path());

    let summary = DuplicateFinder::default()
        .run_from_candidates(candidates, &Emitter::new())
        .unwrap();

    assert!(!summary.has_duplicates());
    assert_eq!(summary.warnings.len(), 1);
    assert_eq!(summary.warnings[0].path.as_deref(), Some(subdir.as_path()));
}

#[test]
fn test_unreadable_candidate_aborts_strict_run() {
    let dir = tempdir().unwrap();
    let (candidates, subdir) = candidates_with_directory(dir.path());

    let states = Arc::new(Mutex::new(Vec::new()));
    #[derive(Clone)]
    struct Last(Arc<Mutex<Vec<RunState>>>);
    impl LintSubscriber for Last {
        fn on_state_changed(&mut self, _from: RunState, to: RunState) {
            self.0.lock().unwrap().push(to);
        }
        fn on_element_added(&mut self, _element: &LintElement) {}
        fn on_finished(&mut self, _outcome: &RunOutcome) {}
    }
    let emitter = Emitter::new().with_subscriber(Last(Arc::clone(&states)));

    let finder = DuplicateFinder::new(FinderConfig::default().with_strict(true));
    let err = finder.run_from_candidates(candidates, &emitter).unwrap_err();

    match err {
        FinderError::Scan(err) => assert_eq!(err.path(), Some(subdir.as_path())),
        other => panic!("Expected a scan error, got: {:?}", other),
    }
    assert_eq!(states.lock().unwrap().last(), Some(&RunState::Failed));
}
