use dupelint::duplicates::{DirectoryGroup, DuplicateFinder, FinderConfig};
use dupelint::emitter::{Emitter, LintElement, LintSubscriber, RunOutcome};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

#[derive(Clone, Default)]
struct Groups(Arc<Mutex<Vec<DirectoryGroup>>>);

impl LintSubscriber for Groups {
    fn on_element_added(&mut self, _element: &LintElement) {}

    fn on_directory_group(&mut self, group: &DirectoryGroup) {
        self.0.lock().unwrap().push(group.clone());
    }

    fn on_finished(&mut self, _outcome: &RunOutcome) {}
}

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn directory_groups(root: &Path, merge: bool) -> (Vec<DirectoryGroup>, usize) {
    let groups = Groups::default();
    let emitter = Emitter::new().with_subscriber(groups.clone());
    let finder = DuplicateFinder::new(FinderConfig::default().with_merge_directories(merge));
    let summary = finder.run(vec![root.to_path_buf()], &emitter).unwrap();
    let found = groups.0.lock().unwrap().clone();
    assert_eq!(found.len(), summary.directory_groups);
    (found, summary.duplicate_sets)
}

fn names(group: &DirectoryGroup) -> Vec<String> {
    group
        .directories
        .iter()
        .map(|d| d.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_copied_directory_is_reported() {
    let dir = tempdir().unwrap();
    for copy in ["photos", "photos-backup"] {
        write(dir.path(), &format!("{copy}/one.jpg"), "first image");
        write(dir.path(), &format!("{copy}/two.jpg"), "second image!");
    }
    write(dir.path(), "unrelated.txt", "something else");

    let (groups, sets) = directory_groups(dir.path(), true);

    assert_eq!(sets, 2);
    assert_eq!(groups.len(), 1);
    assert_eq!(names(&groups[0]), vec!["photos", "photos-backup"]);
    assert_eq!(groups[0].file_count, 2);
    assert_eq!(groups[0].digest_count, 2);
}

#[test]
fn test_directory_groups_are_off_by_default() {
    let dir = tempdir().unwrap();
    for copy in ["a", "b"] {
        write(dir.path(), &format!("{copy}/file.txt"), "content");
    }

    let (groups, sets) = directory_groups(dir.path(), false);
    assert_eq!(sets, 1);
    assert!(groups.is_empty());
}

#[test]
fn test_extra_file_breaks_equality() {
    let dir = tempdir().unwrap();
    for copy in ["a", "b"] {
        write(dir.path(), &format!("{copy}/file.txt"), "content");
    }
    write(dir.path(), "b/extra.txt", "only in b");

    let (groups, _) = directory_groups(dir.path(), true);
    assert!(groups.is_empty());
}

#[test]
fn test_only_the_topmost_equal_directories_are_reported() {
    let dir = tempdir().unwrap();
    for copy in ["left", "right"] {
        write(dir.path(), &format!("{copy}/top.txt"), "top level");
        write(dir.path(), &format!("{copy}/nested/deep.txt"), "deep level");
    }

    let (groups, sets) = directory_groups(dir.path(), true);

    assert_eq!(sets, 2);
    assert_eq!(groups.len(), 1);
    assert_eq!(names(&groups[0]), vec!["left", "right"]);
    assert_eq!(groups[0].file_count, 2);
}
