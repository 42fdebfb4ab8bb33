//! Engine behaviour against in-memory and failure-injecting trees

use crossbeam::channel::bounded;
use crossbeam::queue::SegQueue;
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use treescan::parallel::Task;
use treescan::scan::sink;
use treescan::{
    Executor, FileScanner, MemoryTree, RayonExecutor, ScanControl, ScanError, ThreadExecutor,
    TreeEntry, TreeProvider,
};

fn example_tree() -> MemoryTree {
    MemoryTree::from_files(["a/x.txt", "a/b/y.txt", "c/z.txt"])
}

/// Five top-level directories, four subdirectories each, two files per leaf
fn wide_tree() -> MemoryTree {
    let mut tree = MemoryTree::new().with_file("top.txt");
    for d in 0..5 {
        for s in 0..4 {
            tree = tree
                .with_file(&format!("d{d}/s{s}/f0.txt"))
                .with_file(&format!("d{d}/s{s}/f1.rs"));
        }
        tree = tree.with_file(&format!("d{d}/notes.txt"));
    }
    tree
}

fn as_set(paths: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    paths.into_iter().collect()
}

fn wait_for_workers(control: &ScanControl) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while control.live_workers() > 0 {
        assert!(Instant::now() < deadline, "workers still running after cancel");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Fails (or panics) when asked to list one particular directory
struct FailingTree {
    inner: MemoryTree,
    broken: &'static str,
    panic: bool,
    calls: AtomicUsize,
}

impl FailingTree {
    fn new(inner: MemoryTree, broken: &'static str) -> Self {
        Self {
            inner,
            broken,
            panic: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }
}

impl TreeProvider for FailingTree {
    fn list(&self, dir: &str) -> io::Result<Vec<TreeEntry>> {
        if dir == self.broken {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("provider exploded at {dir}");
            }
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }
        self.inner.list(dir)
    }
}

/// Sleeps before every listing so a scan is still running when we act on it
struct SlowTree {
    inner: MemoryTree,
    delay: Duration,
}

impl TreeProvider for SlowTree {
    fn list(&self, dir: &str) -> io::Result<Vec<TreeEntry>> {
        thread::sleep(self.delay);
        self.inner.list(dir)
    }
}

/// Never runs anything
struct RefusingExecutor;

impl Executor for RefusingExecutor {
    fn submit(&self, _task: Task) -> treescan::Result<()> {
        Err(ScanError::Spawn(io::Error::other("executor is shut down")))
    }
}

#[test]
fn test_emitted_set_equals_matching_tree_paths() {
    let tree = wide_tree();
    let expected: BTreeSet<String> = tree
        .files()
        .into_iter()
        .filter(|path| path.ends_with(".txt"))
        .collect();

    let scanner = FileScanner::new(tree).add_glob("**/*.txt").unwrap();
    let results: Vec<String> = scanner.scan().collect();

    assert_eq!(results.len(), expected.len(), "duplicates in {results:?}");
    assert_eq!(as_set(results), expected);
}

#[test]
fn test_directories_are_emitted_when_enabled() {
    let tree = wide_tree();
    let expected: BTreeSet<String> = tree
        .dirs()
        .into_iter()
        .filter(|dir| dir.starts_with("d2/"))
        .map(str::to_string)
        .collect();

    let scanner = FileScanner::new(tree)
        .add_glob("d2/**")
        .unwrap()
        .with_files(false)
        .with_directories(true);
    assert_eq!(as_set(scanner.scan()), expected);
}

#[test]
fn test_result_set_independent_of_worker_count() {
    let single = FileScanner::new(wide_tree())
        .add_glob("**/f?.*")
        .unwrap()
        .with_max_workers(1);
    let many = FileScanner::new(wide_tree())
        .add_glob("**/f?.*")
        .unwrap()
        .with_max_workers(16);

    let one = single.collect_sorted();
    assert_eq!(one.len(), 40);
    assert_eq!(one, many.collect_sorted());
}

#[test]
fn test_rayon_executor_finds_same_paths() {
    let threaded = FileScanner::new(wide_tree()).add_glob("d1/**").unwrap();
    let pooled = FileScanner::new(wide_tree())
        .add_glob("d1/**")
        .unwrap()
        .with_executor(RayonExecutor::with_threads(2).unwrap());

    assert_eq!(threaded.collect_sorted(), pooled.collect_sorted());
    assert_eq!(
        FileScanner::new(wide_tree())
            .add_glob("d1/**")
            .unwrap()
            .with_executor(RayonExecutor::global())
            .collect_sorted()
            .len(),
        9
    );
}

#[test]
fn test_example_globstar_with_empty_prefix() {
    let scanner = FileScanner::new(example_tree()).add_glob("**/*.txt").unwrap();
    assert_eq!(
        scanner.collect_sorted(),
        vec!["a/b/y.txt", "a/x.txt", "c/z.txt"]
    );
}

#[test]
fn test_example_with_rooted_paths() {
    // a separator-rooted tree shows up either through the prefix or the anchor
    let prefixed = FileScanner::new(example_tree())
        .add_glob("**/*.txt")
        .unwrap()
        .with_root_prefix("/");
    assert_eq!(
        prefixed.collect_sorted(),
        vec!["/a/b/y.txt", "/a/x.txt", "/c/z.txt"]
    );

    let rooted = FileScanner::new(example_tree()).add_glob("/**/*.txt").unwrap();
    assert_eq!(
        rooted.collect_sorted(),
        vec!["/a/b/y.txt", "/a/x.txt", "/c/z.txt"]
    );
}

#[test]
fn test_example_non_recursive_pattern() {
    let scanner = FileScanner::new(example_tree()).add_glob("a/*.txt").unwrap();
    assert_eq!(scanner.collect_sorted(), vec!["a/x.txt"]);

    let wildcard = FileScanner::new(example_tree()).add_wildcard("a/*.txt").unwrap();
    assert_eq!(wildcard.collect_sorted(), vec!["a/x.txt"]);
}

#[test]
fn test_overlapping_patterns_in_one_set_emit_once() {
    let scanner = FileScanner::new(example_tree())
        .add_glob("a/*.txt")
        .unwrap()
        .add_wildcard("a/x*")
        .unwrap();
    assert_eq!(scanner.pattern_sets().len(), 1);
    assert_eq!(scanner.collect_sorted(), vec!["a/x.txt"]);
}

#[test]
fn test_overlapping_anchors_emit_once_per_set() {
    let scanner = FileScanner::new(example_tree())
        .add_glob("a/*.txt")
        .unwrap()
        .add_glob("**/x.txt")
        .unwrap();
    assert_eq!(scanner.collect_sorted(), vec!["a/x.txt", "a/x.txt"]);
}

#[test]
fn test_regex_with_explicit_anchor() {
    let scanner = FileScanner::new(wide_tree())
        .add_regex("d3", r"/s[02]/.*\.rs$")
        .unwrap();
    assert_eq!(
        scanner.collect_sorted(),
        vec!["d3/s0/f1.rs", "d3/s2/f1.rs"]
    );
}

#[test]
fn test_descent_filter_prunes_subtree() {
    let tree = MemoryTree::from_files(["a/x.txt", "a/b/y.txt", "a/b/c/z.txt", "a/bb/w.txt"]);
    let scanner = FileScanner::new(tree)
        .add_glob("**/*.txt")
        .unwrap()
        .with_descent_filter(|path| path != "a/b");

    assert_eq!(scanner.collect_sorted(), vec!["a/bb/w.txt", "a/x.txt"]);
}

#[test]
fn test_descent_filter_does_not_hide_directory_itself() {
    let scanner = FileScanner::new(example_tree())
        .add_glob("a/*")
        .unwrap()
        .with_directories(true)
        .with_descent_filter(|path| path != "a/b");

    assert_eq!(scanner.collect_sorted(), vec!["a/b", "a/x.txt"]);
}

#[test]
fn test_listing_failure_is_recorded_once() {
    let tree = Arc::new(FailingTree::new(
        MemoryTree::from_files(["x/1.txt", "x/deep/2.txt", "y/3.txt", "y/z/4.txt"]),
        "x",
    ));
    let errors = Arc::new(SegQueue::new());
    let scanner = FileScanner::from_arc(tree.clone())
        .add_glob("**/*.txt")
        .unwrap()
        .with_error_sink(errors.clone());

    assert_eq!(scanner.collect_sorted(), vec!["y/3.txt", "y/z/4.txt"]);

    let errors = sink::drain(&errors);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path(), Some("x"));
    assert!(errors[0].is_recoverable());
    assert!(matches!(&errors[0], ScanError::Listing { source, .. }
        if source.kind() == io::ErrorKind::PermissionDenied));
    assert_eq!(tree.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_provider_panic_is_contained() {
    let tree = FailingTree::new(
        MemoryTree::from_files(["x/1.txt", "y/3.txt", "y/z/4.txt"]),
        "x",
    )
    .panicking();
    let errors = Arc::new(SegQueue::new());
    let scanner = FileScanner::new(tree)
        .add_glob("**/*.txt")
        .unwrap()
        .with_error_sink(errors.clone());

    let mut handle = scanner.scan();
    let control = handle.control().unwrap();
    let mut results: Vec<String> = handle.by_ref().collect();
    results.sort();

    assert_eq!(results, vec!["y/3.txt", "y/z/4.txt"]);
    assert!(control.is_completed());

    let errors = sink::drain(&errors);
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ScanError::ProviderPanicked { path, message } => {
            assert_eq!(path, "x");
            assert!(message.contains("exploded"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_panicking_descent_filter_is_contained() {
    let tree = MemoryTree::from_files(["a/x.txt", "b/y.txt"]);
    let errors = Arc::new(SegQueue::new());
    let scanner = FileScanner::new(tree)
        .add_glob("**/*.txt")
        .unwrap()
        .with_error_sink(errors.clone())
        .with_descent_filter(|path| {
            if path == "a" {
                panic!("filter exploded at {path}");
            }
            true
        });

    // consume on another thread so a stuck scan fails the test instead of hanging it
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(scanner.collect_sorted());
    });
    let results = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("scan did not finish");
    assert_eq!(results, vec!["b/y.txt"]);

    let errors = sink::drain(&errors);
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ScanError::FilterPanicked { path, message } => {
            assert_eq!(path, "a");
            assert!(message.contains("exploded"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_workers_grow_with_backlog_up_to_cap() {
    let executor = Arc::new(ThreadExecutor::new("elastic"));
    let scanner = FileScanner::new(wide_tree())
        .add_glob("**")
        .unwrap()
        .with_executor(executor.clone())
        .with_max_workers(4);
    assert_eq!(scanner.pattern_sets().len(), 1);

    let mut handle = scanner.scan();
    let control = handle.control().unwrap();
    assert_eq!(handle.by_ref().count(), 46);
    wait_for_workers(&control);

    // one seed starts one worker; the root listing alone queues five directories
    let spawned = executor.spawned();
    assert!(spawned > 1, "backlog never started extra workers");
    assert!(spawned <= 4, "{spawned} workers exceed the cap");
}

#[test]
fn test_missing_anchor_is_reported_not_fatal() {
    let errors = Arc::new(SegQueue::new());
    let scanner = FileScanner::new(example_tree())
        .add_glob("missing/*.txt")
        .unwrap()
        .add_glob("c/*.txt")
        .unwrap()
        .with_error_sink(errors.clone());

    assert_eq!(scanner.collect_sorted(), vec!["c/z.txt"]);
    let errors = sink::drain(&errors);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path(), Some("missing"));
}

#[test]
fn test_dispose_stops_iteration_and_workers() {
    let tree = SlowTree {
        inner: wide_tree(),
        delay: Duration::from_millis(20),
    };
    let scanner = FileScanner::new(tree).add_glob("**").unwrap();

    let mut handle = scanner.scan();
    let control = handle.control().unwrap();
    handle.dispose();

    assert!(handle.is_disposed());
    assert_eq!(handle.next(), None);
    assert!(handle.control().is_none());
    assert!(matches!(handle.reset(), Err(ScanError::Disposed)));

    assert!(control.is_finished());
    assert!(!control.is_completed());
    wait_for_workers(&control);
}

#[test]
fn test_cancel_from_another_thread_unblocks_consumer() {
    let tree = SlowTree {
        inner: wide_tree(),
        delay: Duration::from_millis(200),
    };
    // nothing matches, so the consumer blocks until the scan ends
    let scanner = FileScanner::new(tree).add_glob("**/*.none").unwrap();

    let mut handle = scanner.scan();
    let control = handle.control().unwrap();
    let canceller = {
        let control = control.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            control.cancel();
        })
    };

    let started = Instant::now();
    assert_eq!(handle.next(), None);
    assert!(started.elapsed() < Duration::from_secs(2));
    canceller.join().unwrap();

    assert!(control.is_finished());
    assert!(!control.is_completed());
    wait_for_workers(&control);
}

#[test]
fn test_dropping_handle_cancels_scan() {
    let tree = SlowTree {
        inner: wide_tree(),
        delay: Duration::from_millis(20),
    };
    let scanner = FileScanner::new(tree).add_glob("**").unwrap();

    let handle = scanner.scan();
    let control = handle.control().unwrap();
    drop(handle);

    assert!(control.is_finished());
    wait_for_workers(&control);
}

#[test]
fn test_reset_reproduces_result_set() {
    let scanner = FileScanner::new(wide_tree()).add_glob("**/*.rs").unwrap();
    let mut handle = scanner.scan();

    let first = as_set(handle.by_ref());
    assert_eq!(first.len(), 20);
    assert_eq!(handle.next(), None);

    handle.reset().unwrap();
    let second = as_set(handle.by_ref());
    assert_eq!(first, second);
}

#[test]
fn test_reset_mid_scan_starts_over() {
    let scanner = FileScanner::new(wide_tree()).add_glob("**/*.txt").unwrap();
    let expected = scanner.collect_sorted();

    let mut handle = scanner.scan();
    let old = handle.control().unwrap();
    assert!(handle.next().is_some());

    handle.reset().unwrap();
    assert!(old.is_finished());

    let mut all: Vec<String> = handle.collect();
    all.sort();
    assert_eq!(all, expected);
    wait_for_workers(&old);
}

#[test]
fn test_natural_completion_releases_workers() {
    let scanner = FileScanner::new(wide_tree())
        .add_glob("**")
        .unwrap()
        .with_directories(true);
    let mut handle = scanner.scan();
    let control = handle.control().unwrap();

    let count = handle.by_ref().count();
    // 1 top file, 5 dirs with 4 subdirs, 8 files under subdirs and a notes file
    assert_eq!(count, 1 + 5 * (1 + 4 + 8 + 1));
    assert!(control.is_completed());
    wait_for_workers(&control);
}

#[test]
fn test_independent_scans_from_one_scanner() {
    let scanner = FileScanner::new(wide_tree()).add_glob("d0/**/*.txt").unwrap();
    let mut a = scanner.scan();
    let b = scanner.scan();

    a.dispose();
    let mut found: Vec<String> = b.collect();
    found.sort();
    assert_eq!(found.len(), 5);
    assert_eq!(found[0], "d0/notes.txt");
}

#[test]
fn test_executor_that_cannot_start_workers_does_not_hang() {
    let errors = Arc::new(SegQueue::new());
    let scanner = FileScanner::new(example_tree())
        .add_glob("**")
        .unwrap()
        .with_executor(RefusingExecutor)
        .with_error_sink(errors.clone());

    let mut handle = scanner.scan();
    assert_eq!(handle.next(), None);

    let errors = sink::drain(&errors);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ScanError::Spawn(_)));
}

#[test]
fn test_empty_root_completes() {
    let scanner = FileScanner::new(MemoryTree::new()).add_glob("**/*").unwrap();
    let mut handle = scanner.scan();
    let control = handle.control().unwrap();
    assert_eq!(handle.next(), None);
    assert!(control.is_completed());
}
