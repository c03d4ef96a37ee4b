#![cfg(unix)]

mod common;

use branch_keeper::core::deletion::requests_for;
use branch_keeper::core::{
    AnalysisOptions, AnalysisPipeline, BranchCache, DeletionCoordinator, DeletionOptions,
    DeletionOutcome, NullSink,
};
use common::{settings, TestRepo};

/// Names git accepts but a shell would interpret.
const HOSTILE: &[&str] = &[
    "fix;touch-semicolon",
    "fix$(touch-subshell)",
    "fix`touch-backtick`",
    "fix&&touch-and",
    "fix|tee-pipe",
    "fix'quote\"double",
];

/// Branch names reach git as single argv entries and are never interpreted.
#[test]
fn test_hostile_branch_names_are_handled_literally() {
    let repo = TestRepo::new();
    for (i, name) in HOSTILE.iter().enumerate() {
        repo.feature(name, &format!("hostile-{i}.txt"));
        repo.push(name);
        repo.merge_no_ff(name);
    }
    repo.push("main");

    let settings = settings();
    let git = repo.keeper();
    let cache = BranchCache::in_memory(settings.cache_ttl());
    let report = AnalysisPipeline::new(&git, &settings, &cache)
        .analyze(&AnalysisOptions::default())
        .unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    for name in HOSTILE {
        assert!(report.get(name).is_some(), "{name} missing from analysis");
    }

    let requests = requests_for(&report.results, false);
    assert_eq!(requests.len(), HOSTILE.len());
    let outcomes = DeletionCoordinator::new(&git, &settings).delete(
        &requests,
        &report.results,
        &DeletionOptions::default(),
        &mut NullSink,
    );

    for outcome in &outcomes {
        assert!(matches!(outcome, DeletionOutcome::Deleted { .. }), "{outcome:?}");
    }
    for name in HOSTILE {
        assert!(!repo.has_local(name));
        assert!(!repo.has_on_origin(name));
    }

    let stray: Vec<_> = std::fs::read_dir(&repo.work)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("touch") || name.starts_with("tee"))
        .collect();
    assert!(stray.is_empty(), "shell side effects: {stray:?}");
}

/// A name that only resembles a protected branch is not protected.
#[test]
fn test_protection_is_exact_match() {
    let repo = TestRepo::new();
    repo.feature("main-backup", "backup.txt");
    repo.merge_no_ff("main-backup");

    let settings = settings();
    let git = repo.keeper();
    let cache = BranchCache::in_memory(settings.cache_ttl());
    let report = AnalysisPipeline::new(&git, &settings, &cache)
        .analyze(&AnalysisOptions::default())
        .unwrap();

    assert!(report.get("main").unwrap().branch.protected);
    assert!(!report.get("main-backup").unwrap().branch.protected);
    let requests = requests_for(&report.results, false);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].branch, "main-backup");
}
