#![cfg(unix)]

mod common;

use branch_keeper::core::model::BranchResult;
use branch_keeper::core::{
    AnalysisOptions, AnalysisPipeline, BranchCache, CancelToken, DeletionCoordinator,
    DeletionOptions, DeletionOutcome, NullSink,
};
use branch_keeper::core::deletion::requests_for;
use common::{settings, TestRepo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn populated_repo(merged: usize, active: usize) -> TestRepo {
    let repo = TestRepo::new();
    for i in 0..merged {
        let name = format!("feature/merged-{i}");
        repo.feature(&name, &format!("merged-{i}.txt"));
        repo.push(&name);
        repo.merge_no_ff(&name);
    }
    for i in 0..active {
        repo.feature(&format!("feature/active-{i}"), &format!("active-{i}.txt"));
    }
    repo.push("main");
    repo
}

fn summary(results: &[BranchResult]) -> Vec<(String, String, String)> {
    results
        .iter()
        .map(|r| (r.name().to_string(), r.status.to_string(), r.sync.to_string()))
        .collect()
}

/// Results must not depend on how many workers analysed them.
#[test]
fn test_analysis_is_deterministic_across_worker_counts() {
    let repo = populated_repo(4, 4);
    let git = repo.keeper();

    let mut baseline = None;
    for workers in [1, 2, 8] {
        let mut settings = settings();
        settings.workers = workers;
        let cache = BranchCache::in_memory(settings.cache_ttl());
        let report = AnalysisPipeline::new(&git, &settings, &cache)
            .analyze(&AnalysisOptions::default())
            .unwrap();
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.results.len(), 9);

        let current = summary(&report.results);
        match &baseline {
            None => baseline = Some(current),
            Some(expected) => assert_eq!(&current, expected, "workers = {workers}"),
        }
    }
}

/// Independent pipelines sharing one cache from several threads.
#[test]
fn test_concurrent_runs_share_cache() {
    let repo = populated_repo(2, 2);
    let settings = settings();
    let cache = Arc::new(BranchCache::in_memory(settings.cache_ttl()));
    let progress_calls = AtomicUsize::new(0);

    let reports: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let settings = &settings;
                let repo = &repo;
                let progress_calls = &progress_calls;
                scope.spawn(move || {
                    let git = repo.keeper();
                    let progress = |_: &str| {
                        progress_calls.fetch_add(1, Ordering::Relaxed);
                    };
                    let options = AnalysisOptions {
                        progress: Some(&progress as &(dyn Fn(&str) + Sync)),
                        ..AnalysisOptions::default()
                    };
                    AnalysisPipeline::new(&git, settings, &cache)
                        .analyze(&options)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = summary(&reports[0].results);
    for report in &reports[1..] {
        assert_eq!(summary(&report.results), first);
    }
    assert_eq!(progress_calls.load(Ordering::Relaxed), 4 * 5);
    assert!(!cache.is_empty());
}

/// Parallel deletions against one remote must all land.
#[test]
fn test_parallel_deletions_against_one_remote() {
    let repo = populated_repo(6, 1);
    let mut settings = settings();
    settings.workers = 6;
    let git = repo.keeper();
    let cache = BranchCache::in_memory(settings.cache_ttl());

    let report = AnalysisPipeline::new(&git, &settings, &cache)
        .analyze(&AnalysisOptions::default())
        .unwrap();
    let requests = requests_for(&report.results, false);
    assert_eq!(requests.len(), 6);

    let outcomes = DeletionCoordinator::new(&git, &settings).with_cache(&cache).delete(
        &requests,
        &report.results,
        &DeletionOptions::default(),
        &mut NullSink,
    );

    assert_eq!(outcomes.len(), 6);
    for (request, outcome) in requests.iter().zip(&outcomes) {
        assert_eq!(outcome.branch(), request.branch);
        assert!(
            matches!(outcome, DeletionOutcome::Deleted { remote_deleted: true, .. }),
            "{outcome:?}"
        );
        assert!(!repo.has_local(&request.branch));
        assert!(!repo.has_on_origin(&request.branch));
    }
    assert!(repo.has_local("feature/active-0"));
}

#[test]
fn test_cancelled_deletion_does_nothing() {
    let repo = populated_repo(2, 0);
    let settings = settings();
    let git = repo.keeper();
    let cache = BranchCache::in_memory(settings.cache_ttl());
    let report = AnalysisPipeline::new(&git, &settings, &cache)
        .analyze(&AnalysisOptions::default())
        .unwrap();
    let requests = requests_for(&report.results, false);

    let cancel = CancelToken::new();
    cancel.cancel();
    let options = DeletionOptions {
        cancel,
        ..DeletionOptions::default()
    };
    let outcomes = DeletionCoordinator::new(&git, &settings).delete(
        &requests,
        &report.results,
        &options,
        &mut NullSink,
    );

    assert!(outcomes.is_empty());
    assert!(repo.has_local("feature/merged-0"));
    assert!(repo.has_local("feature/merged-1"));
}
