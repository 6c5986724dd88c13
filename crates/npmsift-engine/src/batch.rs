//! Parallel batch runner.
//!
//! Packages are processed on a rayon pool; each finished outcome is sent back
//! over a channel and handed to the sink on the calling thread, in completion
//! order. The stop flag is checked before a package starts, so an interrupted
//! run never leaves a package half-reported.

use crate::discovery::PackageTarget;
use crate::error::{BatchError, OutputError};
use crate::features::{extract_features_from_tree, FeatureReport};
use crate::fingerprint::{fingerprint_tree, Fingerprint};
use crate::tree::PackageTree;
use crate::types::{PackageIdentity, PackageStatus};
use npmsift_core::config::ScanConfig;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

/// Stack for pool threads; syntax lowering and walking recurse per tree level.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Packages already written by an earlier run.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    seen: HashSet<PackageIdentity>,
}

impl ProcessedSet {
    pub fn insert(&mut self, identity: PackageIdentity) -> bool {
        self.seen.insert(identity)
    }

    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.seen.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Packages present in both sets.
    pub fn intersection(&self, other: &ProcessedSet) -> ProcessedSet {
        ProcessedSet {
            seen: self.seen.intersection(&other.seen).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub config: ScanConfig,
    pub fingerprint: bool,
    pub features: bool,
    /// Targets whose identity is in here are skipped
    pub skip: ProcessedSet,
    /// Set from outside (Ctrl-C) to stop before the next package
    pub cancel: Arc<AtomicBool>,
}

impl BatchOptions {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            fingerprint: true,
            features: true,
            skip: ProcessedSet::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Everything computed for one package.
#[derive(Debug)]
pub struct PackageOutcome {
    pub identity: PackageIdentity,
    pub path: PathBuf,
    pub fingerprint: Option<Fingerprint>,
    /// `None` when features were not requested or the package failed
    pub features: Option<FeatureReport>,
    /// Reasons the package failed
    pub errors: Vec<String>,
    pub elapsed: Duration,
}

impl PackageOutcome {
    pub fn status(&self) -> PackageStatus {
        if !self.errors.is_empty() {
            PackageStatus::Failed
        } else if self
            .features
            .as_ref()
            .is_some_and(|f| !f.degradations.is_empty())
        {
            PackageStatus::Degraded
        } else {
            PackageStatus::Ok
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub ok: usize,
    pub degraded: usize,
    pub failed: usize,
    /// Already processed in an earlier run
    pub skipped: usize,
    /// Not started because the run was stopped
    pub not_started: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.ok + self.degraded + self.failed
    }

    fn record(&mut self, status: PackageStatus) {
        match status {
            PackageStatus::Ok => self.ok += 1,
            PackageStatus::Degraded => self.degraded += 1,
            PackageStatus::Failed => self.failed += 1,
        }
    }
}

/// Fingerprint and/or extract features for one package, within the
/// configured time budget.
pub fn process_package(target: &PackageTarget, options: &BatchOptions) -> PackageOutcome {
    let budget = options.config.package_timeout_secs;
    let deadline = (budget > 0).then(|| Instant::now() + Duration::from_secs(budget));
    process_package_until(target, options, deadline)
}

/// Like [`process_package`] with an explicit deadline for feature extraction.
/// Running out of time fails the package.
pub fn process_package_until(
    target: &PackageTarget,
    options: &BatchOptions,
    deadline: Option<Instant>,
) -> PackageOutcome {
    let started = Instant::now();

    let mut outcome = PackageOutcome {
        identity: target.identity.clone(),
        path: target.path.clone(),
        fingerprint: None,
        features: None,
        errors: Vec::new(),
        elapsed: Duration::ZERO,
    };

    match PackageTree::walk(&target.path) {
        Err(e) => outcome.errors.push(e.to_string()),
        Ok(tree) => {
            if options.fingerprint {
                match fingerprint_tree(&tree) {
                    Ok(fp) => outcome.fingerprint = Some(fp),
                    Err(e) => outcome.errors.push(format!("fingerprint: {}", e)),
                }
            }
            if options.features {
                match extract_features_from_tree(&tree, &options.config, deadline) {
                    Ok(report) if report.timed_out => outcome
                        .errors
                        .push(format!("features: timed out after {:?}", started.elapsed())),
                    Ok(report) => outcome.features = Some(report),
                    Err(e) => outcome.errors.push(format!("features: {}", e)),
                }
            }
        }
    }

    outcome.elapsed = started.elapsed();
    match outcome.status() {
        PackageStatus::Failed => tracing::warn!(
            package = %outcome.identity,
            errors = ?outcome.errors,
            "package failed"
        ),
        status => tracing::debug!(
            package = %outcome.identity,
            %status,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "package done"
        ),
    }
    outcome
}

/// Run `targets` in parallel, feeding each outcome to `sink` as it completes.
///
/// A sink error stops the run: packages not yet started are dropped and the
/// error is returned after in-flight packages finish.
pub fn run_batch<F>(targets: &[PackageTarget], options: &BatchOptions, mut sink: F) -> Result<BatchSummary, BatchError>
where
    F: FnMut(&PackageOutcome) -> Result<(), OutputError>,
{
    let mut summary = BatchSummary::default();
    let pending: Vec<&PackageTarget> = targets
        .iter()
        .filter(|t| {
            let skip = options.skip.contains(&t.identity);
            if skip {
                summary.skipped += 1;
            }
            !skip
        })
        .collect();
    if summary.skipped > 0 {
        tracing::info!(skipped = summary.skipped, "skipping already processed packages");
    }

    let mut builder = rayon::ThreadPoolBuilder::new().stack_size(WORKER_STACK_SIZE);
    if let Some(n) = options.config.workers {
        builder = builder.num_threads(n);
    }
    let pool = builder.build()?;

    let stop = AtomicBool::new(false);
    let stopped = || stop.load(Ordering::SeqCst) || options.cancel.load(Ordering::SeqCst);
    let (tx, rx) = mpsc::channel::<Option<PackageOutcome>>();
    let mut sink_error = None;

    std::thread::scope(|scope| {
        scope.spawn(|| {
            pool.install(|| {
                pending.par_iter().for_each_with(tx, |tx, target| {
                    if stopped() {
                        let _ = tx.send(None);
                        return;
                    }
                    let _ = tx.send(Some(process_package(target, options)));
                });
            });
        });

        for message in rx {
            let Some(outcome) = message else {
                summary.not_started += 1;
                continue;
            };
            summary.record(outcome.status());
            if sink_error.is_none() {
                if let Err(e) = sink(&outcome) {
                    tracing::error!("stopping batch: {}", e);
                    stop.store(true, Ordering::SeqCst);
                    sink_error = Some(e);
                }
            }
        }
    });

    summary.cancelled = options.cancel.load(Ordering::SeqCst);
    if let Some(e) = sink_error {
        return Err(e.into());
    }
    tracing::info!(
        ok = summary.ok,
        degraded = summary.degraded,
        failed = summary.failed,
        skipped = summary.skipped,
        not_started = summary.not_started,
        "batch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn package(root: &Path, name: &str, files: &[(&str, &str)]) -> PackageTarget {
        let dir = root.join(name);
        for (rel, content) in files {
            let path = dir.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        fs::create_dir_all(&dir).unwrap();
        PackageTarget {
            identity: PackageIdentity::unversioned(name),
            path: dir,
        }
    }

    fn collect(targets: &[PackageTarget], options: &BatchOptions) -> (BatchSummary, Vec<String>) {
        let mut seen = Vec::new();
        let summary = run_batch(targets, options, |o| {
            seen.push(format!("{}:{}", o.identity, o.status()));
            Ok(())
        })
        .unwrap();
        seen.sort();
        (summary, seen)
    }

    #[test]
    fn test_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![
            package(dir.path(), "clean", &[("index.js", "module.exports = 1;")]),
            package(dir.path(), "broken", &[("index.js", "function ((( {")]),
            PackageTarget {
                identity: PackageIdentity::unversioned("gone"),
                path: dir.path().join("gone"),
            },
        ];
        let (summary, seen) = collect(&targets, &BatchOptions::new(ScanConfig::default()));
        assert_eq!(seen, vec!["broken:degraded", "clean:ok", "gone:failed"]);
        assert_eq!(summary.processed(), 3);
        assert_eq!(summary.failed, 1);
        assert!(!summary.cancelled);
    }

    #[test]
    fn test_resume_skips_processed() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![
            package(dir.path(), "a", &[("a.js", "1")]),
            package(dir.path(), "b", &[("b.js", "2")]),
        ];
        let mut options = BatchOptions::new(ScanConfig::default());
        options.skip.insert(PackageIdentity::unversioned("a"));
        let (summary, seen) = collect(&targets, &options);
        assert_eq!(seen, vec!["b:ok"]);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_processed_set_intersection() {
        let mut hashes = ProcessedSet::default();
        let mut features = ProcessedSet::default();
        hashes.insert(PackageIdentity::unversioned("a"));
        hashes.insert(PackageIdentity::unversioned("b"));
        features.insert(PackageIdentity::unversioned("b"));
        let both = hashes.intersection(&features);
        assert_eq!(both.len(), 1);
        assert!(both.contains(&PackageIdentity::unversioned("b")));
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![package(dir.path(), "a", &[("a.js", "1")])];
        let options = BatchOptions::new(ScanConfig::default());
        options.cancel.store(true, Ordering::SeqCst);
        let (summary, seen) = collect(&targets, &options);
        assert!(seen.is_empty());
        assert_eq!(summary.not_started, 1);
        assert!(summary.cancelled);
    }

    #[test]
    fn test_sink_error_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![package(dir.path(), "a", &[("a.js", "1")])];
        let result = run_batch(&targets, &BatchOptions::new(ScanConfig::default()), |_| {
            Err(OutputError::Io(std::io::Error::other("disk full")))
        });
        assert!(matches!(result, Err(BatchError::Output(_))));
    }

    #[test]
    fn test_timeout_fails_package_but_keeps_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let target = package(dir.path(), "slow", &[("index.js", "eval(1)")]);
        let options = BatchOptions::new(ScanConfig::default());

        let outcome = process_package_until(&target, &options, Some(Instant::now()));
        assert_eq!(outcome.status(), PackageStatus::Failed);
        assert!(outcome.features.is_none());
        assert!(outcome.fingerprint.is_some());
        assert!(outcome.errors[0].contains("timed out"));

        let outcome = process_package_until(&target, &options, None);
        assert_eq!(outcome.status(), PackageStatus::Ok);
    }

    #[test]
    fn test_unreadable_file_fails_fingerprint_only() {
        let dir = tempfile::tempdir().unwrap();
        let target = package(dir.path(), "p", &[("index.js", "eval(1)")]);
        #[cfg(unix)]
        std::os::unix::fs::symlink(target.path.join("nowhere.js"), target.path.join("dangling.js")).unwrap();

        let mut options = BatchOptions::new(ScanConfig::default());
        options.fingerprint = false;
        let outcome = process_package(&target, &options);
        assert!(outcome.errors.is_empty());
        assert!(outcome.features.as_ref().unwrap().vector.capabilities.eval);

        #[cfg(unix)]
        {
            options.fingerprint = true;
            let outcome = process_package(&target, &options);
            assert_eq!(outcome.status(), PackageStatus::Failed);
            assert!(outcome.fingerprint.is_none());
            let features = outcome.features.unwrap();
            assert!(features.vector.capabilities.eval);
            assert_eq!(features.vector.num_js_files, 1);
        }
    }
}
