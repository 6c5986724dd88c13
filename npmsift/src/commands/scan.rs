//! `npmsift scan`: fingerprints and features in one parallel pass.
//!
//! The two files are written independently: a package whose fingerprint
//! failed still gets its feature row. On resume, packages present in both
//! files are skipped, and the rest only add rows the files lack.

use super::{batch_options, discover, load_config, print_summary, GlobalArgs};
use crate::observability;
use anyhow::{Context, Result};
use npmsift_engine::records::{self, RecordWriter};
use npmsift_engine::{run_batch, OutputError, PackageLayout, PackageOutcome, ProcessedSet};
use std::path::Path;

pub struct ScanArgs<'a> {
    pub dir: &'a Path,
    pub layout: PackageLayout,
    pub hashes: &'a Path,
    pub features: &'a Path,
    pub label: Option<&'a str>,
    pub resume: bool,
}

/// Row writers for both outputs plus what each already holds.
struct ScanSink<'a> {
    hash_writer: RecordWriter,
    feature_writer: RecordWriter,
    hashed: ProcessedSet,
    featured: ProcessedSet,
    label: Option<&'a str>,
}

impl ScanSink<'_> {
    fn record(&mut self, outcome: &PackageOutcome) -> Result<(), OutputError> {
        let identity = &outcome.identity;
        if let Some(fp) = &outcome.fingerprint {
            if self.hashed.insert(identity.clone()) {
                self.hash_writer.write_row(records::fingerprint_row(identity, fp))?;
            }
        }
        if let Some(report) = &outcome.features {
            if self.featured.insert(identity.clone()) {
                self.feature_writer
                    .write_row(records::feature_row(identity, &report.vector, self.label))?;
            }
        }
        Ok(())
    }
}

fn summary_line(outcome: &PackageOutcome) -> String {
    let hash = outcome
        .fingerprint
        .as_ref()
        .map_or("-", |fp| &fp.as_str()[..12.min(fp.as_str().len())]);

    let mut notes: Vec<&str> = Vec::new();
    if let Some(report) = &outcome.features {
        let flags = report.vector.capabilities;
        if report.vector.metadata.has_install_scripts {
            notes.push("install-script");
        }
        if flags.eval {
            notes.push("eval");
        }
        if flags.child_process {
            notes.push("child_process");
        }
        if flags.network {
            notes.push("network");
        }
        if flags.fs {
            notes.push("fs");
        }
        if flags.os {
            notes.push("os");
        }
    }

    let mut line = format!(
        "  {:<40} {:<8} {:<12} [{}]",
        outcome.identity.to_string(),
        outcome.status(),
        hash,
        notes.join(", ")
    );
    if !outcome.errors.is_empty() {
        line.push_str(&format!(" {}", outcome.errors.join("; ")));
    }
    line
}

pub fn scan_dataset(global: &GlobalArgs, args: ScanArgs<'_>) -> Result<()> {
    let config = load_config(global)?;
    let targets = discover(args.dir, args.layout)?;

    let mut options = batch_options(config)?;
    let (mut hashed, mut featured) = (ProcessedSet::default(), ProcessedSet::default());
    if args.resume {
        hashed = records::load_processed(args.hashes)
            .with_context(|| format!("Failed to read {}", args.hashes.display()))?;
        featured = records::load_processed(args.features)
            .with_context(|| format!("Failed to read {}", args.features.display()))?;
        options.skip = hashed.intersection(&featured);
    }

    let hash_header: Vec<String> = records::FINGERPRINT_HEADER.iter().map(|s| s.to_string()).collect();
    let hash_writer = RecordWriter::open(Some(args.hashes), &hash_header, args.resume)
        .with_context(|| format!("Failed to open {}", args.hashes.display()))?;
    let feature_header = records::feature_header(args.label.is_some());
    let feature_writer = RecordWriter::open(Some(args.features), &feature_header, args.resume)
        .with_context(|| format!("Failed to open {}", args.features.display()))?;

    let mut sink = ScanSink {
        hash_writer,
        feature_writer,
        hashed,
        featured,
        label: args.label,
    };
    let summary = run_batch(&targets, &options, |outcome| {
        observability::audit_package_processed(outcome);
        sink.record(outcome)?;
        eprintln!("{}", summary_line(outcome));
        Ok(())
    })?;

    print_summary(&summary);
    eprintln!(
        "Wrote {} fingerprint row(s) to {} and {} feature row(s) to {}",
        sink.hash_writer.rows(),
        args.hashes.display(),
        sink.feature_writer.rows(),
        args.features.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use npmsift_core::config::ScanConfig;
    use npmsift_engine::{process_package, BatchOptions, PackageIdentity, PackageTarget};
    use std::fs;

    fn sink_in(dir: &Path, hashed: ProcessedSet, featured: ProcessedSet) -> ScanSink<'static> {
        let hash_header: Vec<String> = records::FINGERPRINT_HEADER.iter().map(|s| s.to_string()).collect();
        ScanSink {
            hash_writer: RecordWriter::create(&dir.join("hashes.csv"), &hash_header).unwrap(),
            feature_writer: RecordWriter::create(&dir.join("features.csv"), &records::feature_header(false))
                .unwrap(),
            hashed,
            featured,
            label: None,
        }
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_fingerprint_still_writes_feature_row() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkgs").join("evil");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("index.js"), "eval(atob(x))").unwrap();
        std::os::unix::fs::symlink(pkg.join("nowhere.js"), pkg.join("x.js")).unwrap();

        let target = PackageTarget {
            identity: PackageIdentity::unversioned("evil"),
            path: pkg,
        };
        let outcome = process_package(&target, &BatchOptions::new(ScanConfig::default()));
        assert!(outcome.fingerprint.is_none());

        let mut sink = sink_in(dir.path(), ProcessedSet::default(), ProcessedSet::default());
        sink.record(&outcome).unwrap();
        assert_eq!(sink.hash_writer.rows(), 0);
        assert_eq!(sink.feature_writer.rows(), 1);
        drop(sink);

        assert_eq!(lines(&dir.path().join("hashes.csv")).len(), 1);
        let features = lines(&dir.path().join("features.csv"));
        assert_eq!(features.len(), 2);
        assert!(features[1].starts_with("evil,"));
        assert!(summary_line(&outcome).contains("failed"));
    }

    #[test]
    fn test_resume_only_adds_missing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkgs").join("fine");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("index.js"), "module.exports = 1;").unwrap();

        let target = PackageTarget {
            identity: PackageIdentity::unversioned("fine"),
            path: pkg,
        };
        let outcome = process_package(&target, &BatchOptions::new(ScanConfig::default()));
        assert!(outcome.fingerprint.is_some() && outcome.features.is_some());

        let mut hashed = ProcessedSet::default();
        hashed.insert(target.identity.clone());
        let mut sink = sink_in(dir.path(), hashed, ProcessedSet::default());
        sink.record(&outcome).unwrap();
        sink.record(&outcome).unwrap();
        assert_eq!(sink.hash_writer.rows(), 0);
        assert_eq!(sink.feature_writer.rows(), 1);
    }
}
