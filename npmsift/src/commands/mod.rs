//! Subcommand implementations.

pub mod clones;
pub mod features;
pub mod hash;
pub mod inspect;
pub mod scan;

use anyhow::{Context, Result};
use npmsift_core::config::ScanConfig;
use npmsift_engine::{discover_packages, BatchOptions, BatchSummary, PackageLayout, PackageTarget};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

/// Settings shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub workers: Option<usize>,
    pub package_timeout: Option<u64>,
}

/// Defaults, config file and env, then CLI flags on top.
pub fn load_config(global: &GlobalArgs) -> Result<ScanConfig> {
    let mut config = ScanConfig::load(global.config.as_deref()).context("Failed to load configuration")?;
    if let Some(n) = global.workers {
        config.workers = Some(n);
    }
    if let Some(secs) = global.package_timeout {
        config.package_timeout_secs = secs;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn discover(dir: &Path, layout: PackageLayout) -> Result<Vec<PackageTarget>> {
    let targets = discover_packages(dir, layout)
        .with_context(|| format!("Failed to list packages under {}", dir.display()))?;
    if targets.is_empty() {
        tracing::warn!(dir = %dir.display(), %layout, "no packages found");
    } else {
        tracing::info!(dir = %dir.display(), %layout, packages = targets.len(), "found packages");
    }
    Ok(targets)
}

/// Batch options with Ctrl-C wired to the cancel flag.
pub fn batch_options(config: ScanConfig) -> Result<BatchOptions> {
    let options = BatchOptions::new(config);
    let cancel = options.cancel.clone();
    ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::SeqCst) {
            // second Ctrl-C: give up on in-flight packages too
            std::process::exit(130);
        }
        eprintln!("Interrupted: finishing in-flight packages, press Ctrl-C again to abort");
    })
    .context("Failed to set Ctrl-C handler")?;
    Ok(options)
}

pub fn print_summary(summary: &BatchSummary) {
    eprintln!(
        "Processed {} package(s): {} ok, {} degraded, {} failed{}{}",
        summary.processed(),
        summary.ok,
        summary.degraded,
        summary.failed,
        if summary.skipped > 0 {
            format!(", {} skipped (already done)", summary.skipped)
        } else {
            String::new()
        },
        if summary.cancelled {
            format!(", interrupted with {} not started", summary.not_started)
        } else {
            String::new()
        },
    );
}
