//! Observability: tracing init and the JSONL audit log.
//!
//! Uses `ObservabilityConfig` for NPMSIFT_QUIET, NPMSIFT_LOG_LEVEL,
//! NPMSIFT_LOG_JSON and NPMSIFT_AUDIT_LOG. Logs go to stderr so CSV output on
//! stdout stays clean.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use npmsift_core::config::ObservabilityConfig;
use npmsift_engine::{CloneMatch, PackageOutcome};
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Initialize tracing. Call once at process startup.
/// When NPMSIFT_QUIET=1, only WARN and above are logged.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "npmsift=warn,npmsift_engine=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

/// Configured audit log, if any. Path is read once with the rest of the
/// observability config.
fn audit_log() -> Option<&'static Path> {
    ObservabilityConfig::from_env()
        .audit_log
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(Path::new)
}

/// One JSON object per line. Audit failures never interrupt a scan.
fn append_audit(record: serde_json::Value) {
    let Some(path) = audit_log() else {
        return;
    };
    if let Err(e) = append_record(path, &record) {
        tracing::debug!(path = %path.display(), "audit write failed: {}", e);
    }
}

fn append_record(path: &Path, record: &serde_json::Value) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{}", record)
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit: package_processed (one per package in a batch run)
pub fn audit_package_processed(outcome: &PackageOutcome) {
    if audit_log().is_none() {
        return;
    }
    let degradations = outcome
        .features
        .as_ref()
        .map_or(0, |f| f.degradations.len());
    append_audit(json!({
        "ts": now(),
        "event": "package_processed",
        "package": outcome.identity.name,
        "version": outcome.identity.version,
        "path": outcome.path.display().to_string(),
        "status": outcome.status(),
        "hash": outcome.fingerprint.as_ref().map(|f| f.as_str()),
        "degradations": degradations,
        "errors": outcome.errors,
        "elapsed_ms": outcome.elapsed.as_millis() as u64,
    }));
}

/// Audit: clone_detected (one per candidate/known pair)
pub fn audit_clone_detected(m: &CloneMatch) {
    if audit_log().is_none() {
        return;
    }
    append_audit(json!({
        "ts": now(),
        "event": "clone_detected",
        "package": m.candidate.name,
        "version": m.candidate.version,
        "hash": m.fingerprint,
        "known_package": m.known.name,
        "known_version": m.known.version,
    }));
}
