//! `npmsift inspect`: one package as JSON.

use super::{load_config, GlobalArgs};
use anyhow::{Context, Result};
use npmsift_engine::discovery::split_versioned_name;
use npmsift_engine::{
    extract_features_from_tree, fingerprint_tree, PackageTree, FEATURE_SCHEMA_VERSION,
};
use serde_json::{json, Value};
use std::path::Path;
use std::time::{Duration, Instant};

pub fn inspect_package(global: &GlobalArgs, package_dir: &Path) -> Result<Value> {
    let config = load_config(global)?;
    let tree = PackageTree::walk(package_dir)
        .with_context(|| format!("Failed to read package {}", package_dir.display()))?;

    let fingerprint = fingerprint_tree(&tree);
    let deadline = (config.package_timeout_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(config.package_timeout_secs));
    let report = extract_features_from_tree(&tree, &config, deadline)?;

    let dir_name = package_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (dir_package, dir_version) = split_versioned_name(&dir_name);

    Ok(json!({
        "path": package_dir.display().to_string(),
        "directory": { "package": dir_package, "version": dir_version },
        "files": tree.files().count(),
        "hash": fingerprint.as_ref().ok().map(|f| f.as_str()),
        "hash_error": fingerprint.as_ref().err().map(|e| e.to_string()),
        "feature_schema_version": FEATURE_SCHEMA_VERSION,
        "features": report.vector,
        "timed_out": report.timed_out,
        "degradations": report.degradations,
    }))
}
