//! Feature aggregation: one fixed-schema vector per package.
//!
//! Metadata comes from the root manifest; everything else from the script
//! files (by extension) that could be read and decoded as UTF-8. Files that
//! could not be read count as absent evidence and are recorded as
//! degradations.

use crate::error::FeatureError;
use crate::lexical::scan_text;
use crate::metadata::{analyze_manifest, MetadataFeatures};
use crate::syntax::{CapabilityFlags, ScriptAnalysis, ScriptAnalyzer};
use crate::tree::{EntryKind, PackageTree};
use crate::types::{Degradation, DegradationKind};
use npmsift_core::config::ScanConfig;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

/// Bumped whenever a feature is added, removed or redefined.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Column order of the feature vector.
pub const FEATURE_NAMES: [&str; 16] = [
    "has_install_scripts",
    "has_dependencies",
    "has_dev_dependencies",
    "num_dependencies",
    "num_dev_dependencies",
    "num_js_files",
    "total_code_size",
    "avg_entropy",
    "max_entropy",
    "num_urls",
    "num_ips",
    "has_eval",
    "has_child_process",
    "has_fs_access",
    "has_network_access",
    "has_os_access",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Int(u64),
    Float(f64),
}

impl FeatureValue {
    fn flag(b: bool) -> Self {
        FeatureValue::Int(u64::from(b))
    }

    fn count(n: usize) -> Self {
        FeatureValue::Int(n as u64)
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            FeatureValue::Int(n) => n as f64,
            FeatureValue::Float(x) => x,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(n) => write!(f, "{}", n),
            FeatureValue::Float(x) => write!(f, "{}", x),
        }
    }
}

impl Serialize for FeatureValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            FeatureValue::Int(n) => serializer.serialize_u64(n),
            FeatureValue::Float(x) => serializer.serialize_f64(x),
        }
    }
}

/// Behavioral feature vector. Every field is always present; zero means
/// "not observed".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureVector {
    pub metadata: MetadataFeatures,
    pub num_js_files: usize,
    /// Characters, not bytes
    pub total_code_size: usize,
    pub avg_entropy: f64,
    pub max_entropy: f64,
    pub num_urls: usize,
    pub num_ips: usize,
    pub capabilities: CapabilityFlags,
}

impl FeatureVector {
    /// Values in [`FEATURE_NAMES`] order. Flags are 0 or 1.
    pub fn values(&self) -> [FeatureValue; 16] {
        let m = &self.metadata;
        let c = &self.capabilities;
        [
            FeatureValue::flag(m.has_install_scripts),
            FeatureValue::flag(m.has_dependencies),
            FeatureValue::flag(m.has_dev_dependencies),
            FeatureValue::count(m.num_dependencies),
            FeatureValue::count(m.num_dev_dependencies),
            FeatureValue::count(self.num_js_files),
            FeatureValue::count(self.total_code_size),
            FeatureValue::Float(self.avg_entropy),
            FeatureValue::Float(self.max_entropy),
            FeatureValue::count(self.num_urls),
            FeatureValue::count(self.num_ips),
            FeatureValue::flag(c.eval),
            FeatureValue::flag(c.child_process),
            FeatureValue::flag(c.fs),
            FeatureValue::flag(c.network),
            FeatureValue::flag(c.os),
        ]
    }

    /// `(name, value)` pairs in column order.
    pub fn named_values(&self) -> impl Iterator<Item = (&'static str, FeatureValue)> {
        FEATURE_NAMES.into_iter().zip(self.values())
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_NAMES.len()))?;
        for (name, value) in self.named_values() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Feature vector plus what went wrong on the way.
#[derive(Debug, Clone, Default)]
pub struct FeatureReport {
    pub vector: FeatureVector,
    pub degradations: Vec<Degradation>,
    /// The package deadline passed before every script was analyzed
    pub timed_out: bool,
}

/// Extract features for the package at `root`.
///
/// Syntax trees deeper than [`MAX_SYNTAX_DEPTH`](crate::syntax::MAX_SYNTAX_DEPTH)
/// are cut off, which keeps the recursion within a default 2 MiB thread stack.
pub fn extract_features(
    root: &Path,
    config: &ScanConfig,
    deadline: Option<Instant>,
) -> Result<FeatureReport, FeatureError> {
    let tree = PackageTree::walk(root)?;
    extract_features_from_tree(&tree, config, deadline)
}

/// Extract features from an already enumerated tree.
pub fn extract_features_from_tree(
    tree: &PackageTree,
    config: &ScanConfig,
    deadline: Option<Instant>,
) -> Result<FeatureReport, FeatureError> {
    let mut analyzer = ScriptAnalyzer::new()?;
    let mut report = FeatureReport::default();

    for u in tree.unlistable() {
        report.degradations.push(Degradation::new(
            DegradationKind::UnlistableDirectory,
            Some(u.path.display().to_string()),
            u.reason.clone(),
        ));
    }

    let (metadata, degradation) = analyze_manifest(tree);
    report.vector.metadata = metadata;
    report.degradations.extend(degradation);

    let parse_timeout = (config.parse_timeout_ms > 0).then(|| Duration::from_millis(config.parse_timeout_ms));
    let mut entropy_sum = 0.0;

    let scripts = tree.files().filter(|e| {
        e.kind == EntryKind::File && e.extension().is_some_and(|ext| config.is_script_extension(ext))
    });

    for entry in scripts {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            report.timed_out = true;
            break;
        }
        let rel = entry.relative_display();

        let raw = match fs::read(&entry.path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %rel, "cannot read script: {}", e);
                report.degradations.push(Degradation::new(
                    DegradationKind::UnreadableFile,
                    Some(rel),
                    e.to_string(),
                ));
                continue;
            }
        };
        let size = raw.len() as u64;
        let text = match String::from_utf8(raw) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(path = %rel, "skipping non-UTF-8 script: {}", e);
                report.degradations.push(Degradation::new(
                    DegradationKind::UndecodableText,
                    Some(rel),
                    e.utf8_error().to_string(),
                ));
                continue;
            }
        };

        let stats = scan_text(&text);
        let v = &mut report.vector;
        v.num_js_files += 1;
        v.total_code_size += stats.chars;
        v.num_urls += stats.urls;
        v.num_ips += stats.ips;
        v.max_entropy = v.max_entropy.max(stats.entropy);
        entropy_sum += stats.entropy;

        if config.max_script_bytes > 0 && size > config.max_script_bytes {
            report.degradations.push(Degradation::new(
                DegradationKind::ScriptTooLarge,
                Some(rel),
                format!("{} bytes exceeds limit of {}", size, config.max_script_bytes),
            ));
            continue;
        }

        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        let timeout = match (parse_timeout, remaining) {
            (Some(p), Some(r)) => Some(p.min(r)),
            (p, r) => p.or(r),
        };
        if timeout == Some(Duration::ZERO) {
            report.timed_out = true;
            break;
        }

        match analyzer.analyze(&text, timeout) {
            ScriptAnalysis::Parsed {
                flags,
                syntax_errors,
                truncated,
            } => {
                report.vector.capabilities.merge(flags);
                if syntax_errors > 0 {
                    tracing::debug!(path = %rel, syntax_errors, "parsed with recovery");
                    report.degradations.push(Degradation::new(
                        DegradationKind::SyntaxErrors,
                        Some(rel.clone()),
                        format!("{} syntax error(s) recovered", syntax_errors),
                    ));
                }
                if truncated {
                    report.degradations.push(Degradation::new(
                        DegradationKind::DepthLimit,
                        Some(rel),
                        "syntax tree truncated at depth limit",
                    ));
                }
            }
            ScriptAnalysis::Abandoned => {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    report.timed_out = true;
                    break;
                }
                tracing::warn!(path = %rel, "parse abandoned");
                report.degradations.push(Degradation::new(
                    DegradationKind::ParseAbandoned,
                    Some(rel),
                    "parser timed out",
                ));
            }
        }
    }

    if report.vector.num_js_files > 0 {
        report.vector.avg_entropy = entropy_sum / report.vector.num_js_files as f64;
    }
    if report.timed_out {
        tracing::warn!(root = %tree.root().display(), "feature extraction ran out of time");
    }
    Ok(report)
}
