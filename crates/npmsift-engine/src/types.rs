//! Shared value types: package identity, degradation notes, per-package status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name and (optional) version a package directory was ingested under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: Option<String>,
}

impl PackageIdentity {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version: version.filter(|v| !v.is_empty()),
        }
    }

    pub fn unversioned(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    /// Version or empty string, for tabular output.
    pub fn version_str(&self) -> &str {
        self.version.as_deref().unwrap_or("")
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Kinds of recoverable problems met while extracting features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    /// A directory could not be listed; its contents were not seen
    UnlistableDirectory,
    /// A script could not be read
    UnreadableFile,
    /// A script is not valid UTF-8; it contributes nothing
    UndecodableText,
    /// `package.json` exists but could not be read
    UnreadableManifest,
    /// `package.json` is not a JSON object
    MalformedManifest,
    /// The parser recovered from syntax errors in a script
    SyntaxErrors,
    /// Parsing gave up (timeout); the script contributes no flags
    ParseAbandoned,
    /// The syntax tree was deeper than the walk limit and was truncated
    DepthLimit,
    /// A script exceeded the size limit and skipped syntax analysis
    ScriptTooLarge,
}

impl fmt::Display for DegradationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DegradationKind::UnlistableDirectory => "unlistable directory",
            DegradationKind::UnreadableFile => "unreadable file",
            DegradationKind::UndecodableText => "undecodable text",
            DegradationKind::UnreadableManifest => "unreadable manifest",
            DegradationKind::MalformedManifest => "malformed manifest",
            DegradationKind::SyntaxErrors => "syntax errors",
            DegradationKind::ParseAbandoned => "parse abandoned",
            DegradationKind::DepthLimit => "depth limit",
            DegradationKind::ScriptTooLarge => "script too large",
        };
        f.write_str(s)
    }
}

/// One recoverable problem, tied to the file it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub kind: DegradationKind,
    /// Path relative to the package root, `/`-separated
    pub path: Option<String>,
    pub detail: String,
}

impl Degradation {
    pub fn new(kind: DegradationKind, path: Option<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "{} ({}): {}", self.kind, p, self.detail),
            None => write!(f, "{}: {}", self.kind, self.detail),
        }
    }
}

/// Outcome class of one package in a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    /// Fingerprint and features computed with no degradation
    Ok,
    /// Results produced, but some evidence was skipped
    Degraded,
    /// Fingerprint failed or the time budget ran out
    Failed,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            PackageStatus::Ok => "ok",
            PackageStatus::Degraded => "degraded",
            PackageStatus::Failed => "failed",
        })
    }
}
