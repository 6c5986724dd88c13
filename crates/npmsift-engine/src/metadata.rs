//! Metadata features from the root `package.json`.

use crate::manifest::Manifest;
use crate::tree::PackageTree;
use crate::types::{Degradation, DegradationKind};
use serde::Serialize;
use std::fs;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetadataFeatures {
    pub has_install_scripts: bool,
    pub has_dependencies: bool,
    pub has_dev_dependencies: bool,
    pub num_dependencies: usize,
    pub num_dev_dependencies: usize,
}

impl MetadataFeatures {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let deps = manifest.dependencies().map_or(0, |d| d.len());
        let dev_deps = manifest.dev_dependencies().map_or(0, |d| d.len());
        Self {
            has_install_scripts: manifest.has_install_hook(),
            has_dependencies: deps > 0,
            has_dev_dependencies: dev_deps > 0,
            num_dependencies: deps,
            num_dev_dependencies: dev_deps,
        }
    }
}

/// Read the root manifest of `tree`. A missing manifest gives all zeros
/// silently; an unreadable or malformed one gives all zeros plus a
/// degradation.
pub fn analyze_manifest(tree: &PackageTree) -> (MetadataFeatures, Option<Degradation>) {
    let Some(entry) = tree.root_manifest() else {
        return (MetadataFeatures::default(), None);
    };
    let path = Some(entry.relative_display());

    let raw = match fs::read(&entry.path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %entry.path.display(), "cannot read manifest: {}", e);
            return (
                MetadataFeatures::default(),
                Some(Degradation::new(DegradationKind::UnreadableManifest, path, e.to_string())),
            );
        }
    };

    match Manifest::parse(&raw) {
        Ok(manifest) => (MetadataFeatures::from_manifest(&manifest), None),
        Err(e) => {
            tracing::warn!(path = %entry.path.display(), "malformed manifest: {}", e);
            (
                MetadataFeatures::default(),
                Some(Degradation::new(DegradationKind::MalformedManifest, path, e.to_string())),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn tree_with_manifest(dir: &Path, manifest: Option<&str>) -> PackageTree {
        fs::write(dir.join("index.js"), "x").unwrap();
        if let Some(m) = manifest {
            fs::write(dir.join("package.json"), m).unwrap();
        }
        PackageTree::walk(dir).unwrap()
    }

    #[test]
    fn test_missing_manifest_is_all_zero() {
        let dir = tempfile::tempdir().unwrap();
        let (features, degradation) = analyze_manifest(&tree_with_manifest(dir.path(), None));
        assert_eq!(features, MetadataFeatures::default());
        assert!(degradation.is_none());
    }

    #[test]
    fn test_malformed_manifest_is_all_zero_and_degraded() {
        for bad in ["{not json", "[]", "\"str\""] {
            let dir = tempfile::tempdir().unwrap();
            let (features, degradation) = analyze_manifest(&tree_with_manifest(dir.path(), Some(bad)));
            assert_eq!(features, MetadataFeatures::default());
            assert_eq!(degradation.unwrap().kind, DegradationKind::MalformedManifest);
        }
    }

    #[test]
    fn test_counts_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let tree = tree_with_manifest(
            dir.path(),
            Some(
                r#"{"scripts":{"postinstall":"node setup.js","test":"jest"},
                    "dependencies":{"a":"1","b":"2","c":"3"},
                    "devDependencies":{}}"#,
            ),
        );
        let (features, degradation) = analyze_manifest(&tree);
        assert!(degradation.is_none());
        assert_eq!(
            features,
            MetadataFeatures {
                has_install_scripts: true,
                has_dependencies: true,
                has_dev_dependencies: false,
                num_dependencies: 3,
                num_dev_dependencies: 0,
            }
        );
    }

    #[test]
    fn test_scripts_without_hooks() {
        let m = Manifest::parse(br#"{"scripts":{"test":"jest","install":"x"}}"#).unwrap();
        assert!(!MetadataFeatures::from_manifest(&m).has_install_scripts);
        let m = Manifest::parse(br#"{"scripts":{"preinstall":""}}"#).unwrap();
        assert!(MetadataFeatures::from_manifest(&m).has_install_scripts);
    }

    #[test]
    fn test_nested_manifest_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/package.json"), r#"{"dependencies":{"a":"1"}}"#).unwrap();
        let (features, _) = analyze_manifest(&PackageTree::walk(dir.path()).unwrap());
        assert_eq!(features.num_dependencies, 0);
    }
}
