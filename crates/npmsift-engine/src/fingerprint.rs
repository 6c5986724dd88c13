//! Package fingerprinting.
//!
//! SHA-256 over, for each file in tree order: the `/`-separated relative
//! path, a newline, then the content. `package.json` files (at any depth)
//! contribute their canonical JSON with `name` and `version` blanked, or
//! their raw bytes when they do not parse.
//!
//! A file that cannot be read aborts the fingerprint. Skipping it would yield
//! a hash that verifies but describes a different tree.

use crate::error::FingerprintError;
use crate::manifest::Manifest;
use crate::tree::{EntryKind, PackageTree, TreeEntry};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Hex-encoded content digest of a package tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a hex digest: {0:?}")]
pub struct InvalidFingerprint(pub String);

impl FromStr for Fingerprint {
    type Err = InvalidFingerprint;

    /// Accepts any even-length hex string (so corpora hashed with another
    /// digest still load) and normalizes it to lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.is_empty() || t.len() % 2 != 0 || !t.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidFingerprint(s.to_string()));
        }
        Ok(Self(t.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = InvalidFingerprint;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(f: Fingerprint) -> Self {
        f.0
    }
}

/// Fingerprint the package rooted at `root`.
pub fn fingerprint_package(root: &Path) -> Result<Fingerprint, FingerprintError> {
    let tree = PackageTree::walk(root)?;
    fingerprint_tree(&tree)
}

/// Fingerprint an already enumerated tree.
pub fn fingerprint_tree(tree: &PackageTree) -> Result<Fingerprint, FingerprintError> {
    if let Some(u) = tree.unlistable().first() {
        return Err(FingerprintError::Unlistable {
            path: u.path.clone(),
            reason: u.reason.clone(),
        });
    }

    let mut hasher = Sha256::new();
    let mut files = 0usize;
    for entry in tree.files() {
        hasher.update(entry.relative_key());
        hasher.update(b"\n");
        feed_file(&mut hasher, entry)?;
        files += 1;
    }

    let digest = Fingerprint(hex::encode(hasher.finalize()));
    tracing::debug!(root = %tree.root().display(), files, fingerprint = %digest, "fingerprinted package");
    Ok(digest)
}

fn feed_file(hasher: &mut Sha256, entry: &TreeEntry) -> Result<(), FingerprintError> {
    let read_err = |source: io::Error| FingerprintError::Read {
        path: entry.path.clone(),
        source,
    };

    if entry.kind == EntryKind::Special {
        return Err(read_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }

    if entry.is_manifest() {
        let raw = fs::read(&entry.path).map_err(read_err)?;
        match Manifest::parse(&raw) {
            Ok(mut manifest) => {
                manifest.blank_identity();
                hasher.update(manifest.canonical_bytes());
            }
            Err(e) => {
                tracing::debug!(path = %entry.relative_display(), "hashing raw manifest: {}", e);
                hasher.update(&raw);
            }
        }
        return Ok(());
    }

    let mut file = File::open(&entry.path).map_err(read_err)?;
    io::copy(&mut file, hasher).map_err(read_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn sample_package(root: &Path, name: &str, version: &str) {
        write(
            root,
            "package.json",
            format!(
                r#"{{"name":"{}","version":"{}","main":"index.js","dependencies":{{"a":"^1.0.0"}}}}"#,
                name, version
            )
            .as_bytes(),
        );
        write(root, "index.js", b"module.exports = require('./lib/util');\n");
        write(root, "lib/util.js", b"exports.x = 1;\n");
        write(root, "README.md", b"# sample\n");
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        sample_package(dir.path(), "a", "1.0.0");
        let fp = fingerprint_package(dir.path()).unwrap();
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn test_same_content_created_in_different_order() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();
        sample_package(one.path(), "a", "1.0.0");
        // same files, created in reverse order
        write(two.path(), "README.md", b"# sample\n");
        write(two.path(), "lib/util.js", b"exports.x = 1;\n");
        write(two.path(), "index.js", b"module.exports = require('./lib/util');\n");
        write(
            two.path(),
            "package.json",
            br#"{"name":"a","version":"1.0.0","main":"index.js","dependencies":{"a":"^1.0.0"}}"#,
        );
        assert_eq!(
            fingerprint_package(one.path()).unwrap(),
            fingerprint_package(two.path()).unwrap()
        );
    }

    #[test]
    fn test_name_and_version_do_not_matter() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();
        sample_package(one.path(), "original", "1.0.0");
        sample_package(two.path(), "typosquat", "6.6.6");
        assert_eq!(
            fingerprint_package(one.path()).unwrap(),
            fingerprint_package(two.path()).unwrap()
        );
    }

    #[test]
    fn test_manifest_whitespace_and_key_order_do_not_matter() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();
        write(one.path(), "package.json", br#"{"main":"i.js","bin":"b.js"}"#);
        write(two.path(), "package.json", b"{\n  \"bin\": \"b.js\",\n  \"main\": \"i.js\"\n}\n");
        assert_eq!(
            fingerprint_package(one.path()).unwrap(),
            fingerprint_package(two.path()).unwrap()
        );
    }

    #[test]
    fn test_other_manifest_fields_matter() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();
        sample_package(one.path(), "a", "1.0.0");
        sample_package(two.path(), "a", "1.0.0");
        write(
            two.path(),
            "package.json",
            br#"{"name":"a","version":"1.0.0","main":"index.js","dependencies":{"a":"^1.0.1"}}"#,
        );
        assert_ne!(
            fingerprint_package(one.path()).unwrap(),
            fingerprint_package(two.path()).unwrap()
        );
    }

    #[test]
    fn test_single_byte_flip_changes_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        sample_package(dir.path(), "a", "1.0.0");
        let before = fingerprint_package(dir.path()).unwrap();
        write(dir.path(), "lib/util.js", b"exports.x = 2;\n");
        let after = fingerprint_package(dir.path()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_rename_changes_fingerprint() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();
        write(one.path(), "a.js", b"x");
        write(two.path(), "b.js", b"x");
        assert_ne!(
            fingerprint_package(one.path()).unwrap(),
            fingerprint_package(two.path()).unwrap()
        );
    }

    #[test]
    fn test_malformed_manifest_hashes_raw_bytes() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();
        write(one.path(), "package.json", br#"{"name":"a", broken"#);
        write(two.path(), "package.json", br#"{"name":"b", broken"#);
        // raw fallback means the name is no longer blanked
        assert_ne!(
            fingerprint_package(one.path()).unwrap(),
            fingerprint_package(two.path()).unwrap()
        );
    }

    #[test]
    fn test_matches_manual_digest() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.js", b"eval(1)");
        write(dir.path(), "package.json", br#"{"name":"x","version":"1"}"#);

        let mut expected = Sha256::new();
        expected.update(b"index.js\neval(1)");
        expected.update(br#"package.json
{"name":"","version":""}"#);
        let expected = hex::encode(expected.finalize());

        assert_eq!(fingerprint_package(dir.path()).unwrap().as_str(), expected);
    }

    #[test]
    fn test_missing_root_is_error() {
        let err = fingerprint_package(&PathBuf::from("/nonexistent/npmsift/pkg")).unwrap_err();
        assert!(matches!(err, FingerprintError::Tree(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_fails_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.js", b"x");
        std::os::unix::fs::symlink(dir.path().join("gone.js"), dir.path().join("link.js")).unwrap();
        let err = fingerprint_package(dir.path()).unwrap_err();
        match err {
            FingerprintError::Read { path, .. } => assert!(path.ends_with("link.js")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fingerprint_parse_normalizes_case() {
        let fp: Fingerprint = "ABCDEF01".parse().unwrap();
        assert_eq!(fp.as_str(), "abcdef01");
        assert!("xyz".parse::<Fingerprint>().is_err());
        assert!("abc".parse::<Fingerprint>().is_err());
        assert!("".parse::<Fingerprint>().is_err());
    }
}
