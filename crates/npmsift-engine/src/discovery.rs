//! Finding package directories under a dataset root.
//!
//! Layouts:
//! - `nested`: `<root>/<package>/<version>/`
//! - `flat`: `<root>/<package>/` or `<root>/<package>@<version>/`
//! - `single`: `<root>` is itself one package
//!
//! In `nested` and `flat`, a top-level directory whose name starts with `@` is
//! an npm scope: its subdirectories are packages named `@scope/<child>`.

use crate::error::TreeError;
use crate::types::PackageIdentity;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageLayout {
    Nested,
    #[default]
    Flat,
    Single,
}

impl FromStr for PackageLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nested" => Ok(PackageLayout::Nested),
            "flat" => Ok(PackageLayout::Flat),
            "single" => Ok(PackageLayout::Single),
            other => Err(format!("unknown layout '{}' (expected nested, flat or single)", other)),
        }
    }
}

impl fmt::Display for PackageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageLayout::Nested => write!(f, "nested"),
            PackageLayout::Flat => write!(f, "flat"),
            PackageLayout::Single => write!(f, "single"),
        }
    }
}

/// One package directory and the identity it is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTarget {
    pub identity: PackageIdentity,
    pub path: PathBuf,
}

/// Split `name@version` at the last non-leading `@`.
pub fn split_versioned_name(dir_name: &str) -> (String, Option<String>) {
    match dir_name.rfind('@') {
        Some(i) if i > 0 => {
            let (name, version) = (&dir_name[..i], &dir_name[i + 1..]);
            (name.to_string(), Some(version.to_string()).filter(|v| !v.is_empty()))
        }
        _ => (dir_name.to_string(), None),
    }
}

/// Package directories under `root` for `layout`, sorted by path.
pub fn discover_packages(root: &Path, layout: PackageLayout) -> Result<Vec<PackageTarget>, TreeError> {
    let top = list_dirs(root)?;

    let mut targets = Vec::new();
    match layout {
        PackageLayout::Single => {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| root.display().to_string());
            let (name, version) = split_versioned_name(&name);
            targets.push(PackageTarget {
                identity: PackageIdentity::new(name, version),
                path: root.to_path_buf(),
            });
        }
        PackageLayout::Flat => {
            for (name, path) in expand_scopes(top) {
                let (name, version) = split_versioned_name(&name);
                targets.push(PackageTarget {
                    identity: PackageIdentity::new(name, version),
                    path,
                });
            }
        }
        PackageLayout::Nested => {
            for (name, path) in expand_scopes(top) {
                let versions = match list_dirs(&path) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "skipping package: {}", e);
                        continue;
                    }
                };
                for (version, vpath) in versions {
                    targets.push(PackageTarget {
                        identity: PackageIdentity::new(name.clone(), Some(version)),
                        path: vpath,
                    });
                }
            }
        }
    }

    targets.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(root = %root.display(), %layout, packages = targets.len(), "discovered packages");
    Ok(targets)
}

/// Replace each `@scope` directory by its child directories.
fn expand_scopes(dirs: Vec<(String, PathBuf)>) -> Vec<(String, PathBuf)> {
    let mut out = Vec::new();
    for (name, path) in dirs {
        if !name.starts_with('@') || name.len() == 1 {
            out.push((name, path));
            continue;
        }
        match list_dirs(&path) {
            Ok(children) => {
                for (child, cpath) in children {
                    out.push((format!("{}/{}", name, child), cpath));
                }
            }
            Err(e) => tracing::warn!(path = %path.display(), "skipping scope: {}", e),
        }
    }
    out
}

/// Subdirectories of `dir` (symlinks to directories excluded), sorted by name.
fn list_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>, TreeError> {
    let read = fs::read_dir(dir).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => TreeError::MissingRoot(dir.to_path_buf()),
        _ if dir.is_file() => TreeError::NotADirectory(dir.to_path_buf()),
        _ => TreeError::Root {
            path: dir.to_path_buf(),
            source,
        },
    })?;

    let mut dirs: Vec<(String, PathBuf)> = read
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    dirs.sort();
    Ok(dirs)
}
