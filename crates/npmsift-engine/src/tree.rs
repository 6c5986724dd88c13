//! Deterministic view of a package directory.
//!
//! Order: within each directory, its files first (sorted by name, byte order),
//! then each subdirectory (sorted the same way), descended recursively. Two
//! trees with the same names and contents always enumerate identically,
//! whatever order the filesystem returns entries in.
//!
//! Symlinks are never followed into directories. A link to a file is listed
//! as a file (reads go through it); a link to a directory is left out.

use crate::error::TreeError;
use std::cmp::Ordering;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// File name of the package manifest.
pub const MANIFEST_FILE_NAME: &str = "package.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// FIFO, socket, device: listed so callers can refuse it, never read
    Special,
}

#[derive(Debug, Clone)]
pub struct TreeEntry {
    /// Full path (root joined with the relative path)
    pub path: PathBuf,
    /// Path relative to the package root
    pub relative: PathBuf,
    pub kind: EntryKind,
}

impl TreeEntry {
    /// Relative path as bytes with `/` separators, independent of platform.
    pub fn relative_key(&self) -> Vec<u8> {
        let mut key = Vec::new();
        for (i, comp) in self
            .relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s),
                _ => None,
            })
            .enumerate()
        {
            if i > 0 {
                key.push(b'/');
            }
            key.extend_from_slice(comp.as_encoded_bytes());
        }
        key
    }

    /// Lossy `/`-separated relative path for reports and logs.
    pub fn relative_display(&self) -> String {
        String::from_utf8_lossy(&self.relative_key()).into_owned()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.relative.file_name().and_then(|n| n.to_str())
    }

    pub fn extension(&self) -> Option<&str> {
        self.relative.extension().and_then(|e| e.to_str())
    }

    pub fn is_manifest(&self) -> bool {
        self.kind == EntryKind::File && self.file_name() == Some(MANIFEST_FILE_NAME)
    }
}

/// A directory that could not be listed during the walk.
#[derive(Debug, Clone)]
pub struct Unlistable {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PackageTree {
    root: PathBuf,
    entries: Vec<TreeEntry>,
    unlistable: Vec<Unlistable>,
}

/// Files before directories, then by name.
fn traversal_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    let rank = |e: &DirEntry| u8::from(e.file_type().is_dir());
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.file_name().cmp(b.file_name()))
}

impl PackageTree {
    /// Enumerate `root`. Fails only when the root itself is missing or not a
    /// directory; directories that cannot be listed further down are recorded
    /// in [`PackageTree::unlistable`].
    pub fn walk(root: &Path) -> Result<Self, TreeError> {
        match fs::metadata(root) {
            Ok(m) if m.is_dir() => {}
            Ok(_) => return Err(TreeError::NotADirectory(root.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TreeError::MissingRoot(root.to_path_buf()))
            }
            Err(source) => {
                return Err(TreeError::Root {
                    path: root.to_path_buf(),
                    source,
                })
            }
        }

        let mut entries = Vec::new();
        let mut unlistable = Vec::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by(traversal_order);

        for item in walker {
            let entry = match item {
                Ok(e) => e,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    tracing::warn!(path = %path.display(), "cannot list directory: {}", e);
                    unlistable.push(Unlistable {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let ft = entry.file_type();
            let kind = if ft.is_dir() {
                EntryKind::Directory
            } else if ft.is_file() {
                EntryKind::File
            } else if ft.is_symlink() {
                match fs::metadata(entry.path()) {
                    Ok(target) if target.is_dir() => continue,
                    Ok(target) if !target.is_file() => EntryKind::Special,
                    // dangling links stay files so reading them reports the error
                    _ => EntryKind::File,
                }
            } else {
                EntryKind::Special
            };

            let relative = match entry.path().strip_prefix(root) {
                Ok(r) => r.to_path_buf(),
                Err(_) => continue,
            };
            entries.push(TreeEntry {
                path: entry.path().to_path_buf(),
                relative,
                kind,
            });
        }

        Ok(Self {
            root: root.to_path_buf(),
            entries,
            unlistable,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All entries in traversal order.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Non-directory entries in traversal order.
    pub fn files(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| e.kind != EntryKind::Directory)
    }

    pub fn unlistable(&self) -> &[Unlistable] {
        &self.unlistable
    }

    /// The manifest at the package root, if present.
    pub fn root_manifest(&self) -> Option<&TreeEntry> {
        self.entries
            .iter()
            .find(|e| e.is_manifest() && e.relative.components().count() == 1)
    }
}
