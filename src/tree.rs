//! Read-only view of an ISO's file tree.
//!
//! Detection never touches `std::fs` directly. It goes through [`IsoTree`],
//! which has two implementations:
//!
//! - [`DirTree`] - a real directory, normally the loop mount point of an ISO
//! - [`MemoryTree`] - an in-memory fixture for tests and dry runs
//!
//! Paths handed to the trait are relative to the ISO root and use `/` as
//! separator. A leading `/` is accepted and ignored, so `"/casper/vmlinuz"`
//! and `"casper/vmlinuz"` name the same file.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One directory entry returned by [`IsoTree::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TreeEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Minimal filesystem capability needed by the detector.
pub trait IsoTree {
    /// List the entries of a directory. Order is unspecified.
    fn read_dir(&self, rel: &str) -> io::Result<Vec<TreeEntry>>;

    /// Whether a file or directory exists at `rel`.
    fn exists(&self, rel: &str) -> bool;

    /// Whether `rel` is a regular file (symlinks followed).
    fn is_file(&self, rel: &str) -> bool;

    /// Read a whole file.
    fn read(&self, rel: &str) -> io::Result<Vec<u8>>;

    /// Read a file as text, replacing invalid UTF-8.
    ///
    /// Returns `None` when the file is missing or unreadable.
    fn read_text_lossy(&self, rel: &str) -> Option<String> {
        self.read(rel)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub(crate) fn normalize(rel: &str) -> &str {
    rel.trim_matches('/')
}

/// An ISO tree backed by a directory on the host.
#[derive(Debug, Clone)]
pub struct DirTree {
    root: PathBuf,
}

impl DirTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        let rel = normalize(rel);
        if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }
}

impl IsoTree for DirTree {
    fn read_dir(&self, rel: &str) -> io::Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(rel))? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            // Follows symlinks; Debian images link `debian -> .`
            let is_dir = entry.path().is_dir();
            entries.push(TreeEntry { name, is_dir });
        }
        Ok(entries)
    }

    fn exists(&self, rel: &str) -> bool {
        self.resolve(rel).exists()
    }

    fn is_file(&self, rel: &str) -> bool {
        self.resolve(rel).is_file()
    }

    fn read(&self, rel: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(rel))
    }
}

/// An ISO tree held entirely in memory.
///
/// ```rust
/// use multiboot_usb::tree::{IsoTree, MemoryTree};
///
/// let tree = MemoryTree::new()
///     .file("casper/vmlinuz", "")
///     .file(".disk/info", "Ubuntu 22.04 LTS");
/// assert!(tree.exists("/casper"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. Parent directories are implied.
    pub fn file(mut self, rel: &str, contents: impl AsRef<[u8]>) -> Self {
        self.files
            .insert(normalize(rel).to_string(), contents.as_ref().to_vec());
        self
    }

    /// Add an (otherwise empty) directory.
    pub fn dir(mut self, rel: &str) -> Self {
        self.dirs.insert(normalize(rel).to_string());
        self
    }

    fn all_paths(&self) -> impl Iterator<Item = (&str, bool)> {
        self.files
            .keys()
            .map(|p| (p.as_str(), false))
            .chain(self.dirs.iter().map(|p| (p.as_str(), true)))
    }
}

impl IsoTree for MemoryTree {
    fn read_dir(&self, rel: &str) -> io::Result<Vec<TreeEntry>> {
        let rel = normalize(rel);
        if !rel.is_empty() && !self.exists(rel) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {rel}"),
            ));
        }

        let mut children: BTreeMap<&str, bool> = BTreeMap::new();
        for (path, path_is_dir) in self.all_paths() {
            let rest = if rel.is_empty() {
                path
            } else {
                match path.strip_prefix(rel).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            if rest.is_empty() {
                continue;
            }
            let (name, is_dir) = match rest.split_once('/') {
                Some((head, _)) => (head, true),
                None => (rest, path_is_dir),
            };
            let slot = children.entry(name).or_insert(false);
            *slot |= is_dir;
        }

        Ok(children
            .into_iter()
            .map(|(name, is_dir)| TreeEntry {
                name: name.to_string(),
                is_dir,
            })
            .collect())
    }

    fn exists(&self, rel: &str) -> bool {
        let rel = normalize(rel);
        if rel.is_empty() {
            return true;
        }
        self.all_paths().any(|(path, _)| {
            path == rel
                || path
                    .strip_prefix(rel)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn is_file(&self, rel: &str) -> bool {
        self.files.contains_key(normalize(rel))
    }

    fn read(&self, rel: &str) -> io::Result<Vec<u8>> {
        self.files.get(normalize(rel)).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {rel}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(entries: Vec<TreeEntry>) -> Vec<String> {
        let mut names: Vec<_> = entries.into_iter().map(|e| e.name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_memory_tree_implies_parent_dirs() {
        let tree = MemoryTree::new().file("arch/boot/x86_64/vmlinuz-linux", "");
        assert!(tree.exists("arch"));
        assert!(tree.exists("/arch/boot/x86_64"));
        assert!(!tree.exists("arc"));

        let root = tree.read_dir("").unwrap();
        assert_eq!(
            root,
            vec![TreeEntry {
                name: "arch".into(),
                is_dir: true
            }]
        );
    }

    #[test]
    fn test_memory_tree_explicit_dir() {
        let tree = MemoryTree::new().dir("antergos").file("boot/vmlinuz", "");
        assert!(tree.exists("antergos"));
        assert_eq!(names(tree.read_dir("/").unwrap()), vec!["antergos", "boot"]);
        assert!(tree.read_dir("antergos").unwrap().is_empty());
        assert!(tree.read_dir("missing").is_err());
    }

    #[test]
    fn test_memory_tree_read_lossy() {
        let tree = MemoryTree::new().file(".disk/info", [b'U', 0xff, b'x']);
        assert_eq!(tree.read_text_lossy(".disk/info").unwrap(), "U\u{fffd}x");
        assert!(tree.read_text_lossy(".disk/nope").is_none());
    }

    #[test]
    fn test_is_file_distinguishes_directories() {
        let tree = MemoryTree::new()
            .dir("linux-firmware")
            .file("boot/initrd.img", "");
        assert!(tree.is_file("/boot/initrd.img"));
        assert!(!tree.is_file("boot"));
        assert!(!tree.is_file("linux-firmware"));
        assert!(!tree.is_file("missing"));

        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("boot/initrd.d")).unwrap();
        fs::write(temp.path().join("initrd.img"), b"").unwrap();
        let tree = DirTree::new(temp.path());
        assert!(tree.is_file("initrd.img"));
        assert!(!tree.is_file("/boot/initrd.d"));
    }

    #[test]
    fn test_dir_tree_reads_real_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("casper")).unwrap();
        fs::write(temp.path().join("casper/vmlinuz"), b"kernel").unwrap();

        let tree = DirTree::new(temp.path());
        assert!(tree.exists("/casper/vmlinuz"));
        assert_eq!(tree.read("casper/vmlinuz").unwrap(), b"kernel");

        let root = tree.read_dir("").unwrap();
        assert_eq!(
            root,
            vec![TreeEntry {
                name: "casper".into(),
                is_dir: true
            }]
        );
    }
}
