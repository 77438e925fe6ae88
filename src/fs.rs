//! File-system access layer.
//!
//! Everything that touches the disk goes through the [`FileAccess`] trait so the
//! relocation engine can run against the real file system ([`RealFs`]) or an
//! in-memory tree ([`MemoryFs`]) in tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Capability surface the relocation engine depends on.
///
/// Implementations must be shareable across threads: the organizer hands the same
/// instance to every command it creates.
pub trait FileAccess: Send + Sync {
    /// Returns true if a regular file exists at `path`.
    fn file_exists(&self, path: &Path) -> bool;

    /// Returns true if a directory exists at `path`.
    fn dir_exists(&self, path: &Path) -> bool;

    /// Returns true if anything (file or directory) exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        self.file_exists(path) || self.dir_exists(path)
    }

    /// Moves a file. Fails if `dst` is already occupied.
    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Creates a directory and any missing parents.
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Removes a directory. A non-recursive removal fails on a non-empty directory.
    fn remove_dir(&self, path: &Path, recursive: bool) -> io::Result<()>;

    /// Lists the regular files directly inside `path`, sorted by path.
    fn list_files(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Lists the directories directly inside `path`, sorted by path.
    fn list_subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Returns true if `path` is a directory with no files and no subdirectories.
    fn is_empty_dir(&self, path: &Path) -> io::Result<bool> {
        Ok(self.list_files(path)?.is_empty() && self.list_subdirectories(path)?.is_empty())
    }
}

/// [`FileAccess`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl RealFs {
    fn entries(path: &Path, want_dirs: bool) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if (want_dirs && file_type.is_dir()) || (!want_dirs && file_type.is_file()) {
                entries.push(entry.path());
            }
        }
        entries.sort();
        Ok(entries)
    }
}

impl FileAccess for RealFs {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()> {
        // `rename` silently replaces an existing file on Unix.
        if dst.exists() {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("destination already exists: {}", dst.display()),
            ));
        }
        fs::rename(src, dst)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_dir(&self, path: &Path, recursive: bool) -> io::Result<()> {
        if recursive {
            fs::remove_dir_all(path)
        } else {
            fs::remove_dir(path)
        }
    }

    fn list_files(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        Self::entries(path, false)
    }

    fn list_subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        Self::entries(path, true)
    }
}

#[derive(Debug, Default)]
struct MemoryTree {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
    denied: HashSet<PathBuf>,
}

impl MemoryTree {
    fn add_dir_all(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }

    fn check_allowed(&self, path: &Path) -> io::Result<()> {
        if self.denied.contains(path) {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                format!("access denied: {}", path.display()),
            ));
        }
        Ok(())
    }

    fn children<'a, I>(keys: I, path: &Path) -> Vec<PathBuf>
    where
        I: Iterator<Item = &'a PathBuf>,
    {
        keys.filter(|candidate| candidate.parent() == Some(path))
            .cloned()
            .collect()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

/// In-memory [`FileAccess`] implementation.
///
/// Holds a set of directories and a map of file contents. Paths can be marked as
/// denied to simulate permission errors on moves and directory removal.
#[derive(Debug, Default)]
pub struct MemoryFs {
    tree: Mutex<MemoryTree>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self) -> MutexGuard<'_, MemoryTree> {
        // A panic while holding the lock leaves the tree usable; recover it.
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a directory and all of its parents.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.tree().add_dir_all(path.as_ref());
    }

    /// Adds a file with the given contents, creating parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut tree = self.tree();
        if let Some(parent) = path.parent() {
            tree.add_dir_all(parent);
        }
        tree.files.insert(path.to_path_buf(), contents.into());
    }

    /// Returns the contents of a file, if present.
    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.tree().files.get(path.as_ref()).cloned()
    }

    /// Makes moves from/to and removal of `path` fail with `PermissionDenied`.
    pub fn deny(&self, path: impl AsRef<Path>) {
        self.tree().denied.insert(path.as_ref().to_path_buf());
    }

    /// Lifts a restriction added with [`MemoryFs::deny`].
    pub fn allow(&self, path: impl AsRef<Path>) {
        self.tree().denied.remove(path.as_ref());
    }

    /// All file paths currently in the tree, sorted.
    pub fn all_files(&self) -> Vec<PathBuf> {
        self.tree().files.keys().cloned().collect()
    }

    /// All directory paths currently in the tree, sorted.
    pub fn all_dirs(&self) -> Vec<PathBuf> {
        self.tree().dirs.iter().cloned().collect()
    }
}

impl FileAccess for MemoryFs {
    fn file_exists(&self, path: &Path) -> bool {
        self.tree().files.contains_key(path)
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.tree().dirs.contains(path)
    }

    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let mut tree = self.tree();
        tree.check_allowed(src)?;
        if let Some(parent) = dst.parent() {
            tree.check_allowed(parent)?;
            if !tree.dirs.contains(parent) {
                return Err(not_found(parent));
            }
        }
        if tree.files.contains_key(dst) || tree.dirs.contains(dst) {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("destination already exists: {}", dst.display()),
            ));
        }
        let contents = tree.files.remove(src).ok_or_else(|| not_found(src))?;
        tree.files.insert(dst.to_path_buf(), contents);
        Ok(())
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.tree();
        if tree.files.contains_key(path) {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("a file exists at {}", path.display()),
            ));
        }
        tree.add_dir_all(path);
        Ok(())
    }

    fn remove_dir(&self, path: &Path, recursive: bool) -> io::Result<()> {
        let mut tree = self.tree();
        tree.check_allowed(path)?;
        if !tree.dirs.contains(path) {
            return Err(not_found(path));
        }
        let has_content = tree.files.keys().any(|file| file.starts_with(path))
            || tree.dirs.iter().any(|dir| dir != path && dir.starts_with(path));
        if has_content && !recursive {
            return Err(io::Error::new(
                ErrorKind::DirectoryNotEmpty,
                format!("directory not empty: {}", path.display()),
            ));
        }
        tree.files.retain(|file, _| !file.starts_with(path));
        tree.dirs.retain(|dir| !dir.starts_with(path));
        Ok(())
    }

    fn list_files(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let tree = self.tree();
        if !tree.dirs.contains(path) {
            return Err(not_found(path));
        }
        Ok(MemoryTree::children(tree.files.keys(), path))
    }

    fn list_subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let tree = self.tree();
        if !tree.dirs.contains(path) {
            return Err(not_found(path));
        }
        Ok(MemoryTree::children(tree.dirs.iter(), path))
    }
}
