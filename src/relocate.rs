/// Relocation primitive for moving files into category folders and back.
///
/// This module owns the conflict-resolving move, the reverse move used by undo and
/// the upward pruning of directories that become empty after a file leaves them.
use crate::fs::FileAccess;
use crate::record::{self, FileRecord};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while organizing or restoring files.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The scan folder is missing or not a directory.
    #[error("Invalid base path {}: {source}", .path.display())]
    InvalidBasePath { path: PathBuf, source: io::Error },

    /// Failed to list a directory while scanning.
    #[error("Failed to read directory {}: {source}", .path.display())]
    ScanFailed { path: PathBuf, source: io::Error },

    /// Failed to create a category directory.
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to move a file.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// The file path has no parent directory or no name.
    #[error("Invalid file path {}: {reason}", .path.display())]
    InvalidFilePath { path: PathBuf, reason: String },
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Describes one completed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relocation {
    pub from: PathBuf,
    pub to: PathBuf,
    /// True when the file was renamed to avoid overwriting an existing one.
    pub renamed: bool,
    /// Directories deleted because the move left them empty.
    pub pruned: Vec<PathBuf>,
}

/// Source of the timestamp used in conflict names.
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Moves files through a [`FileAccess`] layer.
///
/// Cheap to clone; every command holds its own copy sharing the same file system.
#[derive(Clone)]
pub struct Relocator {
    fs: Arc<dyn FileAccess>,
    clock: Clock,
}

impl std::fmt::Debug for Relocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relocator").finish_non_exhaustive()
    }
}

impl Relocator {
    pub fn new(fs: Arc<dyn FileAccess>) -> Self {
        Self {
            fs,
            clock: local_now,
        }
    }

    /// Uses `clock` instead of the local wall clock for conflict names.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn file_access(&self) -> &Arc<dyn FileAccess> {
        &self.fs
    }

    /// Moves `file` into the folder `destination_folder` next to it.
    ///
    /// The folder is created if missing. If a file with the same name already lives
    /// there, the incoming file gets a timestamp suffix instead of overwriting it.
    /// `file.original_path` is captured on the first move only; both path fields are
    /// updated only after the move succeeded.
    ///
    /// # Examples
    ///
    /// ```
    /// use tidyfold::fs::MemoryFs;
    /// use tidyfold::record::FileRecord;
    /// use tidyfold::relocate::Relocator;
    /// use std::sync::Arc;
    ///
    /// let fs = Arc::new(MemoryFs::new());
    /// fs.add_file("/inbox/photo.jpg", "jpg");
    ///
    /// let mut record = FileRecord::new("/inbox/photo.jpg");
    /// Relocator::new(fs.clone()).relocate(&mut record, "Images").unwrap();
    ///
    /// assert_eq!(record.current_path.to_str(), Some("/inbox/Images/photo.jpg"));
    /// assert_eq!(record.original_path.as_deref().and_then(|p| p.to_str()), Some("/inbox/photo.jpg"));
    /// ```
    pub fn relocate(
        &self,
        file: &mut FileRecord,
        destination_folder: &str,
    ) -> OrganizeResult<Relocation> {
        let parent = parent_of(&file.current_path)?;
        let destination_dir = parent.join(destination_folder);

        if !self.fs.dir_exists(&destination_dir) {
            self.fs.create_dir(&destination_dir).map_err(|source| {
                OrganizeError::DirectoryCreationFailed {
                    path: destination_dir.clone(),
                    source,
                }
            })?;
        }

        let wanted = destination_dir.join(&file.name);
        let destination = self.resolve_conflict(&wanted);
        let from = file.current_path.clone();

        self.move_file(&from, &destination)?;

        if file.original_path.is_none() {
            file.original_path = Some(from.clone());
        }
        file.current_path = destination.clone();

        tracing::debug!(from = %from.display(), to = %destination.display(), "relocated file");
        Ok(Relocation {
            renamed: destination != wanted,
            from,
            to: destination,
            pruned: Vec::new(),
        })
    }

    /// Moves `file` to the exact path `full_path`, then prunes the directory it left.
    ///
    /// Used by undo. The target's parent is recreated if it disappeared, and an occupied
    /// target is handled with the same timestamp rename as [`Relocator::relocate`].
    pub fn relocate_to_exact_path(
        &self,
        file: &mut FileRecord,
        full_path: &Path,
    ) -> OrganizeResult<Relocation> {
        let target_dir = parent_of(full_path)?;
        if !self.fs.dir_exists(target_dir) {
            self.fs.create_dir(target_dir).map_err(|source| {
                OrganizeError::DirectoryCreationFailed {
                    path: target_dir.to_path_buf(),
                    source,
                }
            })?;
        }

        let destination = self.resolve_conflict(full_path);
        let from = file.current_path.clone();

        self.move_file(&from, &destination)?;
        file.current_path = destination.clone();

        let pruned = match from.parent() {
            Some(vacated) => self.prune_empty_ancestors(vacated),
            None => Vec::new(),
        };

        tracing::debug!(
            from = %from.display(),
            to = %destination.display(),
            pruned = pruned.len(),
            "restored file"
        );
        Ok(Relocation {
            renamed: destination != full_path,
            from,
            to: destination,
            pruned,
        })
    }

    /// Deletes `start` if it is empty, then each parent in turn while they are empty.
    ///
    /// Stops at the first directory that has content, is missing, or cannot be deleted.
    /// Never removes the file-system root. Errors are logged, not returned.
    pub fn prune_empty_ancestors(&self, start: &Path) -> Vec<PathBuf> {
        let mut pruned = Vec::new();

        for dir in start.ancestors() {
            // Stop before the root or an empty relative component.
            if dir.parent().is_none() || dir.as_os_str().is_empty() {
                break;
            }
            if !self.fs.dir_exists(dir) {
                break;
            }
            match self.fs.is_empty_dir(dir) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "could not inspect directory");
                    break;
                }
            }
            if let Err(e) = self.fs.remove_dir(dir, false) {
                tracing::warn!(path = %dir.display(), error = %e, "could not delete empty directory");
                break;
            }
            tracing::debug!(path = %dir.display(), "pruned empty directory");
            pruned.push(dir.to_path_buf());
        }

        pruned
    }

    /// Returns `wanted` if free, otherwise `stem_YYYYMMDDHHMMSS.ext` in the same folder.
    ///
    /// Two conflicts within the same second get an extra `_1`, `_2`, ... so an existing
    /// file is never overwritten.
    fn resolve_conflict(&self, wanted: &Path) -> PathBuf {
        if !self.fs.exists(wanted) {
            return wanted.to_path_buf();
        }

        let dir = wanted.parent().unwrap_or_else(|| Path::new(""));
        let stem = record::file_stem(wanted);
        let ext = record::raw_extension(wanted);
        let timestamp = (self.clock)().format("%Y%m%d%H%M%S");

        let mut candidate = dir.join(format!("{}_{}{}", stem, timestamp, ext));
        let mut counter = 1;
        while self.fs.exists(&candidate) {
            candidate = dir.join(format!("{}_{}_{}{}", stem, timestamp, counter, ext));
            counter += 1;
        }

        tracing::info!(
            wanted = %wanted.display(),
            renamed = %candidate.display(),
            "destination occupied, renaming incoming file"
        );
        candidate
    }

    fn move_file(&self, from: &Path, to: &Path) -> OrganizeResult<()> {
        self.fs
            .move_file(from, to)
            .map_err(|source| OrganizeError::FileMoveFailure {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            })
    }
}

fn parent_of(path: &Path) -> OrganizeResult<&Path> {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| OrganizeError::InvalidFilePath {
            path: path.to_path_buf(),
            reason: "path has no parent directory".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use chrono::NaiveDate;
    use regex::Regex;

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(14, 30, 52))
            .expect("valid date")
    }

    fn setup() -> (Arc<MemoryFs>, Relocator) {
        let fs = Arc::new(MemoryFs::new());
        let relocator = Relocator::new(fs.clone()).with_clock(fixed_clock);
        (fs, relocator)
    }

    #[test]
    fn test_relocate_creates_folder_and_moves() {
        let (fs, relocator) = setup();
        fs.add_file("/root/report.pdf", "pdf");
        let mut record = FileRecord::new("/root/report.pdf");

        let relocation = relocator
            .relocate(&mut record, "Documents")
            .expect("relocate should succeed");

        assert!(fs.dir_exists(Path::new("/root/Documents")));
        assert!(fs.file_exists(Path::new("/root/Documents/report.pdf")));
        assert!(!fs.file_exists(Path::new("/root/report.pdf")));
        assert_eq!(record.current_path, PathBuf::from("/root/Documents/report.pdf"));
        assert_eq!(record.original_path, Some(PathBuf::from("/root/report.pdf")));
        assert!(!relocation.renamed);
    }

    #[test]
    fn test_relocate_conflict_renames_with_timestamp() {
        let (fs, relocator) = setup();
        fs.add_file("/root/report.pdf", "incoming");
        fs.add_file("/root/Documents/report.pdf", "existing");
        let mut record = FileRecord::new("/root/report.pdf");

        let relocation = relocator
            .relocate(&mut record, "Documents")
            .expect("relocate should succeed");

        assert!(relocation.renamed);
        assert_eq!(
            record.current_path,
            PathBuf::from("/root/Documents/report_20240309143052.pdf")
        );
        assert_eq!(fs.read("/root/Documents/report.pdf"), Some(b"existing".to_vec()));
        assert_eq!(
            fs.read("/root/Documents/report_20240309143052.pdf"),
            Some(b"incoming".to_vec())
        );
    }

    #[test]
    fn test_conflict_name_uses_wall_clock_format() {
        let fs = Arc::new(MemoryFs::new());
        let relocator = Relocator::new(fs.clone());
        fs.add_file("/root/a.txt", "incoming");
        fs.add_file("/root/Notes/a.txt", "existing");
        let mut record = FileRecord::new("/root/a.txt");

        relocator.relocate(&mut record, "Notes").unwrap();

        let pattern = Regex::new(r"^a_\d{14}\.txt$").unwrap();
        assert!(pattern.is_match(&record::file_name(&record.current_path)));
    }

    #[test]
    fn test_same_second_conflicts_get_counter() {
        let (fs, relocator) = setup();
        fs.add_file("/root/Images/pic.jpg", "existing");
        fs.add_file("/root/Images/pic_20240309143052.jpg", "earlier conflict");
        fs.add_file("/root/pic.jpg", "incoming");
        let mut record = FileRecord::new("/root/pic.jpg");

        relocator.relocate(&mut record, "Images").unwrap();

        assert_eq!(
            record.current_path,
            PathBuf::from("/root/Images/pic_20240309143052_1.jpg")
        );
        assert_eq!(fs.all_files().len(), 3);
    }

    #[test]
    fn test_original_path_is_never_overwritten() {
        let (fs, relocator) = setup();
        fs.add_file("/root/a.txt", "a");
        let mut record = FileRecord::new("/root/a.txt");

        relocator.relocate(&mut record, "First").unwrap();
        relocator.relocate(&mut record, "Second").unwrap();

        assert_eq!(record.current_path, PathBuf::from("/root/First/Second/a.txt"));
        assert_eq!(record.original_path, Some(PathBuf::from("/root/a.txt")));
    }

    #[test]
    fn test_failed_move_leaves_record_untouched() {
        let (fs, relocator) = setup();
        fs.add_file("/root/a.txt", "a");
        fs.deny("/root/a.txt");
        let mut record = FileRecord::new("/root/a.txt");

        let result = relocator.relocate(&mut record, "Documents");

        assert!(matches!(result, Err(OrganizeError::FileMoveFailure { .. })));
        assert_eq!(record.current_path, PathBuf::from("/root/a.txt"));
        assert!(record.original_path.is_none());
    }

    #[test]
    fn test_relocate_to_exact_path_prunes_vacated_folder() {
        let (fs, relocator) = setup();
        fs.add_file("/root/a.txt", "a");
        let mut record = FileRecord::new("/root/a.txt");
        relocator.relocate(&mut record, "Documents").unwrap();

        let relocation = relocator
            .relocate_to_exact_path(&mut record, Path::new("/root/a.txt"))
            .expect("restore should succeed");

        assert!(fs.file_exists(Path::new("/root/a.txt")));
        assert!(!fs.dir_exists(Path::new("/root/Documents")));
        assert_eq!(relocation.pruned, vec![PathBuf::from("/root/Documents")]);
        assert!(fs.dir_exists(Path::new("/root")));
    }

    #[test]
    fn test_relocate_to_exact_path_keeps_non_empty_folder() {
        let (fs, relocator) = setup();
        fs.add_file("/root/a.txt", "a");
        fs.add_file("/root/Documents/other.txt", "other");
        let mut record = FileRecord::new("/root/a.txt");
        relocator.relocate(&mut record, "Documents").unwrap();

        let relocation = relocator
            .relocate_to_exact_path(&mut record, Path::new("/root/a.txt"))
            .unwrap();

        assert!(relocation.pruned.is_empty());
        assert!(fs.file_exists(Path::new("/root/Documents/other.txt")));
    }

    #[test]
    fn test_relocate_to_exact_path_recreates_missing_parent() {
        let (fs, relocator) = setup();
        fs.add_file("/root/Documents/a.txt", "a");
        let mut record = FileRecord::new("/root/Documents/a.txt");

        relocator
            .relocate_to_exact_path(&mut record, Path::new("/root/restored/deep/a.txt"))
            .unwrap();

        assert!(fs.file_exists(Path::new("/root/restored/deep/a.txt")));
        assert!(!fs.dir_exists(Path::new("/root/Documents")));
    }

    #[test]
    fn test_prune_walks_up_until_content() {
        let (fs, relocator) = setup();
        fs.add_file("/root/keep.txt", "keep");
        fs.add_dir("/root/a/b/c");

        let pruned = relocator.prune_empty_ancestors(Path::new("/root/a/b/c"));

        assert_eq!(
            pruned,
            vec![
                PathBuf::from("/root/a/b/c"),
                PathBuf::from("/root/a/b"),
                PathBuf::from("/root/a"),
            ]
        );
        assert!(fs.dir_exists(Path::new("/root")));
    }

    #[test]
    fn test_prune_stops_at_sibling_subdirectory() {
        let (fs, relocator) = setup();
        fs.add_dir("/root/a/b");
        fs.add_dir("/root/a/sibling");

        let pruned = relocator.prune_empty_ancestors(Path::new("/root/a/b"));

        assert_eq!(pruned, vec![PathBuf::from("/root/a/b")]);
        assert!(fs.dir_exists(Path::new("/root/a/sibling")));
    }

    #[test]
    fn test_prune_tolerates_missing_and_denied() {
        let (fs, relocator) = setup();
        assert!(relocator.prune_empty_ancestors(Path::new("/nowhere/x")).is_empty());

        fs.add_file("/root/keep.txt", "keep");
        fs.add_dir("/root/locked");
        fs.deny("/root/locked");
        assert!(relocator.prune_empty_ancestors(Path::new("/root/locked")).is_empty());
        assert!(fs.dir_exists(Path::new("/root/locked")));
    }
}
