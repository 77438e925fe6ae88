//! The file record tracked through relocations, plus the path helpers used to build it.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// One file under management.
///
/// `current_path` follows the file through every move. `original_path` is captured by
/// the first successful relocation and never overwritten afterwards; it is the anchor
/// used to undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Base name, e.g. `report.PDF`.
    pub name: String,
    /// Lower-cased, dot-prefixed extension (`.pdf`), empty when the file has none.
    pub extension: String,
    pub current_path: PathBuf,
    pub original_path: Option<PathBuf>,
}

impl FileRecord {
    /// Creates a record for a file observed at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let current_path = path.into();
        Self {
            name: file_name(&current_path),
            extension: extension(&current_path),
            current_path,
            original_path: None,
        }
    }

    /// Returns true once the record has been relocated at least once.
    pub fn has_moved(&self) -> bool {
        self.original_path.is_some()
    }
}

/// Base name of `path` as a string, empty if there is none.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Lower-cased, dot-prefixed extension of `path`, empty if there is none.
///
/// ```
/// use tidyfold::record::extension;
/// use std::path::Path;
///
/// assert_eq!(extension(Path::new("/tmp/Photo.JPG")), ".jpg");
/// assert_eq!(extension(Path::new("/tmp/Makefile")), "");
/// ```
pub fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// File name without its final extension, keeping the original case.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Original-case extension including the dot, used when rebuilding names.
pub(crate) fn raw_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
