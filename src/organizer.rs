//! Scan, classify and relocate: the entry points a front end needs.
//!
//! An [`Organizer`] owns the undo history for one session. Every run goes through
//! [`Organizer::organize`]; the moves it makes can be reverted one at a time with
//! [`Organizer::undo_last`] or all together with [`Organizer::undo_all_and_cleanup`].

use crate::command::RelocationCommand;
use crate::config::{ConfigError, ScanConfig, ScanFilter};
use crate::fs::FileAccess;
use crate::record::{self, FileRecord};
use crate::relocate::{Clock, OrganizeError, OrganizeResult, Relocation, Relocator};
use crate::rules::RuleSet;
use crate::sink::LogSink;
use crate::undo::{CommandHistory, UndoReport};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;

/// Per-run count of files by destination folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    counts: HashMap<String, usize>,
}

impl CategoryTally {
    pub fn record(&mut self, folder: &str) {
        *self.counts.entry(folder.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, folder: &str) -> usize {
        self.counts.get(folder).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Folder counts sorted by folder name.
    pub fn sorted(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<_> = self
            .counts
            .iter()
            .map(|(folder, count)| (folder.as_str(), *count))
            .collect();
        entries.sort_by_key(|&(folder, _)| folder);
        entries
    }

    pub fn as_map(&self) -> &HashMap<String, usize> {
        &self.counts
    }
}

/// Where a file would go, reported by a simulated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub file: PathBuf,
    pub folder: String,
    pub destination: PathBuf,
}

/// What one call to [`Organizer::organize`] did or would do.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub root: PathBuf,
    pub simulated: bool,
    pub planned: Vec<PlannedMove>,
    pub moves: Vec<Relocation>,
    pub tally: CategoryTally,
}

impl RunSummary {
    fn new(root: &Path, simulated: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            simulated,
            planned: Vec::new(),
            moves: Vec::new(),
            tally: CategoryTally::default(),
        }
    }

    /// Number of files moved, or that would be moved in a simulation.
    pub fn file_count(&self) -> usize {
        self.tally.total()
    }
}

/// Scan behavior for a run.
#[derive(Debug, Clone, Default)]
pub struct OrganizeOptions {
    pub recursive: bool,
    pub parallel: bool,
    pub filter: ScanFilter,
}

impl OrganizeOptions {
    pub fn from_config(scan: &ScanConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            recursive: scan.recursive,
            parallel: scan.parallel,
            filter: scan.compile()?,
        })
    }
}

/// Classifies files by extension and moves them into category folders, recording
/// every move so it can be undone.
pub struct Organizer {
    relocator: Relocator,
    history: CommandHistory,
    rules: RuleSet,
    sink: Arc<dyn LogSink>,
    options: OrganizeOptions,
}

impl Organizer {
    pub fn new(fs: Arc<dyn FileAccess>, rules: RuleSet, sink: Arc<dyn LogSink>) -> Self {
        Self {
            relocator: Relocator::new(Arc::clone(&fs)),
            history: CommandHistory::new(fs),
            rules,
            sink,
            options: OrganizeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OrganizeOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses `clock` for conflict-rename timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.relocator = self.relocator.with_clock(clock);
        self
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn options(&self) -> &OrganizeOptions {
        &self.options
    }

    /// Destination folder for a record.
    pub fn classify(&self, record: &FileRecord) -> &str {
        self.rules.classify(&record.extension)
    }

    /// Lists the files to organize under `folder`.
    ///
    /// Only the top level is scanned unless the recursive option is set; recursion never
    /// enters a folder named after a category. Files rejected by the scan filter are
    /// skipped.
    pub fn scan(&self, folder: &Path) -> OrganizeResult<Vec<FileRecord>> {
        let fs = self.relocator.file_access();
        if !fs.dir_exists(folder) {
            return Err(OrganizeError::InvalidBasePath {
                path: folder.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "not an existing directory"),
            });
        }

        let category_folders: HashSet<String> = self.rules.folder_names().into_iter().collect();
        let mut records = Vec::new();
        let mut pending = vec![folder.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let files = fs.list_files(&dir).map_err(|source| OrganizeError::ScanFailed {
                path: dir.clone(),
                source,
            })?;
            records.extend(
                files
                    .into_iter()
                    .filter(|path| self.options.filter.should_include(path))
                    .map(FileRecord::new),
            );

            if self.options.recursive {
                let subdirs = fs
                    .list_subdirectories(&dir)
                    .map_err(|source| OrganizeError::ScanFailed {
                        path: dir.clone(),
                        source,
                    })?;
                // Reversed so directories are visited in listing order.
                pending.extend(
                    subdirs
                        .into_iter()
                        .rev()
                        .filter(|sub| !category_folders.contains(&record::file_name(sub))),
                );
            }
        }

        tracing::debug!(folder = %folder.display(), files = records.len(), "scanned folder");
        Ok(records)
    }

    /// Organizes `folder`.
    ///
    /// With `simulate` set nothing on disk changes; the summary lists where each file
    /// would go. Otherwise every file is moved through the undo history. The run stops
    /// at the first file that cannot be moved; moves already made stay undoable.
    pub fn organize(&mut self, folder: &Path, simulate: bool) -> OrganizeResult<RunSummary> {
        let records = self.scan(folder)?;
        let mut summary = RunSummary::new(folder, simulate);

        tracing::info!(
            folder = %folder.display(),
            files = records.len(),
            simulate,
            parallel = self.options.parallel,
            "starting organization"
        );

        if self.options.parallel {
            self.organize_parallel(records, simulate, &mut summary)?;
        } else {
            let total = records.len();
            for (index, record) in records.into_iter().enumerate() {
                let folder_name = self.classify(&record).to_string();
                tracing::debug!(file = %record.name, folder = %folder_name, "classified");
                self.handle(record, folder_name, simulate, &mut summary)?;
                self.sink.progress(index + 1, total);
            }
        }

        self.log_summary(&summary);
        Ok(summary)
    }

    /// Classifies on the rayon pool and funnels results to this thread, which alone
    /// executes commands and updates the tally. History order is arrival order.
    fn organize_parallel(
        &mut self,
        records: Vec<FileRecord>,
        simulate: bool,
        summary: &mut RunSummary,
    ) -> OrganizeResult<()> {
        let total = records.len();
        let rules = self.rules.clone();
        let (sender, receiver) = mpsc::channel::<(FileRecord, String)>();

        thread::scope(|scope| -> OrganizeResult<()> {
            scope.spawn(move || {
                records
                    .into_par_iter()
                    .for_each_with(sender, |sender, record| {
                        let folder = rules.classify(&record.extension).to_string();
                        tracing::debug!(file = %record.name, folder = %folder, "classified");
                        // Fails only once the consumer stopped on an error.
                        let _ = sender.send((record, folder));
                    });
            });

            for (done, (record, folder)) in receiver.into_iter().enumerate() {
                self.handle(record, folder, simulate, summary)?;
                self.sink.progress(done + 1, total);
            }
            Ok(())
        })
    }

    fn handle(
        &mut self,
        record: FileRecord,
        folder: String,
        simulate: bool,
        summary: &mut RunSummary,
    ) -> OrganizeResult<()> {
        if simulate {
            let destination = record
                .current_path
                .parent()
                .map(|parent| parent.join(&folder).join(&record.name))
                .unwrap_or_default();
            self.sink
                .log(&format!("SIMULATE: Would move {} to {}", record.name, folder));
            summary.tally.record(&folder);
            summary.planned.push(PlannedMove {
                file: record.current_path,
                folder,
                destination,
            });
            return Ok(());
        }

        let name = record.name.clone();
        let command = RelocationCommand::new(record, folder.clone(), self.relocator.clone());
        match self.history.execute(command) {
            Ok(relocation) => {
                if let Some(relocation) = relocation {
                    if relocation.renamed {
                        self.sink.log(&format!(
                            "{} already exists in {}, saved as {}",
                            name,
                            folder,
                            record::file_name(&relocation.to)
                        ));
                    }
                    summary.moves.push(relocation);
                }
                self.sink.log(&format!("Moved {} to {}", name, folder));
                summary.tally.record(&folder);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "move failed");
                self.sink.log(&format!("Failed to move {}: {}", name, e));
                Err(e)
            }
        }
    }

    fn log_summary(&self, summary: &RunSummary) {
        self.sink.log("=== Organization Summary ===");
        for (folder, count) in summary.tally.sorted() {
            self.sink.log(&format!("{}: {} {}", folder, count, plural(count)));
        }
        self.sink.log(&format!(
            "Total: {} {}",
            summary.tally.total(),
            plural(summary.tally.total())
        ));
    }

    /// Reverts the most recent move. Returns `Ok(None)` when there is nothing to undo.
    pub fn undo_last(&mut self) -> OrganizeResult<Option<Relocation>> {
        match self.history.undo() {
            Ok(Some(relocation)) => {
                self.sink.log(&format!(
                    "Restored {} to {}",
                    record::file_name(&relocation.to),
                    relocation.to.display()
                ));
                for dir in &relocation.pruned {
                    self.sink
                        .log(&format!("Removed empty folder {}", dir.display()));
                }
                if !self.history.is_empty() {
                    self.sink.log(&format!(
                        "{} more {} can be undone",
                        self.history.len(),
                        if self.history.len() == 1 { "step" } else { "steps" }
                    ));
                }
                Ok(Some(relocation))
            }
            Ok(None) => {
                self.sink.log("No actions to undo.");
                Ok(None)
            }
            Err(e) => {
                self.sink.log(&format!("Undo failed: {}", e));
                Err(e)
            }
        }
    }

    /// Reverts every recorded move, newest first, then removes empty folders under `root`.
    pub fn undo_all_and_cleanup(&mut self, root: &Path) -> UndoReport {
        let folders = self.rules.folder_names();
        let report = self.history.undo_all_and_cleanup(root, &folders);

        self.sink.log(&format!(
            "Restored {} {}",
            report.restored_files(),
            plural(report.restored_files())
        ));
        if let Some((path, reason)) = &report.failed {
            self.sink
                .log(&format!("Undo stopped at {}: {}", path.display(), reason));
        }
        if !report.removed_dirs.is_empty() {
            self.sink.log(&format!(
                "Removed {} empty {}",
                report.removed_dirs.len(),
                if report.removed_dirs.len() == 1 { "folder" } else { "folders" }
            ));
        }
        for (path, reason) in &report.cleanup_errors {
            self.sink
                .log(&format!("Could not clean up {}: {}", path.display(), reason));
        }
        report
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use crate::rules::ClassificationRule;
    use crate::sink::MemorySink;

    const ROOT: &str = "/test_folder";

    fn scenario_rules() -> RuleSet {
        RuleSet::new(vec![
            ClassificationRule::new(".pdf", "Documents"),
            ClassificationRule::new(".jpg", "Images"),
            ClassificationRule::new(".mp4", "Videos"),
        ])
    }

    fn setup() -> (Arc<MemoryFs>, Arc<MemorySink>, Organizer) {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file(format!("{}/doc1.pdf", ROOT), "PDF content");
        fs.add_file(format!("{}/img1.jpg", ROOT), "JPG content");
        fs.add_file(format!("{}/vid1.mp4", ROOT), "MP4 content");
        fs.add_file(format!("{}/unknown.xyz", ROOT), "Unknown content");
        let sink = Arc::new(MemorySink::new());
        let organizer = Organizer::new(fs.clone(), scenario_rules(), sink.clone());
        (fs, sink, organizer)
    }

    fn exists(fs: &MemoryFs, rel: &str) -> bool {
        fs.file_exists(&Path::new(ROOT).join(rel))
    }

    #[test]
    fn test_organize_moves_files_to_category_folders() {
        let (fs, _, mut organizer) = setup();

        let summary = organizer.organize(Path::new(ROOT), false).unwrap();

        assert!(exists(&fs, "Documents/doc1.pdf"));
        assert!(exists(&fs, "Images/img1.jpg"));
        assert!(exists(&fs, "Videos/vid1.mp4"));
        assert!(exists(&fs, "Others/unknown.xyz"));
        assert_eq!(summary.moves.len(), 4);
        assert_eq!(organizer.history().len(), 4);
    }

    #[test]
    fn test_simulation_does_not_move_files() {
        let (fs, sink, mut organizer) = setup();
        let before = (fs.all_files(), fs.all_dirs());

        let summary = organizer.organize(Path::new(ROOT), true).unwrap();

        assert_eq!((fs.all_files(), fs.all_dirs()), before);
        assert!(organizer.history().is_empty());
        assert_eq!(summary.planned.len(), 4);
        assert!(summary.moves.is_empty());
        assert!(sink.contains("SIMULATE: Would move doc1.pdf to Documents"));
        let planned = summary
            .planned
            .iter()
            .find(|plan| plan.folder == "Images")
            .expect("jpg should be planned");
        assert_eq!(planned.destination, Path::new(ROOT).join("Images/img1.jpg"));
    }

    #[test]
    fn test_four_undos_restore_everything() {
        let (fs, _, mut organizer) = setup();
        organizer.organize(Path::new(ROOT), false).unwrap();

        for _ in 0..4 {
            assert!(organizer.undo_last().unwrap().is_some());
        }

        for name in ["doc1.pdf", "img1.jpg", "vid1.mp4", "unknown.xyz"] {
            assert!(exists(&fs, name), "{} should be restored", name);
        }
        for folder in ["Documents", "Images", "Videos", "Others"] {
            assert!(!fs.dir_exists(&Path::new(ROOT).join(folder)));
        }
        assert!(organizer.history().is_empty());
    }

    #[test]
    fn test_undo_with_empty_history() {
        let (fs, sink, mut organizer) = setup();
        let before = fs.all_files();

        assert!(organizer.undo_last().unwrap().is_none());
        assert_eq!(fs.all_files(), before);
        assert!(sink.contains("No actions to undo."));
    }

    #[test]
    fn test_summary_logged_once_per_run() {
        let (_, sink, mut organizer) = setup();

        let summary = organizer.organize(Path::new(ROOT), false).unwrap();

        let headers = sink
            .lines()
            .iter()
            .filter(|line| line.contains("Organization Summary"))
            .count();
        assert_eq!(headers, 1);
        assert!(sink.contains("Documents: 1 file"));
        assert!(sink.contains("Total: 4 files"));
        assert_eq!(summary.tally.get("Others"), 1);
    }

    #[test]
    fn test_tally_is_reset_each_run() {
        let (fs, _, mut organizer) = setup();
        organizer.organize(Path::new(ROOT), true).unwrap();
        fs.add_file(format!("{}/doc2.pdf", ROOT), "PDF content");

        let second = organizer.organize(Path::new(ROOT), true).unwrap();

        assert_eq!(second.tally.get("Documents"), 2);
        assert_eq!(second.tally.total(), 5);
    }

    #[test]
    fn test_invalid_folder_is_rejected_before_mutation() {
        let (fs, _, mut organizer) = setup();
        let before = fs.all_files();

        let result = organizer.organize(Path::new("/missing"), false);

        assert!(matches!(result, Err(OrganizeError::InvalidBasePath { .. })));
        assert_eq!(fs.all_files(), before);
    }

    #[test]
    fn test_failure_stops_batch_and_keeps_recorded_moves() {
        let (fs, sink, mut organizer) = setup();
        // Files are handled in path order: doc1.pdf, img1.jpg, unknown.xyz, vid1.mp4.
        fs.deny(format!("{}/unknown.xyz", ROOT));

        let result = organizer.organize(Path::new(ROOT), false);

        assert!(matches!(result, Err(OrganizeError::FileMoveFailure { .. })));
        assert!(sink.contains("Failed to move unknown.xyz"));
        assert_eq!(organizer.history().len(), 2);
        assert!(exists(&fs, "vid1.mp4"));

        organizer.undo_last().unwrap();
        organizer.undo_last().unwrap();
        assert!(exists(&fs, "doc1.pdf"));
        assert!(exists(&fs, "img1.jpg"));
    }

    #[test]
    fn test_conflict_is_logged_and_existing_file_untouched() {
        let (fs, sink, mut organizer) = setup();
        fs.add_file(format!("{}/Documents/doc1.pdf", ROOT), "already there");

        let summary = organizer.organize(Path::new(ROOT), false).unwrap();

        assert_eq!(
            fs.read(format!("{}/Documents/doc1.pdf", ROOT)),
            Some(b"already there".to_vec())
        );
        let renamed = summary
            .moves
            .iter()
            .find(|relocation| relocation.renamed)
            .expect("one move should be renamed");
        assert_eq!(fs.read(&renamed.to), Some(b"PDF content".to_vec()));
        assert!(sink.contains("already exists in Documents"));
    }

    #[test]
    fn test_undo_all_and_cleanup() {
        let (fs, sink, mut organizer) = setup();
        organizer.organize(Path::new(ROOT), false).unwrap();

        let report = organizer.undo_all_and_cleanup(Path::new(ROOT));

        assert!(report.is_complete_success());
        assert_eq!(report.restored_files(), 4);
        assert_eq!(fs.list_subdirectories(Path::new(ROOT)).unwrap().len(), 0);
        assert_eq!(fs.list_files(Path::new(ROOT)).unwrap().len(), 4);
        assert!(sink.contains("Restored 4 files"));
    }

    #[test]
    fn test_parallel_organize_matches_sequential() {
        let fs = Arc::new(MemoryFs::new());
        let extensions = [".pdf", ".jpg", ".mp4", ".xyz"];
        for i in 0..100 {
            fs.add_file(format!("{}/file{:03}{}", ROOT, i, extensions[i % 4]), "data");
        }
        let options = OrganizeOptions {
            parallel: true,
            ..OrganizeOptions::default()
        };
        let mut organizer = Organizer::new(fs.clone(), scenario_rules(), Arc::new(MemorySink::new()))
            .with_options(options);

        let summary = organizer.organize(Path::new(ROOT), false).unwrap();

        for folder in ["Documents", "Images", "Videos", "Others"] {
            assert_eq!(summary.tally.get(folder), 25);
            assert_eq!(
                fs.list_files(&Path::new(ROOT).join(folder)).unwrap().len(),
                25
            );
        }
        assert_eq!(organizer.history().len(), 100);

        // Undo follows the order commands were pushed.
        let pushed: Vec<PathBuf> = organizer
            .history()
            .iter()
            .map(|command| command.record().current_path.clone())
            .collect();
        let restored = organizer.undo_last().unwrap().expect("should undo");
        assert_eq!(Some(&restored.from), pushed.last());
    }

    #[test]
    fn test_recursive_scan_skips_category_folders() {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file(format!("{}/top.pdf", ROOT), "a");
        fs.add_file(format!("{}/nested/deep.jpg", ROOT), "b");
        fs.add_file(format!("{}/Images/already.jpg", ROOT), "c");
        let options = OrganizeOptions {
            recursive: true,
            ..OrganizeOptions::default()
        };
        let organizer = Organizer::new(fs.clone(), scenario_rules(), Arc::new(MemorySink::new()))
            .with_options(options);

        let names: Vec<String> = organizer
            .scan(Path::new(ROOT))
            .unwrap()
            .into_iter()
            .map(|record| record.name)
            .collect();

        assert_eq!(names, vec!["top.pdf", "deep.jpg"]);
    }

    #[test]
    fn test_scan_filter_skips_hidden_files() {
        let (fs, _, organizer) = setup();
        fs.add_file(format!("{}/.hidden.pdf", ROOT), "secret");

        let records = organizer.scan(Path::new(ROOT)).unwrap();

        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|record| record.name != ".hidden.pdf"));
    }
}
