/// Undo history for reverting file relocations.
///
/// Executed commands are kept on a LIFO stack. Undo pops the most recent command and
/// reverses it; undo-all unwinds the whole stack in reverse execution order and then
/// sweeps the empty folders left under the organized root.
use crate::command::RelocationCommand;
use crate::fs::FileAccess;
use crate::relocate::{OrganizeResult, Relocation};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of [`CommandHistory::undo_all_and_cleanup`].
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Moves that were reversed, most recent first.
    pub restored: Vec<Relocation>,
    /// The undo that stopped the unwinding, if any: file path and reason.
    pub failed: Option<(PathBuf, String)>,
    /// Directories removed by pruning and by the final sweep.
    pub removed_dirs: Vec<PathBuf>,
    /// Directories the sweep could not inspect or delete, with the reason.
    pub cleanup_errors: Vec<(PathBuf, String)>,
}

impl UndoReport {
    pub fn restored_files(&self) -> usize {
        self.restored.len()
    }

    /// Returns true if every command was undone and the sweep hit no errors.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_none() && self.cleanup_errors.is_empty()
    }
}

/// LIFO ledger of executed relocation commands.
pub struct CommandHistory {
    fs: Arc<dyn FileAccess>,
    commands: Vec<RelocationCommand>,
}

impl CommandHistory {
    pub fn new(fs: Arc<dyn FileAccess>) -> Self {
        Self {
            fs,
            commands: Vec::new(),
        }
    }

    /// Executes `command` and records it only if it succeeded.
    ///
    /// A failing command is dropped so there is never an undo for a move that did not
    /// happen.
    pub fn execute(&mut self, mut command: RelocationCommand) -> OrganizeResult<Option<Relocation>> {
        let relocation = command.execute()?;
        self.commands.push(command);
        tracing::debug!(size = self.commands.len(), "command recorded");
        Ok(relocation)
    }

    /// Undoes the most recent command.
    ///
    /// Returns `Ok(None)` when the history is empty. If the undo fails the command is put
    /// back on the stack so it can be retried.
    pub fn undo(&mut self) -> OrganizeResult<Option<Relocation>> {
        let Some(mut command) = self.commands.pop() else {
            tracing::debug!("nothing to undo");
            return Ok(None);
        };

        match command.undo() {
            Ok(relocation) => {
                tracing::debug!(size = self.commands.len(), "command undone");
                Ok(relocation)
            }
            Err(e) => {
                self.commands.push(command);
                Err(e)
            }
        }
    }

    /// Undoes every recorded command, most recent first, then removes empty folders.
    ///
    /// The sweep first deletes each of `category_folders` under `root` if it is empty,
    /// then walks the whole tree under `root` bottom-up and deletes every directory that
    /// is empty once its children were handled. `root` itself is kept. Sweep errors are
    /// collected in the report and never stop the cleanup.
    ///
    /// If one undo fails, unwinding stops and that command and all older ones stay in the
    /// history; the sweep still runs.
    pub fn undo_all_and_cleanup(&mut self, root: &Path, category_folders: &[String]) -> UndoReport {
        let mut report = UndoReport::default();

        while !self.commands.is_empty() {
            let file = self
                .commands
                .last()
                .map(|command| command.record().current_path.clone())
                .unwrap_or_default();
            match self.undo() {
                Ok(Some(relocation)) => {
                    report.removed_dirs.extend(relocation.pruned.iter().cloned());
                    report.restored.push(relocation);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "undo failed, stopping");
                    report.failed = Some((file, e.to_string()));
                    break;
                }
            }
        }

        self.sweep(root, category_folders, &mut report);
        report
    }

    fn sweep(&self, root: &Path, category_folders: &[String], report: &mut UndoReport) {
        for folder in category_folders {
            let dir = root.join(folder);
            if self.fs.dir_exists(&dir) {
                self.remove_if_empty(&dir, report);
            }
        }

        // Collect directories parents-first, then handle them in reverse so children are
        // always processed before their parent.
        let mut pending = vec![root.to_path_buf()];
        let mut discovered = Vec::new();
        while let Some(dir) = pending.pop() {
            match self.fs.list_subdirectories(&dir) {
                Ok(children) => {
                    for child in children {
                        discovered.push(child.clone());
                        pending.push(child);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "could not list directory");
                    report.cleanup_errors.push((dir, e.to_string()));
                }
            }
        }

        for dir in discovered.iter().rev() {
            self.remove_if_empty(dir, report);
        }
    }

    fn remove_if_empty(&self, dir: &Path, report: &mut UndoReport) {
        match self.fs.is_empty_dir(dir) {
            Ok(true) => match self.fs.remove_dir(dir, false) {
                Ok(()) => {
                    tracing::debug!(path = %dir.display(), "removed empty directory");
                    report.removed_dirs.push(dir.to_path_buf());
                }
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "could not delete directory");
                    report.cleanup_errors.push((dir.to_path_buf(), e.to_string()));
                }
            },
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "could not inspect directory");
                report.cleanup_errors.push((dir.to_path_buf(), e.to_string()));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Recorded commands, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RelocationCommand> {
        self.commands.iter()
    }
}
