//! A single reversible relocation.

use crate::record::FileRecord;
use crate::relocate::{OrganizeResult, Relocation, Relocator};

/// Lifecycle of a [`RelocationCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Pending,
    Executed,
    Undone,
}

/// Moves one file into a category folder and can move it back exactly once.
#[derive(Debug, Clone)]
pub struct RelocationCommand {
    record: FileRecord,
    destination: String,
    relocator: Relocator,
    state: CommandState,
}

impl RelocationCommand {
    pub fn new(record: FileRecord, destination: impl Into<String>, relocator: Relocator) -> Self {
        Self {
            record,
            destination: destination.into(),
            relocator,
            state: CommandState::Pending,
        }
    }

    /// Performs the move. On failure the command stays in its previous state.
    ///
    /// Returns `Ok(None)` if the command is already executed.
    pub fn execute(&mut self) -> OrganizeResult<Option<Relocation>> {
        if self.state == CommandState::Executed {
            tracing::debug!(file = %self.record.name, "command already executed");
            return Ok(None);
        }
        let relocation = self.relocator.relocate(&mut self.record, &self.destination)?;
        self.state = CommandState::Executed;
        Ok(Some(relocation))
    }

    /// Moves the file back to where it was first seen.
    ///
    /// A no-op returning `Ok(None)` unless the command is currently executed and the
    /// record knows its original path. If the move fails the command stays executed so
    /// the undo can be retried.
    pub fn undo(&mut self) -> OrganizeResult<Option<Relocation>> {
        if self.state != CommandState::Executed {
            return Ok(None);
        }
        let Some(original) = self.record.original_path.clone() else {
            tracing::warn!(file = %self.record.name, "no original path recorded, nothing to undo");
            return Ok(None);
        };

        let relocation = self
            .relocator
            .relocate_to_exact_path(&mut self.record, &original)?;
        self.state = CommandState::Undone;
        Ok(Some(relocation))
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn record(&self) -> &FileRecord {
        &self.record
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}
