//! tidyfold - sort a folder's files into category folders by extension
//!
//! Every move is recorded as a reversible command, so a run can be undone one step
//! at a time or all at once, with empty folders removed afterwards. File-system access
//! goes through the [`fs::FileAccess`] trait so the engine also runs against the
//! in-memory [`fs::MemoryFs`].

pub mod cli;
pub mod command;
pub mod config;
pub mod fs;
pub mod organizer;
pub mod output;
pub mod record;
pub mod relocate;
pub mod rules;
pub mod sink;
pub mod undo;

pub use command::{CommandState, RelocationCommand};
pub use config::{Config, ConfigError, ScanConfig, ScanFilter};
pub use fs::{FileAccess, MemoryFs, RealFs};
pub use organizer::{CategoryTally, OrganizeOptions, Organizer, PlannedMove, RunSummary};
pub use record::FileRecord;
pub use relocate::{OrganizeError, OrganizeResult, Relocation, Relocator};
pub use rules::{ClassificationRule, DEFAULT_FOLDER, RuleSet};
pub use sink::{LogSink, MemorySink, NullSink};
pub use undo::{CommandHistory, UndoReport};
