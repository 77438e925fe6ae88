//! Command-line interface module for tidyfold.
//!
//! Handles argument parsing, the preview and confirmation step, and the interactive
//! session that lets the user undo moves before exiting.

use crate::config::Config;
use crate::fs::RealFs;
use crate::organizer::{OrganizeOptions, Organizer, RunSummary};
use crate::output::{ConsoleSink, OutputFormatter};
use crate::sink::{LogSink, NullSink};
use clap::Parser;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    name = "tidyfold",
    about = "Sort files into category folders by extension, with undo"
)]
pub struct Args {
    /// Folder to organize
    #[arg(value_hint = clap::ValueHint::DirPath, required_unless_present = "init_config")]
    pub directory: Option<PathBuf>,

    /// Use this configuration file instead of the default lookup
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only show where files would go
    #[arg(short, long)]
    pub preview: bool,

    /// Print plans and summaries as JSON and skip the interactive session
    #[arg(long)]
    pub json: bool,

    /// Organize without asking for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Also organize files in subfolders
    #[arg(short, long)]
    pub recursive: bool,

    /// Classify files on a thread pool
    #[arg(long)]
    pub parallel: bool,

    /// Print debug information
    #[arg(short, long)]
    pub verbose: bool,

    /// Write a default configuration file and exit
    #[arg(long, value_name = "FILE")]
    pub init_config: Option<PathBuf>,
}

/// A line typed during the interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Undo,
    UndoAll,
    History,
    Organize,
    Preview,
    Help,
    Quit,
}

impl SessionCommand {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "u" | "undo" => Some(Self::Undo),
            "undo-all" | "undoall" => Some(Self::UndoAll),
            "h" | "history" => Some(Self::History),
            "o" | "organize" => Some(Self::Organize),
            "p" | "preview" => Some(Self::Preview),
            "?" | "help" => Some(Self::Help),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    preview: &'a RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a RunSummary>,
}

/// Runs the CLI with parsed arguments.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use tidyfold::cli::{run, Args};
///
/// let args = Args::parse_from(["tidyfold", "/home/user/Downloads", "--preview"]);
/// if let Err(e) = run(args) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run(args: Args) -> Result<(), String> {
    if let Some(path) = &args.init_config {
        Config::write_default(path).map_err(|e| format!("Error writing configuration: {}", e))?;
        OutputFormatter::success(&format!("Wrote default configuration to {}", path.display()));
        if args.directory.is_none() {
            return Ok(());
        }
    }

    let Some(directory) = args.directory.clone() else {
        return Err("No directory given".to_string());
    };

    let config = Config::load(args.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let mut options = OrganizeOptions::from_config(&config.scan)
        .map_err(|e| format!("Error compiling filters: {}", e))?;
    options.recursive |= args.recursive;
    options.parallel |= args.parallel;

    let console = Arc::new(ConsoleSink::new(!args.json));
    let sink: Arc<dyn LogSink> = if args.json {
        Arc::new(NullSink)
    } else {
        console.clone()
    };
    let mut organizer =
        Organizer::new(Arc::new(RealFs), config.rule_set(), sink).with_options(options);

    if !args.json {
        OutputFormatter::info(&format!("Analyzing contents of: {}", directory.display()));
    }
    let preview = organizer
        .organize(&directory, true)
        .map_err(|e| e.to_string())?;

    // JSON output never prompts, so without --yes it stays a preview.
    if args.preview || (args.json && !args.yes) {
        if args.json {
            print_json(&JsonOutput {
                preview: &preview,
                result: None,
            })?;
        } else {
            OutputFormatter::plan(&preview);
            OutputFormatter::preview_notice("No files were modified.");
        }
        return Ok(());
    }

    if !args.json {
        OutputFormatter::plan(&preview);
    }
    if preview.planned.is_empty() {
        return Ok(());
    }
    if !args.yes && !confirm(&format!("Move {} files?", preview.file_count()))? {
        OutputFormatter::info("Nothing was changed.");
        return Ok(());
    }

    let outcome = organizer.organize(&directory, false);
    console.finish();
    match outcome {
        Ok(summary) => {
            if args.json {
                return print_json(&JsonOutput {
                    preview: &preview,
                    result: Some(&summary),
                });
            }
            OutputFormatter::success(&format!(
                "Organized {} files. Type 'undo' to revert the last move.",
                summary.file_count()
            ));
        }
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            if organizer.history().is_empty() || args.json {
                return Err(e.to_string());
            }
            OutputFormatter::warning("Moves made before the failure can still be undone.");
        }
    }

    let stdin = io::stdin();
    run_session(&mut organizer, &directory, stdin.lock())
}

/// Reads session commands from `input` until `quit` or end of input.
pub fn run_session<R: BufRead>(
    organizer: &mut Organizer,
    root: &Path,
    input: R,
) -> Result<(), String> {
    print_session_help();
    prompt();
    for line in input.lines() {
        let line = line.map_err(|e| format!("Error reading input: {}", e))?;
        match SessionCommand::parse(&line) {
            Some(SessionCommand::Quit) => break,
            Some(command) => execute_session_command(organizer, root, command),
            None if line.trim().is_empty() => {}
            None => OutputFormatter::warning(&format!(
                "Unknown command '{}'. Type 'help' for the list.",
                line.trim()
            )),
        }
        prompt();
    }

    if !organizer.history().is_empty() {
        OutputFormatter::info(&format!(
            "{} moves kept. Undo history ends with this session.",
            organizer.history().len()
        ));
    }
    Ok(())
}

fn execute_session_command(organizer: &mut Organizer, root: &Path, command: SessionCommand) {
    match command {
        SessionCommand::Undo => {
            // Success and empty-history lines come from the sink.
            if let Err(e) = organizer.undo_last() {
                OutputFormatter::error(&e.to_string());
            }
        }
        SessionCommand::UndoAll => {
            let report = organizer.undo_all_and_cleanup(root);
            OutputFormatter::undo_report(&report);
        }
        SessionCommand::History => print_history(organizer),
        SessionCommand::Organize => match organizer.organize(root, false) {
            Ok(summary) => {
                OutputFormatter::success(&format!("Organized {} files", summary.file_count()))
            }
            Err(e) => OutputFormatter::error(&e.to_string()),
        },
        SessionCommand::Preview => match organizer.organize(root, true) {
            Ok(summary) => OutputFormatter::plan(&summary),
            Err(e) => OutputFormatter::error(&e.to_string()),
        },
        SessionCommand::Help => print_session_help(),
        SessionCommand::Quit => {}
    }
}

fn print_history(organizer: &Organizer) {
    if organizer.history().is_empty() {
        OutputFormatter::info("History is empty.");
        return;
    }
    OutputFormatter::header("History (oldest first)");
    for (index, command) in organizer.history().iter().enumerate() {
        let record = command.record();
        let from = record
            .original_path
            .as_deref()
            .unwrap_or(&record.current_path);
        OutputFormatter::plain(&format!(
            "  {}. {} → {}",
            index + 1,
            from.display(),
            record.current_path.display()
        ));
    }
}

fn print_session_help() {
    OutputFormatter::header("Commands");
    OutputFormatter::plain("  undo      revert the most recent move");
    OutputFormatter::plain("  undo-all  revert every move and remove empty folders");
    OutputFormatter::plain("  history   list recorded moves");
    OutputFormatter::plain("  organize  organize the folder again");
    OutputFormatter::plain("  preview   show what organize would do");
    OutputFormatter::plain("  quit      exit");
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn confirm(question: &str) -> Result<bool, String> {
    print!("{} [y/N] ", question);
    io::stdout()
        .flush()
        .map_err(|e| format!("Error writing prompt: {}", e))?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .map_err(|e| format!("Error reading input: {}", e))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Error serializing output: {}", e))?;
    println!("{}", json);
    Ok(())
}
