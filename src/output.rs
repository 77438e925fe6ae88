//! Output formatting and styling module.
//!
//! Everything the terminal front end prints goes through here: styled one-line
//! messages, the per-run progress bar, and the category summary table.

use crate::organizer::{CategoryTally, RunSummary};
use crate::sink::LogSink;
use crate::undo::UndoReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard};

const PROGRESS_TEMPLATE: &str = "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Styled terminal output.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyfold::output::OutputFormatter;
    /// OutputFormatter::success("All files restored");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` files.
    ///
    /// ```no_run
    /// use tidyfold::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .map(|style| style.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let pb = ProgressBar::new(total);
        pb.set_style(style);
        pb
    }

    /// Prints the per-category table for a run.
    pub fn summary_table(tally: &CategoryTally) {
        Self::header("SUMMARY");
        print!("{}", render_summary_table(tally));
    }

    /// Prints the totals of a simulated run. Per-file lines were already logged by the sink.
    pub fn plan(summary: &RunSummary) {
        if summary.planned.is_empty() {
            Self::info("No files found to organize.");
            return;
        }
        Self::summary_table(&summary.tally);
    }

    /// Prints what is left to do after an undo-all. Per-step lines come from the sink.
    pub fn undo_report(report: &UndoReport) {
        if report.failed.is_some() {
            Self::warning("The remaining moves are still in the history and can be retried.");
        } else if report.is_complete_success() {
            Self::success("Folder restored");
        }
    }

    /// Prints a notice that nothing was changed.
    pub fn preview_notice(message: &str) {
        println!("{}", format!("[PREVIEW] {}", message).yellow());
    }
}

/// Renders the summary table rows, sorted by folder name.
pub fn render_summary_table(tally: &CategoryTally) -> String {
    let categories = tally.sorted();
    let width = categories
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0)
        .max(8);

    let mut out = String::new();
    let _ = writeln!(out, "{:<width$} | {}", "Category".bold(), "Files".bold());
    let _ = writeln!(out, "{}", "-".repeat(width + 10));
    for (category, count) in &categories {
        let _ = writeln!(
            out,
            "{:<width$} | {} {}",
            category,
            count.to_string().green(),
            if *count == 1 { "file" } else { "files" }
        );
    }
    let _ = writeln!(out, "{}", "-".repeat(width + 10));
    let total = tally.total();
    let _ = writeln!(
        out,
        "{:<width$} | {} {}",
        "Total".bold(),
        total.to_string().green().bold(),
        if total == 1 { "file" } else { "files" }
    );
    out
}

/// [`LogSink`] for the terminal: colored lines plus a progress bar while a run is going.
pub struct ConsoleSink {
    show_progress: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new(show_progress: bool) -> Self {
        Self {
            show_progress,
            bar: Mutex::new(None),
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clears a progress bar left over by a run that stopped early.
    pub fn finish(&self) {
        if let Some(pb) = self.bar().take() {
            pb.finish_and_clear();
        }
    }
}

impl LogSink for ConsoleSink {
    fn log(&self, message: &str) {
        let line = style_line(message).to_string();
        match self.bar().as_ref() {
            // Printing above the bar keeps it from being torn.
            Some(pb) => pb.println(line),
            None => println!("{}", line),
        }
    }

    fn progress(&self, done: usize, total: usize) {
        if !self.show_progress || total == 0 {
            return;
        }
        let mut guard = self.bar();
        if done >= total {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
            return;
        }
        guard
            .get_or_insert_with(|| OutputFormatter::create_progress_bar(total as u64))
            .set_position(done as u64);
    }
}

fn style_line(message: &str) -> ColoredString {
    if message.starts_with("SIMULATE") {
        message.yellow()
    } else if message.starts_with("Moved") || message.starts_with("Restored") {
        message.green()
    } else if message.starts_with("Failed") || message.starts_with("Undo failed") {
        message.red()
    } else if message.starts_with("===") {
        message.bold()
    } else if message.contains("already exists") || message.starts_with("Could not") {
        message.yellow()
    } else {
        message.normal()
    }
}
