//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress tracking, and formatted tables. This module abstracts away output details,
//! making it easy to change formatting globally.

use crate::executor::ExecutionResult;
use crate::file_category::Category;
use crate::organizer::Report;
use crate::plan::{BucketTotals, MoveEntry, MovePlan, MoveStatus};
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::rollback::RollbackSummary;
use crate::undo::UndoResult;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Number of planned moves shown before the list is elided.
pub const SAMPLE_MOVES: usize = 5;

/// Formats a byte count the way people read it: `512.0 B`, `1.5 KB`, `2.0 GB`.
///
/// ```
/// use filetidy::output::format_size;
///
/// assert_eq!(format_size(0), "0.0 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

/// Planned moves grouped by category, then year bucket.
pub type ProposedTree<'a> = BTreeMap<Category, BTreeMap<&'a str, Vec<&'a MoveEntry>>>;

pub fn proposed_tree(plan: &MovePlan) -> ProposedTree<'_> {
    let mut tree = ProposedTree::new();
    for entry in plan.entries.iter().filter(|e| e.status == MoveStatus::Planned) {
        tree.entry(entry.category)
            .or_default()
            .entry(entry.bucket.as_str())
            .or_default()
            .push(entry);
    }
    tree
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Path relative to `root` for display, or the full path when outside it.
fn display_rel<'a>(path: &'a Path, root: &Path) -> std::path::Display<'a> {
    path.strip_prefix(root).unwrap_or(path).display()
}

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use filetidy::output::OutputFormatter;
    /// OutputFormatter::success("Files organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
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

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for a batch of known size.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Creates a spinner for the scan, whose length is not known up front.
    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {pos} files")
                .expect("Invalid spinner template"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn totals_table<'a, I>(title: &str, rows: I, total: &BucketTotals)
    where
        I: IntoIterator<Item = (String, &'a BucketTotals)>,
    {
        Self::header(title);
        let rows: Vec<_> = rows.into_iter().collect();
        let width = rows.iter().map(|(name, _)| name.chars().count()).max().unwrap_or(0).max(8);

        println!(
            "{:<width$} | {:>7} | {:>10}",
            "Name".bold(),
            "Files".bold(),
            "Size".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 24));
        for (name, totals) in &rows {
            println!(
                "{:<width$} | {:>7} | {:>10}",
                name,
                totals.count.to_string().green(),
                format_size(totals.size),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 24));
        println!(
            "{:<width$} | {:>7} | {:>10}",
            "Total".bold(),
            total.count.to_string().green().bold(),
            format_size(total.size),
            width = width
        );
    }

    fn print_entry(entry: &MoveEntry, root: &Path) {
        println!("   {}", display_rel(&entry.source, root));
        println!("   → {}", display_rel(&entry.destination, root).to_string().cyan());
    }

    /// Prints the analysis: scan summary, per-category and per-year totals,
    /// and a sample of the planned moves.
    pub fn print_report(report: &Report, show_all: bool) {
        let plan = &report.plan;
        Self::header("ANALYSIS");
        println!("📁 Root: {}", report.root.display());
        println!(
            "📄 Files scanned: {} ({} on disk, {} counted)",
            report.scan.files_scanned,
            format_size(plan.stats.total.raw_size),
            format_size(plan.stats.total.size)
        );
        println!("🔒 Protected folders skipped: {}", report.scan.protected_found.len());
        if !report.scan.errors.is_empty() {
            Self::warning(&format!("{} entries could not be read", report.scan.errors.len()));
            for err in &report.scan.errors {
                println!("   {}", err.to_string().dimmed());
            }
        }

        let categories = plan.stats.by_category.iter().map(|(category, totals)| {
            (format!("{} {}", category.icon(), category), totals)
        });
        Self::totals_table("BY CATEGORY", categories, &plan.stats.total);
        let buckets = plan
            .stats
            .by_bucket
            .iter()
            .map(|(bucket, totals)| (bucket.clone(), totals));
        Self::totals_table("BY YEAR", buckets, &plan.stats.total);

        Self::print_plan(plan, show_all);
    }

    /// Prints what would move, grouped by category.
    pub fn print_plan(plan: &MovePlan, show_all: bool) {
        Self::header("PLANNED MOVES");
        let planned = plan.count(MoveStatus::Planned);
        if plan.stats.in_place > 0 {
            println!("Already organized: {} {}", plan.stats.in_place, plural(plan.stats.in_place));
        }
        if planned == 0 {
            Self::success("Nothing to move.");
            return;
        }
        let size: u64 = plan
            .entries
            .iter()
            .filter(|e| e.status == MoveStatus::Planned)
            .map(|e| e.effective_size)
            .sum();
        println!("To move: {} {} ({})", planned, plural(planned), format_size(size));

        for category in Category::ALL {
            let count = plan
                .entries
                .iter()
                .filter(|e| e.status == MoveStatus::Planned && e.category == category)
                .count();
            if count > 0 {
                println!("   {} {}: {} {}", category.icon(), category, count, plural(count));
            }
        }

        println!();
        let limit = if show_all { usize::MAX } else { SAMPLE_MOVES };
        for entry in plan
            .entries
            .iter()
            .filter(|e| e.status == MoveStatus::Planned)
            .take(limit)
        {
            Self::print_entry(entry, &plan.root);
        }
        if planned > limit {
            println!("   ... and {} more", planned - limit);
        }
    }

    pub fn print_tree(plan: &MovePlan, show_all: bool) {
        Self::header("PROPOSED STRUCTURE");
        let tree = proposed_tree(plan);
        if tree.is_empty() {
            Self::success("Nothing to move.");
            return;
        }
        let limit = if show_all { usize::MAX } else { SAMPLE_MOVES };
        for (category, years) in &tree {
            let count: usize = years.values().map(Vec::len).sum();
            println!(
                "{} {}/ ({} {})",
                category.icon(),
                category.dir_name().bold(),
                count,
                plural(count)
            );
            for (year, entries) in years {
                println!("   {}/ ({} {})", year, entries.len(), plural(entries.len()));
                for entry in entries.iter().take(limit) {
                    let name = entry
                        .destination
                        .file_name()
                        .map(|n| n.to_string_lossy())
                        .unwrap_or_default();
                    println!("      {} ({})", name, format_size(entry.size).dimmed());
                }
                if entries.len() > limit {
                    println!("      ... and {} more", entries.len() - limit);
                }
            }
        }
    }

    /// Numbered listing used by interactive review.
    pub fn print_numbered(plan: &MovePlan, by_category: bool) {
        let mut current: Option<Category> = None;
        for (index, entry) in plan.entries.iter().enumerate() {
            if by_category && current != Some(entry.category) {
                current = Some(entry.category);
                println!("\n{} {}:", entry.category.icon(), entry.category);
            }
            let mark = match entry.status {
                MoveStatus::Planned => "[x]".green(),
                MoveStatus::Skipped => "[ ]".dimmed(),
                MoveStatus::Moved => "[✓]".green(),
                MoveStatus::Failed => "[!]".red(),
            };
            println!(
                "  {:>3}. {} {} -> {}",
                index + 1,
                mark,
                display_rel(&entry.source, &plan.root),
                display_rel(&entry.destination, &plan.root)
            );
        }
    }

    pub fn print_execution(result: &ExecutionResult) {
        Self::header("EXECUTION COMPLETE");
        Self::success(&format!("Moved: {} {}", result.moved, plural(result.moved)));
        if result.renamed > 0 {
            Self::info(&format!("Renamed to avoid overwriting: {}", result.renamed));
        }
        if result.failed > 0 {
            Self::error(&format!("Failed: {} {}", result.failed, plural(result.failed)));
            for failure in &result.failures {
                println!(
                    "   {} ({}: {})",
                    failure.source.display(),
                    failure.reason.to_string().red(),
                    failure.message
                );
            }
        }
        if result.skipped > 0 {
            println!("⊘ Skipped: {} {}", result.skipped, plural(result.skipped));
        }
        if result.cancelled {
            Self::warning("Execution was cancelled; remaining files were left in place.");
        }

        match (&result.rollback_path, &result.rollback_error) {
            (Some(path), _) => {
                println!("\n💾 Rollback file: {}", path.display());
                println!("   To undo: filetidy undo {}", path.display());
            }
            (None, Some(err)) => Self::error(&format!("Rollback log was not written: {}", err)),
            (None, None) => {}
        }
    }

    pub fn print_undo(result: &UndoResult) {
        Self::header("UNDO COMPLETE");
        Self::success(&format!("Restored: {} {}", result.restored, plural(result.restored)));
        if result.failed > 0 {
            Self::error(&format!("Not restored: {} {}", result.failed, plural(result.failed)));
            for failure in &result.failures {
                println!(
                    "   {} ({}: {})",
                    failure.destination.display(),
                    failure.reason.to_string().red(),
                    failure.message
                );
            }
            Self::warning("The rollback file was kept so the remaining entries can be retried.");
        }
        if !result.removed_dirs.is_empty() {
            println!("🧹 Removed {} empty folder(s)", result.removed_dirs.len());
        }
    }

    pub fn print_rollbacks(dir: &Path, rollbacks: &[RollbackSummary]) {
        if rollbacks.is_empty() {
            Self::info(&format!("No rollback files in {}", dir.display()));
            return;
        }
        Self::header("ROLLBACK FILES");
        for summary in rollbacks {
            println!(
                "  {}  {} {}  {}",
                summary.created.format("%Y-%m-%d %H:%M:%S").to_string().cyan(),
                summary.moves,
                if summary.moves == 1 { "move" } else { "moves" },
                summary.path.display()
            );
        }
    }
}

/// Feeds progress events into an indicatif bar.
pub struct BarObserver(pub ProgressBar);

impl ProgressObserver for BarObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Some(total) = event.total {
            self.0.set_length(total as u64);
        }
        self.0.set_position(event.current as u64);
        if let Some(name) = event.path.file_name() {
            self.0.set_message(name.to_string_lossy().into_owned());
        }
    }
}
