//! Command-line interface for filetidy.
//!
//! This module handles argument parsing and drives the library:
//! - `analyze` scans and prints the proposed layout without touching anything
//! - `execute` analyzes (or loads a saved report), asks for confirmation and moves
//! - `undo` reverses an execution from its rollback file
//! - `rollbacks` lists the rollback files in a directory

use crate::config::AppConfig;
use crate::executor::{ExecuteOptions, Executor, FsMover, RetryPolicy};
use crate::grouping::{DEFAULT_RECENT_YEARS, YearGrouping, parse_range};
use crate::organizer::{AnalyzeOptions, Report, analyze_with};
use crate::output::{BarObserver, OutputFormatter};
use crate::plan::{MovePlan, MoveStatus};
use crate::progress::CancelToken;
use crate::rollback::{RollbackLog, list_rollbacks};
use crate::undo::{UndoOptions, undo_file_with};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit code when some moves or restores failed.
const EXIT_PARTIAL: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "filetidy",
    version,
    about = "Sort a directory into Category/Year folders, with undo"
)]
pub struct Cli {
    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write diagnostics to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Configuration file (defaults to ./.filetidy.toml, then ~/.config/filetidy/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan a directory and show the proposed organization
    Analyze {
        #[command(flatten)]
        target: TargetArgs,

        /// Write the full report as JSON
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// List every planned move instead of a sample
        #[arg(long)]
        all: bool,

        /// Show the proposed Category/Year folder tree
        #[arg(long)]
        tree: bool,
    },
    /// Move files into Category/Year folders
    Execute {
        #[command(flatten)]
        target: TargetArgs,

        /// Execute a report saved with `analyze --output` instead of scanning again
        #[arg(long, value_name = "FILE")]
        plan: Option<PathBuf>,

        /// Review and edit the plan before executing
        #[arg(short, long)]
        interactive: bool,

        /// Show what would be moved, then stop
        #[arg(long)]
        dry_run: bool,

        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Restore files moved by an earlier execution
    Undo {
        rollback_file: PathBuf,

        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// List rollback files, newest first
    Rollbacks {
        /// Directory holding the rollback files (defaults to the configured rollback_dir, then .)
        path: Option<PathBuf>,
    },
}

/// Options shared by `analyze` and `execute`.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Directory to organize
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Extra folders to leave alone: a name, Parent/Child, or a glob (repeatable)
    #[arg(short = 'e', long = "exclude", value_name = "FOLDER")]
    pub exclude: Vec<String>,

    /// Maximum folder depth to scan (0 = only the top level)
    #[arg(short = 'd', long = "depth", value_name = "N")]
    pub depth: Option<usize>,

    /// Group years older than five years into decades
    #[arg(long, conflicts_with_all = ["group_before", "group_range"])]
    pub group_old: bool,

    /// Group every year before YEAR into Pre-YEAR
    #[arg(long, value_name = "YEAR", conflicts_with = "group_range")]
    pub group_before: Option<i32>,

    /// Group the years START..=END into one folder
    #[arg(long, value_name = "START-END")]
    pub group_range: Option<String>,

    /// Only plan files of this category
    #[arg(long)]
    pub category: Option<String>,

    /// Only plan files of this year or year folder
    #[arg(long)]
    pub year: Option<String>,

    /// Tidy file names while moving
    #[arg(long)]
    pub clean_names: bool,

    /// Include hidden files
    #[arg(long)]
    pub include_hidden: bool,
}

impl TargetArgs {
    /// Configuration values with command-line overrides applied.
    pub fn analyze_options(&self, config: &AppConfig) -> Result<AnalyzeOptions> {
        let mut config = config.clone();
        if self.include_hidden {
            config.filters.enable_hidden_files = true;
        }

        let mut options = AnalyzeOptions::from_config(&config)?;
        if let Some(depth) = self.depth {
            options.max_depth = depth;
        }
        options.protected.extend(self.exclude.iter().cloned());

        if self.group_old {
            options.grouping = YearGrouping::Decades {
                recent_years: config.grouping.recent_years.unwrap_or(DEFAULT_RECENT_YEARS),
            };
        } else if let Some(year) = self.group_before {
            options.grouping = YearGrouping::Before { year };
        } else if let Some(range) = &self.group_range {
            options.grouping = parse_range(range)?;
        }

        options.category_filter = self.category.clone();
        options.year_filter = self.year.clone();
        options.clean_names = self.clean_names;
        Ok(options)
    }
}

/// Runs a parsed command line.
///
/// Returns exit code 2 when the command completed but some files could not be
/// moved or restored.
pub fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref()).context("Error loading configuration")?;

    match cli.command {
        Command::Analyze {
            target,
            output,
            all,
            tree,
        } => run_analyze(&target, &config, output.as_deref(), all || cli.verbose, tree),
        Command::Execute {
            target,
            plan,
            interactive,
            dry_run,
            yes,
        } => run_execute(&target, &config, plan.as_deref(), interactive, dry_run, yes),
        Command::Undo { rollback_file, yes } => run_undo(&rollback_file, &config, yes),
        Command::Rollbacks { path } => {
            let dir = path
                .or_else(|| config.execute.rollback_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            let rollbacks = list_rollbacks(&dir)?;
            OutputFormatter::print_rollbacks(&dir, &rollbacks);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn scan(target: &TargetArgs, config: &AppConfig) -> Result<Report> {
    let options = target.analyze_options(config)?;
    OutputFormatter::info(&format!("🔍 Analyzing: {}", target.path.display()));

    let spinner = OutputFormatter::create_spinner("Scanning");
    let report = analyze_with(
        &target.path,
        &options,
        &BarObserver(spinner.clone()),
        &CancelToken::new(),
    );
    spinner.finish_and_clear();
    Ok(report?)
}

fn run_analyze(
    target: &TargetArgs,
    config: &AppConfig,
    output: Option<&Path>,
    show_all: bool,
    tree: bool,
) -> Result<ExitCode> {
    let report = scan(target, config)?;
    OutputFormatter::print_report(&report, show_all);
    if tree {
        OutputFormatter::print_tree(&report.plan, show_all);
    }

    if let Some(path) = output {
        report.save(path)?;
        OutputFormatter::success(&format!("Report saved to {}", path.display()));
        OutputFormatter::plain(&format!(
            "   To execute it: filetidy execute --plan {}",
            path.display()
        ));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_execute(
    target: &TargetArgs,
    config: &AppConfig,
    plan_file: Option<&Path>,
    interactive: bool,
    dry_run: bool,
    yes: bool,
) -> Result<ExitCode> {
    let mut report = match plan_file {
        Some(path) => {
            let report = Report::load(path)?;
            OutputFormatter::info(&format!(
                "Loaded plan for {} ({})",
                report.root.display(),
                report.created.format("%Y-%m-%d %H:%M")
            ));
            report
        }
        None => scan(target, config)?,
    };

    if interactive {
        let stdin = io::stdin();
        if !review(&mut report.plan, &mut stdin.lock())? {
            OutputFormatter::plain("Aborted.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    OutputFormatter::print_plan(&report.plan, false);
    let planned = report.plan.count(MoveStatus::Planned);
    if planned == 0 {
        return Ok(ExitCode::SUCCESS);
    }
    if dry_run {
        OutputFormatter::dry_run_notice("No files were moved.");
        return Ok(ExitCode::SUCCESS);
    }

    if !yes {
        OutputFormatter::warning("This will MOVE files to new locations.");
        OutputFormatter::plain("   A rollback file will be created to undo changes.");
        if !confirm("Type 'yes' to proceed: ")? {
            OutputFormatter::plain("Cancelled by user.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let progress = OutputFormatter::create_progress_bar(planned as u64);
    let result = Executor::new(ExecuteOptions::from_config(&config.execute))
        .with_observer(BarObserver(progress.clone()))
        .execute(&mut report.plan, true)?;
    progress.finish_and_clear();

    OutputFormatter::print_execution(&result);
    Ok(if result.failed > 0 || result.rollback_error.is_some() {
        ExitCode::from(EXIT_PARTIAL)
    } else {
        ExitCode::SUCCESS
    })
}

fn run_undo(rollback_file: &Path, config: &AppConfig, yes: bool) -> Result<ExitCode> {
    let log = RollbackLog::load(rollback_file)?;
    OutputFormatter::info(&format!(
        "Undoing {} move(s) in {} from {}",
        log.moves.len(),
        log.root.display(),
        log.created.format("%Y-%m-%d %H:%M:%S")
    ));

    if !yes && !confirm("Type 'yes' to restore these files: ")? {
        OutputFormatter::plain("Cancelled by user.");
        return Ok(ExitCode::SUCCESS);
    }

    let options = UndoOptions {
        retry: RetryPolicy::from_config(&config.execute),
        remove_empty_dirs: true,
    };
    let progress = OutputFormatter::create_progress_bar(log.moves.len() as u64);
    let result = undo_file_with(
        rollback_file,
        &options,
        &FsMover,
        &BarObserver(progress.clone()),
    )?;
    progress.finish_and_clear();

    OutputFormatter::print_undo(&result);
    Ok(if result.is_complete_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    })
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

/// Interactive plan review. Returns true when the user chose to run.
///
/// Commands: `l` list, `c` list by category, `s ID` toggle skip,
/// `r ID NAME` rename, `run` execute, `q` quit.
pub fn review<R: BufRead>(plan: &mut MovePlan, input: &mut R) -> Result<bool> {
    loop {
        let to_move = plan.count(MoveStatus::Planned);
        OutputFormatter::header("INTERACTIVE REVIEW");
        OutputFormatter::plain(&format!(
            "Files in plan: {}  set to move: {}  skipped: {}",
            plan.len(),
            to_move,
            plan.count(MoveStatus::Skipped)
        ));
        OutputFormatter::plain("Commands: [l]ist  [c]ategories  [s ID] skip/unskip  [r ID NAME] rename  [run]  [q]uit");
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "q" | "quit" => return Ok(false),
            "run" => {
                if to_move == 0 {
                    OutputFormatter::warning("No files to move!");
                    continue;
                }
                return Ok(true);
            }
            "l" => OutputFormatter::print_numbered(plan, false),
            "c" => OutputFormatter::print_numbered(plan, true),
            "s" => match parse_id(rest.trim(), plan) {
                Ok(index) => {
                    let skipped = plan.entries[index].status == MoveStatus::Skipped;
                    let toggled = if skipped {
                        plan.unskip(index)
                    } else {
                        plan.skip(index)
                    };
                    match toggled {
                        Ok(()) => OutputFormatter::plain(&format!(
                            "Toggled file #{}: {}",
                            index + 1,
                            if skipped { "moving" } else { "skipped" }
                        )),
                        Err(e) => OutputFormatter::warning(&e.to_string()),
                    }
                }
                Err(message) => OutputFormatter::warning(&message),
            },
            "r" => {
                let (id, name) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
                let renamed = parse_id(id, plan).and_then(|index| {
                    plan.rename(index, name.trim())
                        .map(|()| index)
                        .map_err(|e| e.to_string())
                });
                match renamed {
                    Ok(index) => OutputFormatter::plain(&format!(
                        "Renamed file #{} to: {}",
                        index + 1,
                        name.trim()
                    )),
                    Err(message) => OutputFormatter::warning(&message),
                }
            }
            "" => {}
            other => OutputFormatter::warning(&format!("Unknown command '{}'", other)),
        }
    }
}

fn parse_id(text: &str, plan: &MovePlan) -> std::result::Result<usize, String> {
    match text.parse::<usize>() {
        Ok(id) if id >= 1 && id <= plan.len() => Ok(id - 1),
        Ok(_) => Err("Invalid ID".to_string()),
        Err(_) => Err("Usage: s <ID> | r <ID> <NEW_NAME>".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::Category;
    use crate::grouping::GroupConfig;
    use crate::plan::{MoveEntry, PlanStats};
    use std::io::Cursor;

    fn plan() -> MovePlan {
        let root = PathBuf::from("/virtual");
        let entries = ["a.pdf", "b.pdf"]
            .iter()
            .map(|name| MoveEntry {
                source: root.join(name),
                destination: root.join("Documents/2023").join(name),
                category: Category::Documents,
                bucket: "2023".into(),
                size: 1,
                effective_size: 1,
                status: MoveStatus::Planned,
                reason: None,
            })
            .collect();
        MovePlan {
            root,
            grouping: GroupConfig::per_year(),
            entries,
            stats: PlanStats::default(),
        }
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "filetidy", "-v", "execute", "/data", "-e", "Keep", "-d", "3", "--group-old", "--yes",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Execute { target, yes, .. } => {
                assert!(yes);
                assert_eq!(target.path, PathBuf::from("/data"));
                assert_eq!(target.exclude, vec!["Keep".to_string()]);
                assert_eq!(target.depth, Some(3));
                assert!(target.group_old);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_grouping_flags_conflict() {
        assert!(
            Cli::try_parse_from(["filetidy", "analyze", "--group-old", "--group-before", "2000"])
                .is_err()
        );
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = AppConfig::parse(
            r#"
            [scan]
            max_depth = 4
            protected = ["FromConfig"]
            "#,
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "filetidy",
            "analyze",
            "-e",
            "FromCli",
            "--group-range",
            "2010-2019",
            "--category",
            "images",
        ])
        .unwrap();
        let Command::Analyze { target, .. } = cli.command else {
            panic!("expected analyze");
        };

        let options = target.analyze_options(&config).unwrap();
        assert_eq!(options.max_depth, 4);
        assert_eq!(options.protected, vec!["FromConfig", "FromCli"]);
        assert_eq!(
            options.grouping,
            YearGrouping::Range {
                start: 2010,
                end: 2019
            }
        );
        assert_eq!(options.category_filter.as_deref(), Some("images"));
    }

    #[test]
    fn test_analyze_tree_flag() {
        let cli = Cli::try_parse_from(["filetidy", "analyze", "--tree"]).unwrap();
        let Command::Analyze { tree, all, .. } = cli.command else {
            panic!("expected analyze");
        };
        assert!(tree);
        assert!(!all);

        let cli = Cli::try_parse_from(["filetidy", "analyze"]).unwrap();
        assert!(matches!(cli.command, Command::Analyze { tree: false, .. }));
    }

    #[test]
    fn test_review_skip_rename_and_run() {
        let mut plan = plan();
        let mut input = Cursor::new("s 1\nr 2 renamed.pdf\ns 9\nrun\n");
        assert!(review(&mut plan, &mut input).unwrap());
        assert_eq!(plan.entries[0].status, MoveStatus::Skipped);
        assert_eq!(
            plan.entries[1].destination,
            PathBuf::from("/virtual/Documents/2023/renamed.pdf")
        );
    }

    #[test]
    fn test_review_quit_and_eof() {
        let mut plan = plan();
        assert!(!review(&mut plan, &mut Cursor::new("q\n")).unwrap());
        assert!(!review(&mut plan, &mut Cursor::new("")).unwrap());
    }

    #[test]
    fn test_review_refuses_empty_run() {
        let mut plan = plan();
        let mut input = Cursor::new("s 1\ns 2\nrun\ns 2\nrun\n");
        assert!(review(&mut plan, &mut input).unwrap());
        assert_eq!(plan.count(MoveStatus::Planned), 1);
    }
}
