//! Read-only analysis: scan a root and plan its reorganization.

use crate::config::{AppConfig, CompiledFilters, ConfigError, DEFAULT_MAX_DEPTH};
use crate::grouping::{GroupConfig, YearGrouping};
use crate::plan::{MovePlan, PlanFilter, PlanOptions, build_plan};
use crate::progress::{CancelToken, NoProgress, ProgressObserver};
use crate::protected::ProtectedFolderSet;
use crate::scanner::{ScanError, ScanOptions, Scanner};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub max_depth: usize,
    /// User exclusions on top of the built-in protected folders.
    pub protected: Vec<String>,
    pub grouping: YearGrouping,
    pub category_filter: Option<String>,
    pub year_filter: Option<String>,
    pub clean_names: bool,
    pub filters: CompiledFilters,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            protected: Vec::new(),
            grouping: YearGrouping::PerYear,
            category_filter: None,
            year_filter: None,
            clean_names: false,
            filters: CompiledFilters::default(),
        }
    }
}

impl AnalyzeOptions {
    /// Options as described by a configuration file, before CLI overrides.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            max_depth: config.scan.max_depth,
            protected: config.scan.protected.clone(),
            grouping: config.grouping.resolve()?,
            filters: config.filters.compile()?,
            ..Self::default()
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("cannot open {}: {source}", path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("analysis cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub files_scanned: usize,
    pub errors: Vec<ScanError>,
    /// Skipped protected folders, relative to the root.
    pub protected_found: Vec<PathBuf>,
}

/// Result of [`analyze`]; also the document written by `--output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub created: DateTime<Local>,
    pub root: PathBuf,
    pub scan: ScanSummary,
    pub plan: MovePlan,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("cannot access report {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("report {} is not valid: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

impl Report {
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| ReportError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let text = fs::read_to_string(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| ReportError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Scans `root` and plans its reorganization without touching anything.
///
/// # Errors
///
/// Fails if the root cannot be opened or the options are invalid. Unreadable
/// entries inside the tree are not errors; they are listed in the report.
pub fn analyze(root: &Path, options: &AnalyzeOptions) -> Result<Report, AnalyzeError> {
    analyze_with(root, options, &NoProgress, &CancelToken::new())
}

pub fn analyze_with(
    root: &Path,
    options: &AnalyzeOptions,
    observer: &dyn ProgressObserver,
    cancel: &CancelToken,
) -> Result<Report, AnalyzeError> {
    let root = root
        .canonicalize()
        .map_err(|source| AnalyzeError::RootUnavailable {
            path: root.to_path_buf(),
            source,
        })?;
    if !root.is_dir() {
        return Err(AnalyzeError::NotADirectory(root));
    }

    // Validate everything up front so bad options never cost a scan.
    let plan_options = PlanOptions {
        grouping: GroupConfig::new(options.grouping)?,
        filter: PlanFilter::parse(
            options.category_filter.as_deref(),
            options.year_filter.as_deref(),
        )?,
        clean_names: options.clean_names,
    };
    let scan_options = ScanOptions {
        max_depth: options.max_depth,
        protected: ProtectedFolderSet::with_exclusions(&options.protected)?,
        filters: options.filters.clone(),
    };

    tracing::info!(root = %root.display(), depth = options.max_depth, "analyzing");
    let outcome = Scanner::new(&root, scan_options).scan_all(observer, cancel);
    if outcome.cancelled {
        return Err(AnalyzeError::Cancelled);
    }

    let plan = build_plan(&outcome.records, &root, &plan_options);
    Ok(Report {
        created: Local::now(),
        scan: ScanSummary {
            files_scanned: outcome.records.len(),
            errors: outcome.errors,
            protected_found: outcome.protected_found,
        },
        root,
        plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::Category;
    use tempfile::TempDir;

    #[test]
    fn test_analyze_does_not_touch_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.pdf"), "pdf").unwrap();
        fs::create_dir(root.join("node_modules")).unwrap();
        fs::write(root.join("node_modules/x.js"), "js").unwrap();

        let report = analyze(root, &AnalyzeOptions::default()).unwrap();
        assert_eq!(report.scan.files_scanned, 1);
        assert_eq!(report.plan.len(), 1);
        assert_eq!(report.plan.entries[0].category, Category::Documents);
        assert_eq!(report.scan.protected_found, vec![PathBuf::from("node_modules")]);
        assert!(root.join("a.pdf").exists());
        assert!(!root.join("Documents").exists());
    }

    #[test]
    fn test_analyze_rejects_bad_root_and_options() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(
            analyze(&temp_dir.path().join("missing"), &AnalyzeOptions::default()),
            Err(AnalyzeError::RootUnavailable { .. })
        ));
        assert!(matches!(
            analyze(&file, &AnalyzeOptions::default()),
            Err(AnalyzeError::NotADirectory(_))
        ));

        let options = AnalyzeOptions {
            category_filter: Some("spreadsheets".into()),
            ..Default::default()
        };
        assert!(matches!(
            analyze(temp_dir.path(), &options),
            Err(AnalyzeError::Config(_))
        ));

        let options = AnalyzeOptions {
            grouping: YearGrouping::Range {
                start: 2020,
                end: 2010,
            },
            ..Default::default()
        };
        assert!(analyze(temp_dir.path(), &options).is_err());
    }

    #[test]
    fn test_analyze_cancelled() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = analyze_with(temp_dir.path(), &AnalyzeOptions::default(), &NoProgress, &cancel);
        assert!(matches!(result, Err(AnalyzeError::Cancelled)));
    }

    #[test]
    fn test_report_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let data = temp_dir.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("song.mp3"), "la").unwrap();

        let report = analyze(&data, &AnalyzeOptions::default()).unwrap();
        let path = temp_dir.path().join("report.json");
        report.save(&path).unwrap();

        let loaded = Report::load(&path).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_options_from_config() {
        let config = AppConfig::parse(
            r#"
            [scan]
            max_depth = 2
            protected = ["Keep"]

            [grouping]
            mode = "before"
            before = 2000
            "#,
        )
        .unwrap();

        let options = AnalyzeOptions::from_config(&config).unwrap();
        assert_eq!(options.max_depth, 2);
        assert_eq!(options.protected, vec!["Keep".to_string()]);
        assert_eq!(options.grouping, YearGrouping::Before { year: 2000 });
    }
}
