//! Configuration loading and file filtering.
//!
//! Settings are read from a TOML file and cover the scan (depth, protected
//! folders), year grouping, file filters and the executor's retry policy.
//! Command-line flags override whatever the file provides.
//!
//! # Configuration File Format
//!
//! ```toml
//! [scan]
//! max_depth = 10
//! protected = ["Work Projects", "Personal/Private"]
//!
//! [grouping]
//! mode = "decades"          # per_year | decades | before | range
//! recent_years = 5
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = ["Thumbs.db"]
//! patterns = ["*.tmp"]
//! extensions = ["part"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [execute]
//! retries = 3
//! retry_delay_ms = 500
//! ```

use crate::grouping::{DEFAULT_RECENT_YEARS, YearGrouping, parse_range};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".filetidy.toml";

/// Default scan depth (0 = only the root's direct children).
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Rejected settings. Always raised before any file is touched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// Contradictory or incomplete `[grouping]` settings, or a bad range flag.
    #[error("Invalid grouping: {0}")]
    InvalidGrouping(String),
    /// Unknown category name or unparsable year filter.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Cannot read configuration: {0}")]
    IoError(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanSection,
    pub grouping: GroupingSection,
    pub filters: FilterRules,
    pub execute: ExecuteSection,
}

/// `[scan]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    pub max_depth: usize,
    /// Extra protected folders: plain names, `Parent/Child` paths or globs.
    pub protected: Vec<String>,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            protected: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    #[default]
    PerYear,
    Decades,
    Before,
    Range,
}

/// `[grouping]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingSection {
    pub mode: GroupingMode,
    pub recent_years: Option<i32>,
    pub before: Option<i32>,
    pub range: Option<String>,
}

impl GroupingSection {
    /// Turns the section into a grouping mode, checking required fields.
    pub fn resolve(&self) -> Result<YearGrouping, ConfigError> {
        match self.mode {
            GroupingMode::PerYear => Ok(YearGrouping::PerYear),
            GroupingMode::Decades => Ok(YearGrouping::Decades {
                recent_years: self.recent_years.unwrap_or(DEFAULT_RECENT_YEARS),
            }),
            GroupingMode::Before => self
                .before
                .map(|year| YearGrouping::Before { year })
                .ok_or_else(|| {
                    ConfigError::InvalidGrouping("mode 'before' requires 'before = <year>'".into())
                }),
            GroupingMode::Range => {
                let range = self.range.as_deref().ok_or_else(|| {
                    ConfigError::InvalidGrouping(
                        "mode 'range' requires 'range = \"START-END\"'".into(),
                    )
                })?;
                parse_range(range)
            }
        }
    }
}

/// `[execute]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteSection {
    /// Total attempts for a move that keeps failing with a busy/locked error.
    pub retries: u32,
    pub retry_delay_ms: u64,
    /// Where rollback logs are written. Defaults to the organized root.
    pub rollback_dir: Option<PathBuf>,
}

impl ExecuteSection {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ExecuteSection {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay_ms: 500,
            rollback_dir: None,
        }
    }
}

/// `[filters]` section: which files a scan reports at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Dot files are skipped unless this is set.
    pub enable_hidden_files: bool,
    pub exclude: ExcludeRules,
    /// Matches here win over every exclusion, hidden files included.
    pub include: IncludeRules,
}

/// `[filters.exclude]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeRules {
    /// Exact file names such as `Thumbs.db`.
    pub filenames: Vec<String>,
    /// Globs against the root-relative path.
    pub patterns: Vec<String>,
    /// Case-insensitive, with or without the leading dot.
    pub extensions: Vec<String>,
    /// Regexes against the bare file name.
    pub regex: Vec<String>,
}

/// `[filters.include]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeRules {
    pub patterns: Vec<String>,
}

impl AppConfig {
    /// Resolves the configuration: the explicit path if given, else
    /// `.filetidy.toml` in the working directory, else
    /// `~/.config/filetidy/config.toml`, else built-in defaults.
    ///
    /// A file that exists but does not parse is an error, never a silent
    /// fallback.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("filetidy")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        tracing::debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }
}

/// Filter rules with globs and regexes compiled.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

impl FilterRules {
    /// Fails on the first glob or regex that does not compile.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        let exclude_regexes = self
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledFilters {
            enable_hidden_files: self.enable_hidden_files,
            exclude_filenames: self.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: self
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&self.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&self.include.patterns)?,
        })
    }
}

impl CompiledFilters {
    /// Whether the file at `rel_path` (relative to the scan root) is reported.
    ///
    /// An include match always wins. Otherwise the file is dropped if it is
    /// hidden (unless enabled), or matches an excluded name, extension, glob
    /// or regex.
    pub fn should_include(&self, rel_path: &Path) -> bool {
        if self.include_patterns.iter().any(|p| p.matches_path(rel_path)) {
            return true;
        }

        let name = rel_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let hidden = name.starts_with('.') && !self.enable_hidden_files;
        let by_extension = rel_path.extension().is_some_and(|ext| {
            self.exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        });

        !(hidden
            || by_extension
            || self.exclude_filenames.contains(name.as_ref())
            || self.exclude_patterns.iter().any(|p| p.matches_path(rel_path))
            || self.exclude_regexes.iter().any(|re| re.is_match(&name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules_with(exclude: ExcludeRules) -> FilterRules {
        FilterRules {
            enable_hidden_files: true,
            exclude,
            include: IncludeRules::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.scan.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.filters.enable_hidden_files);
        assert_eq!(config.execute.retries, 3);
        assert_eq!(config.execute.retry_delay(), Duration::from_millis(500));
        assert_eq!(config.grouping.resolve().unwrap(), YearGrouping::PerYear);
    }

    #[test]
    fn test_parse_full_document() {
        let config = AppConfig::parse(
            r#"
            [scan]
            max_depth = 3
            protected = ["Work Projects", "Personal/Private"]

            [grouping]
            mode = "before"
            before = 2000

            [filters.exclude]
            extensions = ["part"]

            [execute]
            retries = 5
            retry_delay_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.max_depth, 3);
        assert_eq!(config.scan.protected.len(), 2);
        assert_eq!(
            config.grouping.resolve().unwrap(),
            YearGrouping::Before { year: 2000 }
        );
        assert_eq!(config.filters.exclude.extensions, vec!["part".to_string()]);
        assert_eq!(config.execute.retries, 5);
    }

    #[test]
    fn test_grouping_missing_fields_rejected() {
        let config = AppConfig::parse("[grouping]\nmode = \"before\"\n").unwrap();
        assert!(matches!(
            config.grouping.resolve(),
            Err(ConfigError::InvalidGrouping(_))
        ));

        let config = AppConfig::parse("[grouping]\nmode = \"range\"\nrange = \"x\"\n").unwrap();
        assert!(config.grouping.resolve().is_err());
    }

    #[test]
    fn test_grouping_decades_default_window() {
        let config = AppConfig::parse("[grouping]\nmode = \"decades\"\n").unwrap();
        assert_eq!(
            config.grouping.resolve().unwrap(),
            YearGrouping::Decades {
                recent_years: DEFAULT_RECENT_YEARS
            }
        );
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = AppConfig::parse("[scan\nmax_depth = ");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[scan]\nmax_depth = 2\n").expect("Failed to write config");

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.scan.max_depth, 2);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = AppConfig::load(Some(Path::new("/non/existent/filetidy.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_hidden_file_excluded_by_default() {
        let compiled = FilterRules::default().compile().unwrap();
        assert!(!compiled.should_include(Path::new(".DS_Store")));
        assert!(compiled.should_include(Path::new("notes.txt")));
    }

    #[test]
    fn test_exclude_extensions_case_insensitive() {
        let compiled = rules_with(ExcludeRules {
            extensions: vec!["bak".to_string(), ".TMP".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(!compiled.should_include(Path::new("file.bak")));
        assert!(!compiled.should_include(Path::new("file.BAK")));
        assert!(!compiled.should_include(Path::new("file.tmp")));
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_exclude_filename_and_regex() {
        let compiled = rules_with(ExcludeRules {
            filenames: vec!["Thumbs.db".to_string()],
            regex: vec![r"^~\$.*".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(!compiled.should_include(Path::new("Thumbs.db")));
        assert!(!compiled.should_include(Path::new("sub/~$report.docx")));
        assert!(compiled.should_include(Path::new("report.docx")));
    }

    #[test]
    fn test_glob_respects_directory_boundaries() {
        let compiled = rules_with(ExcludeRules {
            patterns: vec!["**/logs/**".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(!compiled.should_include(Path::new("logs/file.txt")));
        assert!(!compiled.should_include(Path::new("app/logs/file.txt")));
        assert!(compiled.should_include(Path::new("my_logs/file.txt")));
    }

    #[test]
    fn test_include_overrides_hidden() {
        let rules = FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules::default(),
            include: IncludeRules {
                patterns: vec![".important".to_string()],
            },
        };
        let compiled = rules.compile().unwrap();

        assert!(compiled.should_include(Path::new(".important")));
        assert!(!compiled.should_include(Path::new(".other")));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_regex = rules_with(ExcludeRules {
            regex: vec!["[invalid(".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            bad_regex.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = rules_with(ExcludeRules {
            patterns: vec!["[invalid".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            bad_glob.compile(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }
}
