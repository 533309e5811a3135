//! Move planning.
//!
//! [`build_plan`] turns scan records into a [`MovePlan`]: one [`MoveEntry`]
//! per file that is not already where it belongs, each with a destination of
//! the form `root/Category/Bucket/filename`. Destinations never collide with
//! each other or with anything already on disk; clashes get a ` (N)` suffix
//! before the extension.
//!
//! Totals are always accumulated from `effective_size` so hardlinked copies
//! and symlinks do not inflate the reported sizes. Effective sizes are
//! recomputed over the records that pass the plan filter: the first included
//! link of an inode counts, whether or not an earlier link was filtered out.

use crate::config::ConfigError;
use crate::file_category::{Category, classify};
use crate::grouping::{GroupConfig, bucket_for};
use crate::scanner::FileRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// Longest stem produced by filename cleaning, in characters.
const MAX_CLEAN_STEM_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveStatus {
    #[default]
    Planned,
    Moved,
    Failed,
    Skipped,
}

/// One proposed or executed relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub category: Category,
    pub bucket: String,
    pub size: u64,
    pub effective_size: u64,
    #[serde(default)]
    pub status: MoveStatus,
    /// Why the entry failed or was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTotals {
    pub count: usize,
    /// Sum of effective sizes.
    pub size: u64,
    /// Sum of on-disk sizes, for display only.
    pub raw_size: u64,
}

impl BucketTotals {
    fn add(&mut self, size: u64, effective_size: u64) {
        self.count += 1;
        self.size += effective_size;
        self.raw_size += size;
    }
}

/// Aggregates over every file the plan considered (moving or already in place).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStats {
    pub total: BucketTotals,
    pub by_category: BTreeMap<Category, BucketTotals>,
    pub by_bucket: BTreeMap<String, BucketTotals>,
    /// Files already at their organized location.
    pub in_place: usize,
}

impl PlanStats {
    fn add(&mut self, size: u64, effective_size: u64, category: Category, bucket: &str) {
        self.total.add(size, effective_size);
        self.by_category
            .entry(category)
            .or_default()
            .add(size, effective_size);
        self.by_bucket
            .entry(bucket.to_string())
            .or_default()
            .add(size, effective_size);
    }
}

/// Restricts which records produce entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFilter {
    pub category: Option<Category>,
    /// Matches either the bucket label or the literal year.
    pub year: Option<String>,
}

impl PlanFilter {
    /// Parses the textual filters given on the command line.
    pub fn parse(category: Option<&str>, year: Option<&str>) -> Result<Self, ConfigError> {
        let category = category
            .map(|c| {
                c.parse::<Category>()
                    .map_err(|e| ConfigError::InvalidFilter(e.to_string()))
            })
            .transpose()?;
        let year = match year.map(str::trim) {
            Some("") => {
                return Err(ConfigError::InvalidFilter(
                    "year filter must not be empty".into(),
                ));
            }
            other => other.map(str::to_string),
        };
        Ok(Self { category, year })
    }

    fn matches(&self, category: Category, year: i32, bucket: &str) -> bool {
        if self.category.is_some_and(|c| c != category) {
            return false;
        }
        match &self.year {
            Some(wanted) => wanted == bucket || *wanted == year.to_string(),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub grouping: GroupConfig,
    pub filter: PlanFilter,
    /// Tidy file names (whitespace, forbidden characters, length) while moving.
    pub clean_names: bool,
}

/// Errors from editing a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("no entry at index {0}")]
    IndexOutOfRange(usize),
    #[error("entry {index} is {status:?} and can no longer be edited")]
    NotEditable { index: usize, status: MoveStatus },
    #[error("invalid file name '{0}'")]
    InvalidName(String),
}

/// The proposed reorganization of one root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePlan {
    pub root: PathBuf,
    pub grouping: GroupConfig,
    pub entries: Vec<MoveEntry>,
    pub stats: PlanStats,
}

impl MovePlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: MoveStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    fn editable(&mut self, index: usize) -> Result<&mut MoveEntry, PlanError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(PlanError::IndexOutOfRange(index))?;
        match entry.status {
            MoveStatus::Planned | MoveStatus::Skipped => Ok(entry),
            status => Err(PlanError::NotEditable { index, status }),
        }
    }

    /// Excludes an entry from execution.
    pub fn skip(&mut self, index: usize) -> Result<(), PlanError> {
        let entry = self.editable(index)?;
        entry.status = MoveStatus::Skipped;
        entry.reason = Some("skipped by user".to_string());
        Ok(())
    }

    pub fn unskip(&mut self, index: usize) -> Result<(), PlanError> {
        let entry = self.editable(index)?;
        entry.status = MoveStatus::Planned;
        entry.reason = None;
        Ok(())
    }

    /// Puts `failed` entries back to `planned` so the next execution tries
    /// them again. Returns how many were reset.
    pub fn retry_failed(&mut self) -> usize {
        let mut reset = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.status == MoveStatus::Failed)
        {
            entry.status = MoveStatus::Planned;
            entry.reason = None;
            reset += 1;
        }
        reset
    }

    /// Replaces an entry's destination outright.
    pub fn set_destination(&mut self, index: usize, destination: PathBuf) -> Result<(), PlanError> {
        self.editable(index)?.destination = destination;
        Ok(())
    }

    /// Keeps the destination folder and changes the file name.
    pub fn rename(&mut self, index: usize, new_name: &str) -> Result<(), PlanError> {
        let mut components = Path::new(new_name).components();
        let valid = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !valid {
            return Err(PlanError::InvalidName(new_name.to_string()));
        }
        let entry = self.editable(index)?;
        entry.destination.set_file_name(new_name);
        Ok(())
    }

    /// Destinations claimed by more than one planned entry.
    pub fn duplicate_destinations(&self) -> Vec<PathBuf> {
        let mut counts: HashMap<&Path, usize> = HashMap::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.status == MoveStatus::Planned)
        {
            *counts.entry(entry.destination.as_path()).or_default() += 1;
        }
        let mut duplicates: Vec<PathBuf> = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(path, _)| path.to_path_buf())
            .collect();
        duplicates.sort();
        duplicates
    }
}

fn path_taken(path: &Path, claimed: &HashSet<PathBuf>) -> bool {
    claimed.contains(path) || path.symlink_metadata().is_ok()
}

fn suffixed_name(stem: &OsStr, extension: Option<&OsStr>, n: usize) -> OsString {
    let mut name = stem.to_os_string();
    name.push(format!(" ({})", n));
    if let Some(ext) = extension {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Returns `candidate`, or the first `name (N).ext` sibling for which
/// `is_taken` is false.
pub fn unique_path(candidate: &Path, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !is_taken(candidate) {
        return candidate.to_path_buf();
    }

    let stem = candidate.file_stem().unwrap_or_default();
    let extension = candidate.extension();
    let mut n = 1;
    loop {
        let next = candidate.with_file_name(suffixed_name(stem, extension, n));
        if !is_taken(&next) {
            return next;
        }
        n += 1;
    }
}

fn separator_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_]+").expect("Invalid separator regex"))
}

fn forbidden_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("Invalid character regex"))
}

/// Suggests a tidier file name; applying it twice changes nothing.
///
/// ```
/// use filetidy::plan::clean_file_name;
///
/// assert_eq!(clean_file_name("  my__holiday   photo?.jpg"), "my holiday photo.jpg");
/// assert_eq!(clean_file_name("ok.txt"), "ok.txt");
/// ```
pub fn clean_file_name(name: &str) -> String {
    let path = Path::new(name);
    let (stem, extension) = match (
        path.file_stem().and_then(OsStr::to_str),
        path.extension().and_then(OsStr::to_str),
    ) {
        (Some(stem), ext) => (stem, ext),
        _ => return name.to_string(),
    };

    let stem = forbidden_chars().replace_all(stem, "");
    let stem = separator_run().replace_all(&stem, " ");
    let trim = |s: &str| s.trim_matches(|c| c == ' ' || c == '.').to_string();
    let stem: String = trim(&stem).chars().take(MAX_CLEAN_STEM_CHARS).collect();
    let stem = trim(&stem);

    if stem.is_empty() {
        return name.to_string();
    }
    match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

struct Candidate<'a> {
    record: &'a FileRecord,
    effective_size: u64,
    category: Category,
    bucket: String,
    file_name: OsString,
}

/// Builds the move plan for `records` under `root`.
///
/// Files already at `root/Category/Bucket/name` produce no entry, so planning
/// an organized tree again yields an empty plan.
pub fn build_plan(records: &[FileRecord], root: &Path, options: &PlanOptions) -> MovePlan {
    let mut stats = PlanStats::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    let mut seen_inodes: HashSet<(u64, u64)> = HashSet::new();
    let mut candidates = Vec::new();

    for record in records {
        let category = classify(&record.extension);
        let bucket = bucket_for(record.modified_year, &options.grouping);
        if !options
            .filter
            .matches(category, record.modified_year, &bucket)
        {
            continue;
        }
        let effective_size = if record.is_symlink {
            0
        } else {
            match record.device_inode {
                Some(key) if !seen_inodes.insert(key) => 0,
                _ => record.size,
            }
        };
        stats.add(record.size, effective_size, category, &bucket);

        let Some(original_name) = record.path.file_name() else {
            continue;
        };
        let file_name = match (options.clean_names, original_name.to_str()) {
            (true, Some(name)) => OsString::from(clean_file_name(name)),
            _ => original_name.to_os_string(),
        };

        let natural = root
            .join(category.dir_name())
            .join(&bucket)
            .join(&file_name);
        if natural == record.path {
            stats.in_place += 1;
            claimed.insert(natural);
            continue;
        }

        candidates.push(Candidate {
            record,
            effective_size,
            category,
            bucket,
            file_name,
        });
    }

    candidates.sort_by(|a, b| {
        (a.category, &a.bucket, &a.file_name, &a.record.path).cmp(&(
            b.category,
            &b.bucket,
            &b.file_name,
            &b.record.path,
        ))
    });

    let mut entries = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let natural = root
            .join(candidate.category.dir_name())
            .join(&candidate.bucket)
            .join(&candidate.file_name);
        let destination = unique_path(&natural, |p| path_taken(p, &claimed));
        if destination != natural {
            tracing::debug!(
                source = %candidate.record.path.display(),
                destination = %destination.display(),
                "destination taken, renamed"
            );
        }
        claimed.insert(destination.clone());

        entries.push(MoveEntry {
            source: candidate.record.path.clone(),
            destination,
            category: candidate.category,
            bucket: candidate.bucket,
            size: candidate.record.size,
            effective_size: candidate.effective_size,
            status: MoveStatus::Planned,
            reason: None,
        });
    }

    tracing::info!(
        root = %root.display(),
        moves = entries.len(),
        in_place = stats.in_place,
        "plan built"
    );

    MovePlan {
        root: root.to_path_buf(),
        grouping: options.grouping,
        entries,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::YearGrouping;
    use std::fs;
    use tempfile::TempDir;

    fn record(path: PathBuf, year: i32, size: u64) -> FileRecord {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        FileRecord {
            path,
            size,
            effective_size: size,
            modified_year: year,
            extension,
            device_inode: None,
            is_symlink: false,
        }
    }

    fn options() -> PlanOptions {
        PlanOptions {
            grouping: GroupConfig::with_reference_year(YearGrouping::PerYear, 2026).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_destinations_follow_category_and_year() {
        let root = Path::new("/virtual/root");
        let records = vec![
            record(root.join("report.pdf"), 2023, 10),
            record(root.join("photo.jpg"), 2024, 20),
        ];

        let plan = build_plan(&records, root, &options());
        let destinations: Vec<_> = plan.entries.iter().map(|e| e.destination.clone()).collect();
        assert_eq!(
            destinations,
            vec![
                root.join("Documents/2023/report.pdf"),
                root.join("Images/2024/photo.jpg"),
            ]
        );
        assert!(plan.entries.iter().all(|e| e.status == MoveStatus::Planned));
    }

    #[test]
    fn test_same_name_gets_numbered_suffix() {
        let root = Path::new("/virtual/root");
        let records = vec![
            record(root.join("b/photo.jpg"), 2024, 1),
            record(root.join("a/photo.jpg"), 2024, 1),
        ];

        let plan = build_plan(&records, root, &options());
        assert_eq!(plan.entries[0].source, root.join("a/photo.jpg"));
        assert_eq!(plan.entries[0].destination, root.join("Images/2024/photo.jpg"));
        assert_eq!(
            plan.entries[1].destination,
            root.join("Images/2024/photo (1).jpg")
        );
    }

    #[test]
    fn test_existing_file_on_disk_is_never_overwritten() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Documents/2023")).unwrap();
        fs::write(root.join("Documents/2023/notes.txt"), "unrelated").unwrap();
        fs::write(root.join("Documents/2023/notes (1).txt"), "unrelated").unwrap();

        let records = vec![record(root.join("notes.txt"), 2023, 3)];
        let plan = build_plan(&records, root, &options());
        assert_eq!(
            plan.entries[0].destination,
            root.join("Documents/2023/notes (2).txt")
        );
    }

    #[test]
    fn test_files_in_place_are_not_planned() {
        let root = Path::new("/virtual/root");
        let records = vec![
            record(root.join("Images/2024/photo.jpg"), 2024, 5),
            record(root.join("Images/2024/photo (1).jpg"), 2024, 5),
            record(root.join("loose.jpg"), 2024, 5),
        ];

        let plan = build_plan(&records, root, &options());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].source, root.join("loose.jpg"));
        assert_eq!(plan.stats.in_place, 2);
        assert_eq!(plan.stats.total.count, 3);
    }

    #[test]
    fn test_suffix_without_extension_and_multi_dot() {
        let root = Path::new("/virtual/root");
        let records = vec![
            record(root.join("x/Makefile"), 2020, 1),
            record(root.join("y/Makefile"), 2020, 1),
            record(root.join("x/backup.tar.gz"), 2020, 1),
            record(root.join("y/backup.tar.gz"), 2020, 1),
        ];

        let plan = build_plan(&records, root, &options());
        let names: Vec<_> = plan
            .entries
            .iter()
            .map(|e| e.destination.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&"Makefile (1)".to_string()));
        assert!(names.contains(&"backup.tar (1).gz".to_string()));
    }

    fn linked(path: PathBuf, year: i32, size: u64, inode: u64, first: bool) -> FileRecord {
        let mut record = record(path, year, size);
        record.device_inode = Some((1, inode));
        if !first {
            record.effective_size = 0;
        }
        record
    }

    #[test]
    fn test_stats_use_effective_size() {
        let root = Path::new("/virtual/root");
        let records = vec![
            linked(root.join("movie.mp4"), 2022, 100, 7, true),
            linked(root.join("copy.mp4"), 2022, 100, 7, false),
            record(root.join("song.mp3"), 2021, 50),
        ];

        let plan = build_plan(&records, root, &options());
        assert_eq!(plan.stats.total.size, 150);
        assert_eq!(plan.stats.total.raw_size, 250);
        assert_eq!(plan.stats.by_category[&Category::Videos].size, 100);
        assert_eq!(plan.stats.by_category[&Category::Videos].count, 2);

        let category_sum: u64 = plan.stats.by_category.values().map(|t| t.size).sum();
        let bucket_sum: u64 = plan.stats.by_bucket.values().map(|t| t.size).sum();
        assert_eq!(category_sum, plan.stats.total.size);
        assert_eq!(bucket_sum, plan.stats.total.size);
    }

    #[test]
    fn test_hardlink_counted_when_first_link_filtered_out() {
        let root = Path::new("/virtual/root");
        let records = vec![
            linked(root.join("a.jpg"), 2023, 10, 3, true),
            linked(root.join("b.pdf"), 2023, 10, 3, false),
        ];

        let mut opts = options();
        opts.filter = PlanFilter::parse(Some("documents"), None).unwrap();
        let plan = build_plan(&records, root, &opts);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].effective_size, 10);
        assert_eq!(plan.stats.total.size, 10);
        assert_eq!(plan.stats.total.raw_size, 10);

        let alone = build_plan(&records[1..], root, &opts);
        assert_eq!(alone.stats.total, plan.stats.total);
    }

    #[test]
    fn test_symlink_never_counted() {
        let root = Path::new("/virtual/root");
        let mut link = record(root.join("link.pdf"), 2023, 0);
        link.is_symlink = true;
        let plan = build_plan(&[link], root, &options());
        assert_eq!(plan.stats.total.size, 0);
        assert_eq!(plan.entries[0].effective_size, 0);
    }

    #[test]
    fn test_filter_omits_records_entirely() {
        let root = Path::new("/virtual/root");
        let records = vec![
            record(root.join("a.pdf"), 2023, 1),
            record(root.join("b.jpg"), 2023, 1),
            record(root.join("c.jpg"), 2024, 1),
        ];

        let mut opts = options();
        opts.filter = PlanFilter::parse(Some("images"), Some("2023")).unwrap();
        let plan = build_plan(&records, root, &opts);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].source, root.join("b.jpg"));
        assert_eq!(plan.stats.total.count, 1);
        assert_eq!(plan.count(MoveStatus::Skipped), 0);
    }

    #[test]
    fn test_year_filter_matches_bucket_label() {
        let root = Path::new("/virtual/root");
        let records = vec![
            record(root.join("old.txt"), 1995, 1),
            record(root.join("new.txt"), 2010, 1),
        ];

        let mut opts = options();
        opts.grouping =
            GroupConfig::with_reference_year(YearGrouping::Before { year: 2000 }, 2026).unwrap();
        opts.filter = PlanFilter::parse(None, Some("Pre-2000")).unwrap();
        let plan = build_plan(&records, root, &opts);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].bucket, "Pre-2000");
    }

    #[test]
    fn test_invalid_filters_rejected() {
        assert!(PlanFilter::parse(Some("pictures"), None).is_err());
        assert!(PlanFilter::parse(None, Some("  ")).is_err());
    }

    #[test]
    fn test_editing_plan() {
        let root = Path::new("/virtual/root");
        let records = vec![
            record(root.join("a.pdf"), 2023, 1),
            record(root.join("b.pdf"), 2023, 1),
        ];
        let mut plan = build_plan(&records, root, &options());

        plan.skip(0).unwrap();
        assert_eq!(plan.entries[0].status, MoveStatus::Skipped);
        plan.unskip(0).unwrap();
        assert_eq!(plan.entries[0].status, MoveStatus::Planned);

        plan.rename(1, "renamed.pdf").unwrap();
        assert_eq!(
            plan.entries[1].destination,
            root.join("Documents/2023/renamed.pdf")
        );
        assert!(plan.rename(1, "../escape.pdf").is_err());
        assert!(plan.rename(1, "").is_err());
        assert_eq!(plan.skip(9), Err(PlanError::IndexOutOfRange(9)));

        plan.entries[0].status = MoveStatus::Moved;
        assert!(matches!(
            plan.skip(0),
            Err(PlanError::NotEditable { .. })
        ));
    }

    #[test]
    fn test_retry_failed_resets_only_failures() {
        let root = Path::new("/virtual/root");
        let records = vec![
            record(root.join("a.pdf"), 2023, 1),
            record(root.join("b.pdf"), 2023, 1),
            record(root.join("c.pdf"), 2023, 1),
        ];
        let mut plan = build_plan(&records, root, &options());
        plan.entries[0].status = MoveStatus::Failed;
        plan.entries[0].reason = Some("permission denied".into());
        plan.entries[1].status = MoveStatus::Moved;

        assert_eq!(plan.retry_failed(), 1);
        assert_eq!(plan.entries[0].status, MoveStatus::Planned);
        assert!(plan.entries[0].reason.is_none());
        assert_eq!(plan.entries[1].status, MoveStatus::Moved);
        assert_eq!(plan.retry_failed(), 0);
    }

    #[test]
    fn test_duplicate_destinations_detected_after_edit() {
        let root = Path::new("/virtual/root");
        let records = vec![
            record(root.join("a.pdf"), 2023, 1),
            record(root.join("b.pdf"), 2023, 1),
        ];
        let mut plan = build_plan(&records, root, &options());
        assert!(plan.duplicate_destinations().is_empty());

        plan.rename(1, "a.pdf").unwrap();
        assert_eq!(
            plan.duplicate_destinations(),
            vec![root.join("Documents/2023/a.pdf")]
        );
        plan.skip(1).unwrap();
        assert!(plan.duplicate_destinations().is_empty());
    }

    #[test]
    fn test_clean_file_name() {
        assert_eq!(clean_file_name("my__file   name.txt"), "my file name.txt");
        assert_eq!(clean_file_name(" .dotted. .pdf"), "dotted.pdf");
        assert_eq!(clean_file_name("what?<>.doc"), "what.doc");
        assert_eq!(clean_file_name("???.doc"), "???.doc");

        let long = format!("{}.txt", "a".repeat(150));
        let cleaned = clean_file_name(&long);
        assert_eq!(cleaned.len(), MAX_CLEAN_STEM_CHARS + 4);
        assert_eq!(clean_file_name(&cleaned), cleaned);
    }

    #[test]
    fn test_clean_names_applied_to_destination() {
        let root = Path::new("/virtual/root");
        let records = vec![record(root.join("holiday__pic .jpg"), 2024, 1)];
        let mut opts = options();
        opts.clean_names = true;

        let plan = build_plan(&records, root, &opts);
        assert_eq!(
            plan.entries[0].destination,
            root.join("Images/2024/holiday pic.jpg")
        );
    }

    #[test]
    fn test_plan_serializes_with_expected_field_names() {
        let root = Path::new("/virtual/root");
        let plan = build_plan(&[record(root.join("a.pdf"), 2023, 7)], root, &options());
        let json = serde_json::to_value(&plan.entries[0]).unwrap();

        for field in [
            "source",
            "destination",
            "category",
            "bucket",
            "size",
            "effective_size",
            "status",
        ] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(json["status"], "planned");
        assert_eq!(json["category"], "Documents");
    }
}
