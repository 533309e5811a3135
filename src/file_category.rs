//! File categorization by extension.
//!
//! This module maps file extensions to the coarse categories used as the
//! top-level folders of an organized tree (e.g. "Documents", "Images").
//!
//! # Examples
//!
//! ```
//! use filetidy::file_category::{Category, classify};
//!
//! assert_eq!(classify("pdf"), Category::Documents);
//! assert_eq!(classify(".JPG"), Category::Images);
//! assert_eq!(classify(""), Category::Other);
//! ```
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Represents a broad file category.
///
/// Ordering follows declaration order, which is also the order categories
/// are listed in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Text, office and e-book files (PDF, DOCX, TXT, etc.)
    Documents,
    /// Image files (PNG, JPG, HEIC, etc.)
    Images,
    /// Video files (MP4, MKV, MOV, etc.)
    Videos,
    /// Audio files (MP3, FLAC, WAV, etc.)
    Audio,
    /// Source code and structured text (Rust, Python, JSON, etc.)
    Code,
    /// Archives and disk images (ZIP, TAR, ISO, etc.)
    Archives,
    /// Unknown or uncategorized files
    Other,
}

const EXTENSION_TABLE: &[(Category, &[&str])] = &[
    (
        Category::Documents,
        &[
            "pdf", "doc", "docx", "txt", "rtf", "odt", "xls", "xlsx", "ppt", "pptx", "csv", "md",
            "epub", "mobi",
        ],
    ),
    (
        Category::Images,
        &[
            "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "tiff", "ico", "heic", "raw", "psd",
            "ai",
        ],
    ),
    (
        Category::Videos,
        &[
            "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "mpeg", "mpg", "3gp",
        ],
    ),
    (
        Category::Audio,
        &["mp3", "wav", "flac", "aac", "ogg", "wma", "m4a", "aiff", "opus"],
    ),
    (
        Category::Code,
        &[
            "py", "js", "ts", "jsx", "tsx", "html", "css", "java", "c", "cpp", "h", "go", "rs",
            "rb", "php", "swift", "kt", "scala", "sh", "bash", "zsh", "sql", "json", "xml", "yaml",
            "yml", "toml", "ini", "cfg",
        ],
    ),
    (
        Category::Archives,
        &["zip", "rar", "7z", "tar", "gz", "bz2", "xz", "iso", "dmg"],
    ),
];

impl Category {
    /// All categories in report order.
    pub const ALL: [Category; 7] = [
        Category::Documents,
        Category::Images,
        Category::Videos,
        Category::Audio,
        Category::Code,
        Category::Archives,
        Category::Other,
    ];

    /// Returns the directory name for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use filetidy::file_category::Category;
    ///
    /// assert_eq!(Category::Images.dir_name(), "Images");
    /// assert_eq!(Category::Other.dir_name(), "Other");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Documents => "Documents",
            Category::Images => "Images",
            Category::Videos => "Videos",
            Category::Audio => "Audio",
            Category::Code => "Code",
            Category::Archives => "Archives",
            Category::Other => "Other",
        }
    }

    /// Icon shown next to the category in summaries.
    pub fn icon(&self) -> &'static str {
        match self {
            Category::Documents => "📄",
            Category::Images => "🖼️",
            Category::Videos => "🎬",
            Category::Audio => "🎵",
            Category::Code => "💻",
            Category::Archives => "📦",
            Category::Other => "📁",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Error returned when a category name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}' (expected one of Documents, Images, Videos, Audio, Code, Archives, Other)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Parses a category name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.dir_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

fn extension_map() -> &'static HashMap<&'static str, Category> {
    static MAP: OnceLock<HashMap<&'static str, Category>> = OnceLock::new();
    MAP.get_or_init(|| {
        EXTENSION_TABLE
            .iter()
            .flat_map(|(category, exts)| exts.iter().map(move |ext| (*ext, *category)))
            .collect()
    })
}

/// Maps a file extension to its category.
///
/// The lookup is case-insensitive and tolerates a leading dot. Any extension
/// not in the table, including the empty string, maps to [`Category::Other`].
pub fn classify(extension: &str) -> Category {
    let ext = extension.trim_start_matches('.').to_lowercase();
    extension_map()
        .get(ext.as_str())
        .copied()
        .unwrap_or(Category::Other)
}
