//! Folders the scanner never enters.
//!
//! A [`ProtectedFolderSet`] combines the built-in list of system, tooling and
//! environment folders with user exclusions. User exclusions come in three
//! shapes:
//!
//! - a plain name such as `Work Projects`, matched against any directory name
//! - a two-level path such as `Personal/Private`, matched against the
//!   directory's path relative to the scan root
//! - a glob such as `Archive*` or `Clients/*/raw`, matched against the
//!   root-relative path

use crate::config::ConfigError;
use glob::Pattern;
use std::collections::BTreeSet;
use std::path::Path;

/// Folder names protected out of the box.
pub const DEFAULT_PROTECTED: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".vscode",
    ".idea",
    ".eclipse",
    ".npm",
    ".nvm",
    ".bun",
    ".yarn",
    ".pyenv",
    ".conda",
    ".virtualenv",
    ".config",
    ".local",
    ".cache",
    ".ssh",
    ".gnupg",
    ".Trash",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    "venv",
    "env",
    ".env",
    "Library",
    "Applications",
    ".oh-my-zsh",
    ".zsh_sessions",
];

#[derive(Debug, Clone)]
pub struct ProtectedFolderSet {
    names: BTreeSet<String>,
    paths: BTreeSet<String>,
    patterns: Vec<Pattern>,
    protect_hidden: bool,
}

impl Default for ProtectedFolderSet {
    fn default() -> Self {
        Self {
            names: DEFAULT_PROTECTED.iter().map(|s| s.to_string()).collect(),
            paths: BTreeSet::new(),
            patterns: Vec::new(),
            protect_hidden: true,
        }
    }
}

fn is_glob(text: &str) -> bool {
    text.contains(['*', '?', '['])
}

impl ProtectedFolderSet {
    /// Defaults plus the given user exclusions.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidGlobPattern` for malformed globs.
    pub fn with_exclusions<I, S>(exclusions: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for exclusion in exclusions {
            set.add(exclusion.as_ref())?;
        }
        Ok(set)
    }

    /// Adds one user exclusion.
    pub fn add(&mut self, exclusion: &str) -> Result<(), ConfigError> {
        let exclusion = exclusion.trim().trim_matches('/').replace('\\', "/");
        if exclusion.is_empty() {
            return Ok(());
        }

        if is_glob(&exclusion) {
            let pattern = Pattern::new(&exclusion)
                .map_err(|_| ConfigError::InvalidGlobPattern(exclusion.clone()))?;
            self.patterns.push(pattern);
        } else if exclusion.contains('/') {
            self.paths.insert(exclusion);
        } else {
            self.names.insert(exclusion);
        }
        Ok(())
    }

    /// Returns true if the directory at `rel_path` (relative to the scan
    /// root) must not be entered.
    pub fn is_protected(&self, rel_path: &Path) -> bool {
        let Some(name) = rel_path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };

        if self.protect_hidden && name.starts_with('.') {
            return true;
        }
        if self.names.contains(name.as_ref()) {
            return true;
        }

        let rel = rel_path.to_string_lossy().replace('\\', "/");
        if self.paths.contains(&rel) {
            return true;
        }
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_path(rel_path))
    }

    /// Every exclusion currently in effect, for display.
    pub fn entries(&self) -> Vec<String> {
        self.names
            .iter()
            .chain(self.paths.iter())
            .cloned()
            .chain(self.patterns.iter().map(|p| p.as_str().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_system_folders() {
        let set = ProtectedFolderSet::default();
        assert!(set.is_protected(Path::new("node_modules")));
        assert!(set.is_protected(Path::new("project/node_modules")));
        assert!(set.is_protected(Path::new("Library")));
        assert!(!set.is_protected(Path::new("Photos")));
    }

    #[test]
    fn test_hidden_folders_protected() {
        let set = ProtectedFolderSet::default();
        assert!(set.is_protected(Path::new(".secret")));
        assert!(set.is_protected(Path::new("a/b/.thumbnails")));
    }

    #[test]
    fn test_user_name_exclusion() {
        let set = ProtectedFolderSet::with_exclusions(["Work Projects"]).unwrap();
        assert!(set.is_protected(Path::new("Work Projects")));
        assert!(!set.is_protected(Path::new("Work")));
    }

    #[test]
    fn test_two_level_exclusion_only_matches_that_path() {
        let set = ProtectedFolderSet::with_exclusions(["Personal/Private"]).unwrap();
        assert!(set.is_protected(Path::new("Personal/Private")));
        assert!(!set.is_protected(Path::new("Personal")));
        assert!(!set.is_protected(Path::new("Private")));
        assert!(!set.is_protected(Path::new("Other/Private")));
    }

    #[test]
    fn test_glob_exclusion() {
        let set = ProtectedFolderSet::with_exclusions(["Archive*", "Clients/*/raw"]).unwrap();
        assert!(set.is_protected(Path::new("Archive 2019")));
        assert!(set.is_protected(Path::new("Clients/acme/raw")));
        assert!(!set.is_protected(Path::new("Clients/acme")));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        assert!(ProtectedFolderSet::with_exclusions(["[broken"]).is_err());
    }

    #[test]
    fn test_entries_lists_user_additions() {
        let set = ProtectedFolderSet::with_exclusions(["Keep", "A/B"]).unwrap();
        let entries = set.entries();
        assert!(entries.contains(&"Keep".to_string()));
        assert!(entries.contains(&"A/B".to_string()));
        assert!(entries.contains(&"node_modules".to_string()));
    }
}
