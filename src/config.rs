//! Configuration: classification rules and scan filters.
//!
//! Configuration is stored as TOML:
//!
//! ```toml
//! [scan]
//! recursive = false
//! parallel = false
//! include_hidden = false
//! exclude_names = [".DS_Store", "Thumbs.db"]
//! exclude_patterns = ["*.part", "*.crdownload"]
//! exclude_regex = []
//!
//! [[rules]]
//! extension = ".jpg"
//! folder = "Images"
//!
//! [[rules]]
//! extension = ".pdf"
//! folder = "Documents"
//! ```
//!
//! Rules are ordered; the first rule matching a file's extension wins. When no
//! `[[rules]]` are given the built-in list from [`RuleSet::standard`] is used.

use crate::rules::{ClassificationRule, RuleSet};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the current directory.
pub const LOCAL_CONFIG_NAME: &str = ".tidyfoldrc.toml";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A rule with an empty extension or an unusable folder name.
    #[error("Invalid rule '{extension}' -> '{folder}': {reason}")]
    InvalidRule {
        extension: String,
        folder: String,
        reason: String,
    },

    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },

    /// Invalid regex pattern provided.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    /// IO error while reading or writing configuration.
    #[error("IO error on configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,

    /// Ordered classification rules. Empty means "use the built-in rules".
    #[serde(default)]
    pub rules: Vec<ClassificationRule>,
}

/// How a folder is scanned and which files are left alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Also organize files in subdirectories (category folders are never entered).
    #[serde(default)]
    pub recursive: bool,

    /// Classify files on a worker pool.
    #[serde(default)]
    pub parallel: bool,

    /// Whether files starting with "." are organized. Defaults to false.
    #[serde(default)]
    pub include_hidden: bool,

    /// Exact file names never moved.
    #[serde(default = "default_exclude_names")]
    pub exclude_names: Vec<String>,

    /// Glob patterns matched against the file name.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub exclude_regex: Vec<String>,
}

fn default_exclude_names() -> Vec<String> {
    vec![".DS_Store".to_string(), "Thumbs.db".to_string(), "desktop.ini".to_string()]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            parallel: false,
            include_hidden: false,
            exclude_names: default_exclude_names(),
            exclude_patterns: Vec::new(),
            exclude_regex: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path` if given (it must exist)
    /// 2. `.tidyfoldrc.toml` in the current directory
    /// 3. `~/.config/tidyfold/config.toml`
    /// 4. Built-in defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(home_config) = Self::user_config_path()
            && home_config.exists()
        {
            return Self::load_from_file(&home_config);
        }

        Ok(Self::default())
    }

    /// `$HOME/.config/tidyfold/config.toml`, if `HOME` is set.
    pub fn user_config_path() -> Option<PathBuf> {
        std::env::var("HOME").ok().map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("tidyfold")
                .join("config.toml")
        })
    }

    /// Load configuration from a specific file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), rules = config.rules.len(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// A configuration spelling out the built-in rules, as written by `--init-config`.
    pub fn with_standard_rules() -> Self {
        Self {
            scan: ScanConfig::default(),
            rules: RuleSet::standard().rules().to_vec(),
        }
    }

    /// Writes the default configuration to `path`, creating parent directories.
    ///
    /// Refuses to replace an existing file.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if path.exists() {
            return Err(io_error(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "refusing to overwrite existing configuration",
            )));
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let content = toml::to_string_pretty(&Self::with_standard_rules())
            .map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        fs::write(path, content).map_err(io_error)
    }

    /// Checks every rule has an extension and a plain folder name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.rules {
            let reason = if rule.extension.trim().trim_start_matches('.').is_empty() {
                Some("extension is empty")
            } else if rule.folder.trim().is_empty() {
                Some("folder name is empty")
            } else if rule.folder.contains(['/', '\\']) || rule.folder == ".." || rule.folder == "." {
                Some("folder must be a single directory name")
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(ConfigError::InvalidRule {
                    extension: rule.extension.clone(),
                    folder: rule.folder.clone(),
                    reason: reason.to_string(),
                });
            }
        }
        Ok(())
    }

    /// The rule set for a run: configured rules, or the built-in ones.
    pub fn rule_set(&self) -> RuleSet {
        if self.rules.is_empty() {
            RuleSet::standard()
        } else {
            RuleSet::new(self.rules.clone())
        }
    }
}

impl ScanConfig {
    /// Compile filters into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex pattern is invalid.
    pub fn compile(&self) -> Result<ScanFilter, ConfigError> {
        let patterns = self
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let regexes = self
            .exclude_regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ScanFilter {
            include_hidden: self.include_hidden,
            names: self.exclude_names.iter().cloned().collect(),
            patterns,
            regexes,
        })
    }
}

/// Compiled exclusion rules applied while scanning.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    include_hidden: bool,
    names: HashSet<String>,
    patterns: Vec<Pattern>,
    regexes: Vec<Regex>,
}

impl ScanFilter {
    /// A filter that only skips hidden files.
    pub fn hidden_only() -> Self {
        Self {
            include_hidden: false,
            names: HashSet::new(),
            patterns: Vec::new(),
            regexes: Vec::new(),
        }
    }

    /// A filter that lets every file through.
    pub fn allow_all() -> Self {
        Self {
            include_hidden: true,
            ..Self::hidden_only()
        }
    }

    /// Check if a file should be organized.
    ///
    /// Hidden files, exact names, glob patterns and regexes are checked in that order
    /// against the file name.
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if !self.include_hidden && file_name.starts_with('.') {
            return false;
        }
        if self.names.contains(file_name.as_ref()) {
            return false;
        }
        if self.patterns.iter().any(|pattern| pattern.matches(&file_name)) {
            return false;
        }
        !self.regexes.iter().any(|regex| regex.is_match(&file_name))
    }
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self::hidden_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_uses_standard_rules() {
        let config = Config::default();
        assert!(config.rules.is_empty());
        assert_eq!(config.rule_set(), RuleSet::standard());
        assert!(!config.scan.include_hidden);
        assert!(!config.scan.recursive);
    }

    #[test]
    fn test_parse_rules_in_order() {
        let config = Config::from_toml(
            r#"
            [[rules]]
            extension = "PDF"
            folder = "Papers"

            [[rules]]
            extension = ".pdf"
            folder = "Documents"
            "#,
        )
        .expect("config should parse");

        let rules = config.rule_set();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.classify(".pdf"), "Papers");
    }

    #[test]
    fn test_parse_scan_section() {
        let config = Config::from_toml(
            r#"
            [scan]
            recursive = true
            parallel = true
            exclude_patterns = ["*.part"]
            "#,
        )
        .unwrap();

        assert!(config.scan.recursive);
        assert!(config.scan.parallel);
        assert_eq!(config.scan.exclude_names, default_exclude_names());
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let result = Config::from_toml("[[rules]]\nextension = ");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_rule_validation() {
        for (extension, folder) in [("", "Docs"), (".txt", ""), (".txt", "../escape"), (".txt", "..")] {
            let config = Config {
                scan: ScanConfig::default(),
                rules: vec![ClassificationRule {
                    extension: extension.to_string(),
                    folder: folder.to_string(),
                }],
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidRule { .. })),
                "{:?} -> {:?} should be rejected",
                extension,
                folder
            );
        }
    }

    #[test]
    fn test_missing_explicit_config() {
        let result = Config::load(Some(Path::new("/non/existent/tidyfold.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_write_default_round_trips() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("nested").join("config.toml");

        Config::write_default(&path).expect("should write config");
        let loaded = Config::load(Some(&path)).expect("should load config");

        assert_eq!(loaded, Config::with_standard_rules());
        assert!(Config::write_default(&path).is_err());
    }

    #[test]
    fn test_filter_hidden_and_names() {
        let filter = ScanConfig::default().compile().unwrap();

        assert!(!filter.should_include(Path::new("/data/.hidden")));
        assert!(!filter.should_include(Path::new("/data/Thumbs.db")));
        assert!(filter.should_include(Path::new("/data/photo.jpg")));
    }

    #[test]
    fn test_filter_patterns_and_regex() {
        let scan = ScanConfig {
            exclude_patterns: vec!["*.part".to_string(), "[0-9]*.tmp".to_string()],
            exclude_regex: vec![r"^~\$".to_string()],
            ..ScanConfig::default()
        };
        let filter = scan.compile().unwrap();

        assert!(!filter.should_include(Path::new("/data/movie.mkv.part")));
        assert!(!filter.should_include(Path::new("/data/1cache.tmp")));
        assert!(filter.should_include(Path::new("/data/cache.tmp")));
        assert!(!filter.should_include(Path::new("/data/~$report.docx")));
        assert!(filter.should_include(Path::new("/data/report.docx")));
    }

    #[test]
    fn test_invalid_patterns_are_reported() {
        let bad_glob = ScanConfig {
            exclude_patterns: vec!["[invalid".to_string()],
            ..ScanConfig::default()
        };
        assert!(matches!(
            bad_glob.compile(),
            Err(ConfigError::InvalidGlobPattern { .. })
        ));

        let bad_regex = ScanConfig {
            exclude_regex: vec!["[invalid(".to_string()],
            ..ScanConfig::default()
        };
        assert!(matches!(
            bad_regex.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }

    #[test]
    fn test_allow_all_filter() {
        let filter = ScanFilter::allow_all();
        assert!(filter.should_include(Path::new("/data/.hidden")));
    }
}
