/// Extension-based classification rules.
///
/// A [`RuleSet`] is an ordered list of `extension -> folder` mappings. Matching is
/// case-insensitive and the first matching rule wins; files that match nothing go to
/// [`DEFAULT_FOLDER`].
///
/// # Examples
///
/// ```
/// use tidyfold::rules::{ClassificationRule, RuleSet};
///
/// let rules = RuleSet::new(vec![
///     ClassificationRule::new("pdf", "Documents"),
///     ClassificationRule::new(".JPG", "Images"),
/// ]);
/// assert_eq!(rules.classify(".pdf"), "Documents");
/// assert_eq!(rules.classify(".jpg"), "Images");
/// assert_eq!(rules.classify(".xyz"), "Others");
/// ```
use serde::{Deserialize, Serialize};

/// Folder used for files no rule matches.
pub const DEFAULT_FOLDER: &str = "Others";

/// Maps one extension to a category folder name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Extension this rule matches, e.g. `.jpg`.
    pub extension: String,
    /// Folder name files with this extension are moved into.
    pub folder: String,
}

impl ClassificationRule {
    /// Creates a rule, normalizing the extension to lower-case with a leading dot.
    pub fn new(extension: &str, folder: &str) -> Self {
        Self {
            extension: normalize_extension(extension),
            folder: folder.to_string(),
        }
    }

    /// Returns true if this rule applies to `extension` (case-insensitive).
    pub fn matches(&self, extension: &str) -> bool {
        !extension.is_empty() && self.extension.eq_ignore_ascii_case(&normalize_extension(extension))
    }
}

/// Lower-cases an extension and makes sure it starts with a dot.
///
/// An empty input stays empty so extension-less files never match a rule.
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// Ordered, immutable list of classification rules used for one organization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    /// Creates a rule set from an ordered list; extensions are normalized.
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| ClassificationRule::new(&rule.extension, &rule.folder))
                .collect(),
        }
    }

    /// The built-in rule list used when no configuration provides one.
    pub fn standard() -> Self {
        let groups: &[(&str, &[&str])] = &[
            ("Images", &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "tiff", "ico", "heic"]),
            ("Documents", &["pdf", "doc", "docx", "txt", "rtf", "odt", "md", "html", "htm"]),
            ("Videos", &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "3gp"]),
            ("Music", &["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma"]),
            ("Archives", &["zip", "rar", "7z", "tar", "gz", "bz2", "xz"]),
            ("Spreadsheets", &["csv", "xls", "xlsx", "ods"]),
            ("Presentations", &["ppt", "pptx", "odp"]),
            ("Code", &["rs", "py", "js", "ts", "c", "cpp", "h", "java", "go", "sh", "json", "xml", "yaml", "yml", "toml"]),
            ("Fonts", &["ttf", "otf", "woff", "woff2"]),
            ("Installers", &["exe", "msi", "dmg", "pkg", "deb", "rpm", "apk"]),
        ];

        let rules = groups
            .iter()
            .flat_map(|(folder, extensions)| {
                extensions
                    .iter()
                    .map(move |ext| ClassificationRule::new(ext, folder))
            })
            .collect();

        Self { rules }
    }

    /// Returns the folder for a (dot-prefixed or bare) extension.
    pub fn classify(&self, extension: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(extension))
            .map(|rule| rule.folder.as_str())
            .unwrap_or(DEFAULT_FOLDER)
    }

    /// Every folder name a file can be sorted into, in rule order, without duplicates,
    /// ending with [`DEFAULT_FOLDER`].
    pub fn folder_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for rule in &self.rules {
            if !names.contains(&rule.folder) {
                names.push(rule.folder.clone());
            }
        }
        if !names.iter().any(|name| name == DEFAULT_FOLDER) {
            names.push(DEFAULT_FOLDER.to_string());
        }
        names
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}
