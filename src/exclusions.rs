// URL exclusion policy applied during capture
// Static assets and user-supplied URL patterns are skipped before
// deduplication so they never enter a role's request corpus.

use crate::errors::MatrixError;
use regex::{Regex, RegexBuilder};

/// Default file-extension suffixes treated as static assets.
pub const STATIC_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".html", ".htm", ".gif", ".jpg", ".jpeg", ".png", ".ico", ".woff", ".woff2",
    ".ttf", ".svg", ".webp", ".pdf", ".mp4", ".mp3", ".avi", ".mov", ".zip", ".rar", ".bmp",
    ".eot", ".otf", ".map", ".json", ".xml", ".txt", ".webmanifest", ".wasm", ".bin",
];

/// Decides which captured URLs are ignored. The extension list is data, not
/// hardcoded logic; callers auditing apps with unusual asset routing can
/// replace it.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    exclude_static: bool,
    extensions: Vec<String>,
    patterns: Vec<Regex>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            exclude_static: true,
            extensions: STATIC_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            patterns: Vec::new(),
        }
    }
}

impl ExclusionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_exclude_static(&mut self, enabled: bool) {
        self.exclude_static = enabled;
    }

    pub fn exclude_static(&self) -> bool {
        self.exclude_static
    }

    /// Replace the static-asset extension list.
    pub fn set_extensions(&mut self, extensions: Vec<String>) {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.to_ascii_lowercase())
            .collect();
    }

    /// Add a case-insensitive exclusion pattern matched against the full URL.
    /// Invalid regexes are rejected up front.
    pub fn add_pattern(&mut self, pattern: &str) -> Result<(), MatrixError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| MatrixError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        self.patterns.push(regex);
        Ok(())
    }

    pub fn clear_patterns(&mut self) {
        self.patterns.clear();
    }

    pub fn patterns(&self) -> Vec<String> {
        self.patterns.iter().map(|r| r.as_str().to_string()).collect()
    }

    /// True when the URL should not be captured. The suffix check runs on the
    /// lower-cased URL with its query string stripped; patterns always apply,
    /// independent of the static-asset toggle.
    pub fn should_ignore(&self, url: &str) -> bool {
        if self.exclude_static {
            let without_query = url.split('?').next().unwrap_or(url).to_ascii_lowercase();
            if self
                .extensions
                .iter()
                .any(|ext| without_query.ends_with(ext.as_str()))
            {
                return true;
            }
        }
        self.patterns.iter().any(|regex| regex.is_match(url))
    }
}
