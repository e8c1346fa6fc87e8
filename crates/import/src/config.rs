use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::detect::MIN_SNIFF_WINDOW;
use crate::error::Result;
use crate::rules::{CategoryRule, Classifier};

/// Import settings, usually read from a TOML file.
///
/// ```toml
/// sniff_window = 4096
///
/// [[rules]]
/// category = "Coffee"
/// keywords = ["coffee", "cafe", "starbucks"]
///
/// [[rules]]
/// category = "Streaming"
/// pattern = '\b(netflix|hulu)\b'
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Content bytes inspected when the filename has no known extension.
    pub sniff_window: usize,
    /// Ordered category rules. `None` selects the built-in list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<CategoryRule>>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            sniff_window: MIN_SNIFF_WINDOW,
            rules: None,
        }
    }
}

impl ImportConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    pub fn sniff_window(&self) -> usize {
        self.sniff_window.max(MIN_SNIFF_WINDOW)
    }

    /// Compiles the configured rules, or clones the built-in classifier.
    pub fn build_classifier(&self) -> Result<Classifier> {
        match &self.rules {
            Some(rules) => Classifier::new(rules),
            None => Ok(Classifier::builtin().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;
    use crate::rules::DEFAULT_CATEGORY;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        let config = ImportConfig::from_toml("").unwrap();
        assert_eq!(config, ImportConfig::default());
        assert_eq!(config.sniff_window(), 2048);
        assert_eq!(config.build_classifier().unwrap().len(), 8);
    }

    #[test]
    fn small_sniff_window_is_raised() {
        let config = ImportConfig::from_toml("sniff_window = 100").unwrap();
        assert_eq!(config.sniff_window, 100);
        assert_eq!(config.sniff_window(), MIN_SNIFF_WINDOW);
        let config = ImportConfig::from_toml("sniff_window = 8192").unwrap();
        assert_eq!(config.sniff_window(), 8192);
    }

    #[test]
    fn rules_keep_file_order() {
        let config = ImportConfig::from_toml(
            r#"
            [[rules]]
            category = "Streaming"
            pattern = '\b(netflix|hulu)\b'

            [[rules]]
            category = "Coffee"
            keywords = ["coffee", "starbucks"]

            [[rules]]
            category = "Subscriptions"
            keywords = ["netflix", "spotify"]
            "#,
        )
        .unwrap();

        let classifier = config.build_classifier().unwrap();
        assert_eq!(classifier.len(), 3);
        assert_eq!(classifier.classify("NETFLIX.COM"), "Streaming");
        assert_eq!(classifier.classify("SPOTIFY USA"), "Subscriptions");
        assert_eq!(classifier.classify("STARBUCKS #9"), "Coffee");
        // Built-in rules are replaced, not extended.
        assert_eq!(classifier.classify("GROCERY STORE"), DEFAULT_CATEGORY);
    }

    #[test]
    fn empty_rule_list_disables_classification() {
        let config = ImportConfig::from_toml("rules = []").unwrap();
        let classifier = config.build_classifier().unwrap();
        assert!(classifier.is_empty());
        assert_eq!(classifier.classify("STARBUCKS"), DEFAULT_CATEGORY);
    }

    #[test]
    fn bad_regex_fails_at_build_time() {
        let config = ImportConfig::from_toml(
            r#"
            [[rules]]
            category = "Broken"
            pattern = "(unclosed"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.build_classifier(),
            Err(ImportError::InvalidRule { .. })
        ));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = ImportConfig::from_toml("sniff_window = \"big\"").unwrap_err();
        assert!(matches!(err, ImportError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sniff_window = 4096").unwrap();
        let config = ImportConfig::load(file.path()).unwrap();
        assert_eq!(config.sniff_window(), 4096);
        assert!(config.rules.is_none());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ImportConfig::load(Path::new("/nonexistent/pfin-import.toml")).unwrap_err();
        assert!(matches!(err, ImportError::Io(_)));
    }
}
