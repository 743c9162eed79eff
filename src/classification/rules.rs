//! 分類ルールの読み込み。
//!
//! YAML上のキーワードルールは `{priority, keywords}` 形式と素のリスト形式の
//! どちらでも書けるが、読み込み時に [`KeywordRule`] へ一本化する。
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_yaml::Mapping;

/// Priority given to keyword rules that do not declare one.
pub const DEFAULT_RULE_PRIORITY: i64 = 99;

/// Category used when no rule file sets `default_category`.
pub const DEFAULT_CATEGORY: &str = "頭條新聞";

/// A keyword rule as written in the rule file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeywordRuleSpec {
    Bare(Vec<String>),
    Structured {
        #[serde(default)]
        priority: Option<i64>,
        #[serde(default)]
        keywords: Vec<String>,
    },
}

impl KeywordRuleSpec {
    fn into_rule(self, category: String) -> KeywordRule {
        match self {
            Self::Bare(keywords) => KeywordRule {
                category,
                priority: DEFAULT_RULE_PRIORITY,
                keywords,
            },
            Self::Structured { priority, keywords } => KeywordRule {
                category,
                priority: priority.unwrap_or(DEFAULT_RULE_PRIORITY),
                keywords,
            },
        }
    }
}

/// Canonical keyword rule. Lower priority is checked first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub category: String,
    pub priority: i64,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    #[must_use]
    pub fn new<S: Into<String>>(category: S, priority: i64, keywords: &[&str]) -> Self {
        Self {
            category: category.into(),
            priority,
            keywords: keywords.iter().map(ToString::to_string).collect(),
        }
    }
}

/// `(url substring, category)` pair of the source-default stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDefault {
    pub pattern: String,
    pub category: String,
}

impl SourceDefault {
    #[must_use]
    pub fn new(pattern: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            category: category.into(),
        }
    }
}

/// Classification rule set in its resolved in-memory form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rss_mapping: HashMap<String, String>,
    keyword_rules: Vec<KeywordRule>,
    source_defaults: Vec<SourceDefault>,
    default_category: String,
}

impl RuleSet {
    /// Builds a rule set. `keyword_rules` are given in source order and are
    /// stably sorted by priority here, so equal priorities keep that order.
    #[must_use]
    pub fn new(
        rss_mapping: HashMap<String, String>,
        mut keyword_rules: Vec<KeywordRule>,
        source_defaults: Vec<SourceDefault>,
        default_category: impl Into<String>,
    ) -> Self {
        keyword_rules.sort_by_key(|rule| rule.priority);
        Self {
            rss_mapping,
            keyword_rules,
            source_defaults,
            default_category: default_category.into(),
        }
    }

    /// Parses the YAML rule document.
    ///
    /// # Errors
    /// Returns the YAML error when the document or one of its sections has the wrong shape.
    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        let file: RuleFile = serde_yaml::from_str(contents)?;

        let mut keyword_rules = Vec::with_capacity(file.keyword_rules.len());
        for (key, value) in file.keyword_rules {
            let category: String = serde_yaml::from_value(key)?;
            let spec: KeywordRuleSpec = serde_yaml::from_value(value)?;
            keyword_rules.push(spec.into_rule(category));
        }

        let mut source_defaults = Vec::with_capacity(file.source_defaults.len());
        for (key, value) in file.source_defaults {
            let pattern: String = serde_yaml::from_value(key)?;
            let category: String = serde_yaml::from_value(value)?;
            source_defaults.push(SourceDefault { pattern, category });
        }

        Ok(Self::new(
            file.rss_to_target_mapping,
            keyword_rules,
            source_defaults,
            file.default_category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        ))
    }

    /// Reads and parses a rule file.
    ///
    /// # Errors
    /// Returns [`RuleLoadError`] when the file is missing, unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, RuleLoadError> {
        let contents = fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents).map_err(|source| RuleLoadError::Deserialize {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn rss_mapping(&self) -> &HashMap<String, String> {
        &self.rss_mapping
    }

    /// Keyword rules in evaluation order.
    #[must_use]
    pub fn keyword_rules(&self) -> &[KeywordRule] {
        &self.keyword_rules
    }

    #[must_use]
    pub fn source_defaults(&self) -> &[SourceDefault] {
        &self.source_defaults
    }

    #[must_use]
    pub fn default_category(&self) -> &str {
        &self.default_category
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuleFile {
    rss_to_target_mapping: HashMap<String, String>,
    // Mapping keeps document order, which breaks priority ties.
    keyword_rules: Mapping,
    source_defaults: Mapping,
    default_category: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RuleLoadError {
    #[error("failed to read classification rules at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse classification rules at {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to compile keyword matcher: {0}")]
    Matcher(#[from] aho_corasick::BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r"
rss_to_target_mapping:
  財經: 產經
  國際: 全球國際新聞
keyword_rules:
  運動:
    priority: 3
    keywords: [NBA, 中職]
  股市:
    priority: 1
    keywords: [股市, 台股, 加權指數]
  房市: [房價, 預售屋]
  產經:
    priority: 1
    keywords: [出口]
source_defaults:
  money.udn.com: 產經
  sports: 運動
default_category: 社會
";

    #[test]
    fn parses_both_rule_shapes_into_canonical_rules() {
        let rules = RuleSet::from_yaml_str(RULES).expect("rules parse");
        let order: Vec<(&str, i64)> = rules
            .keyword_rules()
            .iter()
            .map(|rule| (rule.category.as_str(), rule.priority))
            .collect();
        assert_eq!(
            order,
            vec![("股市", 1), ("產經", 1), ("運動", 3), ("房市", DEFAULT_RULE_PRIORITY)]
        );
        assert_eq!(rules.keyword_rules()[3].keywords, vec!["房價", "預售屋"]);
    }

    #[test]
    fn keeps_source_default_order_and_mapping() {
        let rules = RuleSet::from_yaml_str(RULES).expect("rules parse");
        let patterns: Vec<&str> = rules
            .source_defaults()
            .iter()
            .map(|pair| pair.pattern.as_str())
            .collect();
        assert_eq!(patterns, vec!["money.udn.com", "sports"]);
        assert_eq!(rules.rss_mapping().get("財經").map(String::as_str), Some("產經"));
        assert_eq!(rules.default_category(), "社會");
    }

    #[test]
    fn empty_document_uses_defaults() {
        let rules = RuleSet::from_yaml_str("{}").expect("empty rules parse");
        assert!(rules.keyword_rules().is_empty());
        assert!(rules.source_defaults().is_empty());
        assert_eq!(rules.default_category(), DEFAULT_CATEGORY);
    }

    #[test]
    fn malformed_rule_is_rejected() {
        let err = RuleSet::from_yaml_str("keyword_rules:\n  股市: 42\n");
        assert!(err.is_err());
    }

    #[test]
    fn load_reports_missing_file_path() {
        let missing = Path::new("/nonexistent/classification_rules.yaml");
        match RuleSet::load(missing) {
            Err(RuleLoadError::Io { path, .. }) => {
                assert!(path.ends_with("classification_rules.yaml"));
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
