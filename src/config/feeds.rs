//! feeds.yaml: tab definitions and the sources under each tab.
use std::{
    collections::BTreeMap,
    fs,
    path::Path,
};

use serde::Deserialize;

use super::ConfigError;
use crate::model::Language;

const DEFAULT_TAB_LANGUAGE: &str = "en";

fn default_language() -> String {
    DEFAULT_TAB_LANGUAGE.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source_name: Option<String>,
}

/// One tab of feeds.yaml. Keys used only by the fetcher (`name`, `item_limit`)
/// are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TabConfig {
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    sources: Vec<FeedSource>,
}

impl TabConfig {
    #[must_use]
    pub fn new(language: &str, sources: Vec<FeedSource>) -> Self {
        Self {
            language: language.to_string(),
            sources,
        }
    }

    #[must_use]
    pub fn language(&self) -> Language {
        Language::from_code(&self.language)
    }

    #[must_use]
    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    /// Source whose URL equals `feed_url`, ignoring surrounding whitespace.
    #[must_use]
    pub fn source_for_url(&self, feed_url: &str) -> Option<&FeedSource> {
        let feed_url = feed_url.trim();
        self.sources
            .iter()
            .find(|source| source.url.trim() == feed_url)
    }
}

/// A source flattened together with its tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef<'a> {
    pub tab: &'a str,
    pub language: Language,
    pub source: &'a FeedSource,
}

/// Parsed feeds.yaml. The top-level `settings` block belongs to the fetcher
/// and is not read here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FeedsConfig {
    #[serde(default)]
    tabs: BTreeMap<String, TabConfig>,
}

impl FeedsConfig {
    #[must_use]
    pub fn new(tabs: BTreeMap<String, TabConfig>) -> Self {
        Self { tabs }
    }

    /// # Errors
    /// Returns the YAML error when the document does not have the expected shape.
    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Reads and parses feeds.yaml.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Deserialize`] carrying the path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents).map_err(|source| ConfigError::Deserialize {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn tab(&self, tab_id: &str) -> Option<&TabConfig> {
        self.tabs.get(tab_id)
    }

    pub fn tabs(&self) -> impl Iterator<Item = (&str, &TabConfig)> {
        self.tabs.iter().map(|(id, tab)| (id.as_str(), tab))
    }

    #[must_use]
    pub fn all_sources(&self) -> Vec<SourceRef<'_>> {
        self.tabs
            .iter()
            .flat_map(|(tab, config)| {
                let language = config.language();
                config.sources.iter().map(move |source| SourceRef {
                    tab: tab.as_str(),
                    language,
                    source,
                })
            })
            .collect()
    }
}
