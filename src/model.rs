//! Records flowing through the digest pipeline.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

use crate::util::time;

/// Article language as declared by the feed configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
    Ja,
    #[default]
    #[serde(other)]
    Other,
}

impl Language {
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().to_ascii_lowercase();
        match code.as_str() {
            "zh" | "zh-tw" | "zh-hant" | "zh-hk" | "zh-cn" | "zh-hans" => Self::Zh,
            "en" | "en-us" | "en-gb" => Self::En,
            "ja" | "jp" | "ja-jp" => Self::Ja,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
            Self::Ja => "ja",
            Self::Other => "other",
        }
    }
}

/// Feed-supplied identity token: either a bare string or `{ "value": .. }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawGuid {
    Text(String),
    Number(i64),
    Object { value: Option<String> },
}

impl RawGuid {
    /// Non-empty textual form of the id, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
            Self::Object { value } => value.as_deref().unwrap_or_default().trim().to_string(),
        };
        (!text.is_empty()).then_some(text)
    }
}

/// Structured publish time as produced by feed parsers.
///
/// Numbers may arrive as floats (`0.0`); fractional parts are dropped.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StructuredTime {
    /// Seconds since the unix epoch.
    Unix(f64),
    /// `[year, month, day, hour, minute, second, ..]`, UTC.
    Parts(Vec<f64>),
}

impl StructuredTime {
    #[must_use]
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Unix(seconds) => whole(*seconds).and_then(time::from_unix_seconds),
            Self::Parts(parts) => {
                let parts = parts.iter().copied().map(whole).collect::<Option<Vec<_>>>()?;
                time::from_parts(&parts)
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn whole(value: f64) -> Option<i64> {
    // beyond 2^53 an f64 no longer holds whole seconds exactly
    (value.is_finite() && value.abs() < 9.0e15).then(|| value.trunc() as i64)
}

/// Field decoder that turns a value of the wrong shape into `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// A feed entry as handed over by the feed transport.
///
/// Every field may be absent or carry an unexpected type; such fields read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawEntry {
    #[serde(deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub link: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub published: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub published_parsed: Option<StructuredTime>,
    #[serde(deserialize_with = "lenient")]
    pub summary: Option<String>,
    /// Used when `summary` is absent or blank.
    #[serde(deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub guid: Option<RawGuid>,
    #[serde(deserialize_with = "lenient")]
    pub id: Option<RawGuid>,
    #[serde(deserialize_with = "lenient")]
    pub source_feed_url: Option<String>,
    #[serde(rename = "_language", deserialize_with = "lenient")]
    pub language: Option<String>,
    #[serde(rename = "_category", deserialize_with = "lenient")]
    pub category: Option<String>,
    #[serde(rename = "_source_name", deserialize_with = "lenient")]
    pub source_name: Option<String>,
}

impl RawEntry {
    /// Explicit id from the feed, `guid` first then `id`.
    #[must_use]
    pub fn explicit_id(&self) -> Option<String> {
        self.guid
            .as_ref()
            .and_then(RawGuid::as_text)
            .or_else(|| self.id.as_ref().and_then(RawGuid::as_text))
    }

    /// Feed summary text, falling back to `description`.
    #[must_use]
    pub fn summary_text(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .filter(|summary| !summary.trim().is_empty())
            .or(self.description.as_deref())
    }
}

/// Caller-supplied context for one raw entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    pub tab: String,
    pub language: Language,
    pub rss_category: String,
    pub source_name: String,
}

/// Canonical article record produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalArticle {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub language: Language,
    pub tab: String,
    pub rss_category: String,
    pub guid: String,
    pub description: Option<String>,
    /// Set by the classifier for zh records only.
    pub final_category: Option<String>,
}

/// Presentation record handed to renderers: a selected article plus its summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleWithSummary {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub summary: String,
    pub tab: String,
    pub final_category: Option<String>,
}

impl ArticleWithSummary {
    #[must_use]
    pub fn from_article(article: &CanonicalArticle, summary: String) -> Self {
        Self {
            title: article.title.clone(),
            link: article.link.clone(),
            published_at: article.published_at,
            source_name: article.source_name.clone(),
            summary,
            tab: article.tab.clone(),
            final_category: article.final_category.clone(),
        }
    }
}
