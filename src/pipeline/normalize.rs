use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::{FeedsConfig, TabConfig},
    model::{CanonicalArticle, Language, RawEntry, SourceContext, StructuredTime},
    util::{
        links::{normalize_link, source_name_from_feed_url},
        text::{strip_markup, title_digest, truncate_on_word_boundary},
        time,
    },
};

use super::RunContext;

/// Raw entries keyed by tab id.
pub type RawFeeds = BTreeMap<String, Vec<RawEntry>>;

/// Descriptions longer than this are cut on a word boundary.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

const UNKNOWN_SOURCE: &str = "Unknown";

/// Raw feed input after decoding, with the count of entries that could not be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFeeds {
    pub feeds: RawFeeds,
    /// Entries that were not JSON objects, or tabs whose value was not a list.
    pub malformed: usize,
}

/// Decodes `{tab: [entry, ..]}` entry by entry.
///
/// An entry that is not an object, or a tab that is not a list, is counted
/// and skipped; the rest of the input is kept.
///
/// # Errors
/// Returns the JSON error when the input is not a JSON object at all.
pub fn decode_raw_feeds(input: &[u8]) -> Result<DecodedFeeds, serde_json::Error> {
    let tabs: BTreeMap<String, serde_json::Value> = serde_json::from_slice(input)?;
    let mut decoded = DecodedFeeds::default();

    for (tab, value) in tabs {
        let serde_json::Value::Array(values) = value else {
            warn!(tab = %tab, "raw feed tab is not a list, skipping");
            decoded.malformed += 1;
            continue;
        };
        let mut entries = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<RawEntry>(value) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    warn!(tab = %tab, index, error = %error, "skipping unreadable raw entry");
                    decoded.malformed += 1;
                }
            }
        }
        decoded.feeds.insert(tab, entries);
    }

    Ok(decoded)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCorpus {
    pub run_id: Uuid,
    pub articles: Vec<CanonicalArticle>,
    pub received: usize,
    pub rejected: usize,
    pub skipped_tabs: Vec<String>,
}

pub trait NormalizeStage: Send + Sync {
    fn normalize(&self, run: &RunContext, feeds: &RawFeeds) -> NormalizedCorpus;
}

/// Converts raw entries into canonical records.
///
/// `processed_at` is the timestamp substituted for entries whose publish
/// time is missing or unparseable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    processed_at: DateTime<Utc>,
}

impl Normalizer {
    #[must_use]
    pub fn new(processed_at: DateTime<Utc>) -> Self {
        Self { processed_at }
    }

    /// Returns `None` when the entry has no usable title or link.
    #[must_use]
    pub fn normalize_entry(
        &self,
        entry: &RawEntry,
        context: &SourceContext,
    ) -> Option<CanonicalArticle> {
        let title = strip_markup(entry.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            debug!(tab = %context.tab, "entry rejected: empty title");
            return None;
        }

        let link = normalize_link(entry.link.as_deref().unwrap_or_default());
        if link.is_empty() {
            debug!(tab = %context.tab, title = %title, "entry rejected: empty link");
            return None;
        }

        let published_at = self.published_at(entry);
        let description = description(entry.summary_text());
        let guid = entry
            .explicit_id()
            .or_else(|| (!link.is_empty()).then(|| link.clone()))
            .unwrap_or_else(|| title_digest(&title));
        let source_name = resolve_source_name(context, entry);

        Some(CanonicalArticle {
            title,
            link,
            published_at,
            source_name,
            language: context.language,
            tab: context.tab.clone(),
            rss_category: context.rss_category.clone(),
            guid,
            description,
            final_category: None,
        })
    }

    /// Normalizes every tab that has a feed configuration.
    #[must_use]
    pub fn normalize_all(
        &self,
        run: &RunContext,
        feeds: &RawFeeds,
        config: &FeedsConfig,
    ) -> NormalizedCorpus {
        let mut corpus = NormalizedCorpus {
            run_id: run.run_id,
            articles: Vec::new(),
            received: 0,
            rejected: 0,
            skipped_tabs: Vec::new(),
        };

        for (tab, entries) in feeds {
            corpus.received += entries.len();
            let Some(tab_config) = config.tab(tab) else {
                warn!(
                    run_id = %run.run_id,
                    tab = %tab,
                    entries = entries.len(),
                    "no feed configuration for tab, skipping"
                );
                corpus.rejected += entries.len();
                corpus.skipped_tabs.push(tab.clone());
                continue;
            };

            for entry in entries {
                let context = source_context(tab, tab_config, entry);
                match self.normalize_entry(entry, &context) {
                    Some(article) => corpus.articles.push(article),
                    None => corpus.rejected += 1,
                }
            }
        }

        debug!(
            run_id = %run.run_id,
            received = corpus.received,
            normalized = corpus.articles.len(),
            rejected = corpus.rejected,
            "normalization finished"
        );
        corpus
    }

    fn published_at(&self, entry: &RawEntry) -> DateTime<Utc> {
        entry
            .published_parsed
            .as_ref()
            .and_then(StructuredTime::to_utc)
            .or_else(|| entry.published.as_deref().and_then(time::parse_free_form))
            .unwrap_or(self.processed_at)
    }
}

fn description(raw: Option<&str>) -> Option<String> {
    let cleaned = strip_markup(raw.unwrap_or_default());
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.chars().count() > DESCRIPTION_MAX_CHARS {
        Some(truncate_on_word_boundary(&cleaned, DESCRIPTION_MAX_CHARS))
    } else {
        Some(cleaned)
    }
}

fn resolve_source_name(context: &SourceContext, entry: &RawEntry) -> String {
    let declared = context.source_name.trim();
    if !declared.is_empty() {
        return declared.to_string();
    }
    entry
        .source_feed_url
        .as_deref()
        .and_then(source_name_from_feed_url)
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

/// Per-entry overrides win over the configured source, which wins over the tab.
fn source_context(tab: &str, tab_config: &TabConfig, entry: &RawEntry) -> SourceContext {
    let source = entry
        .source_feed_url
        .as_deref()
        .and_then(|url| tab_config.source_for_url(url));

    let language = entry
        .language
        .as_deref()
        .map_or_else(|| tab_config.language(), Language::from_code);
    let rss_category = entry
        .category
        .clone()
        .or_else(|| source.map(|source| source.category.clone()))
        .unwrap_or_default();
    let source_name = entry
        .source_name
        .clone()
        .or_else(|| source.and_then(|source| source.source_name.clone()))
        .unwrap_or_default();

    SourceContext {
        tab: tab.to_string(),
        language,
        rss_category,
        source_name,
    }
}

/// Default [`NormalizeStage`] backed by the feeds configuration.
#[derive(Debug, Clone)]
pub struct FeedNormalizeStage {
    feeds: Arc<FeedsConfig>,
}

impl FeedNormalizeStage {
    #[must_use]
    pub fn new(feeds: Arc<FeedsConfig>) -> Self {
        Self { feeds }
    }
}

impl NormalizeStage for FeedNormalizeStage {
    fn normalize(&self, run: &RunContext, feeds: &RawFeeds) -> NormalizedCorpus {
        Normalizer::new(run.processed_at).normalize_all(run, feeds, &self.feeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawGuid;
    use chrono::TimeZone;
    use rstest::rstest;

    fn processed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("valid time")
    }

    fn context() -> SourceContext {
        SourceContext {
            tab: "zh_news".into(),
            language: Language::Zh,
            rss_category: "社會".into(),
            source_name: "中央社".into(),
        }
    }

    fn entry(title: &str, link: &str) -> RawEntry {
        RawEntry {
            title: Some(title.into()),
            link: Some(link.into()),
            ..RawEntry::default()
        }
    }

    #[test]
    fn cleans_title_and_link() {
        let raw = entry(
            "<b>颱風</b>&amp;豪雨   來襲 ",
            "HTTPS://News.Example.TW/a/1/?utm_source=rss&id=7#top",
        );
        let article = Normalizer::new(processed_at())
            .normalize_entry(&raw, &context())
            .expect("entry kept");
        assert_eq!(article.title, "颱風&豪雨 來襲");
        assert_eq!(article.link, "https://news.example.tw/a/1?id=7");
        assert_eq!(article.guid, article.link);
        assert_eq!(article.final_category, None);
    }

    #[rstest]
    #[case(entry("  <br/> ", "https://example.com/a"))]
    #[case(entry("Title", "   "))]
    #[case(RawEntry::default())]
    fn rejects_unusable_entries(#[case] raw: RawEntry) {
        assert!(Normalizer::new(processed_at()).normalize_entry(&raw, &context()).is_none());
    }

    #[test]
    fn prefers_structured_time_then_string_then_processing_time() {
        let normalizer = Normalizer::new(processed_at());
        let mut raw = entry("Title", "https://example.com/a");
        raw.published = Some("2024-12-25T10:30:00Z".into());
        raw.published_parsed = Some(StructuredTime::Parts(vec![2024.0, 12.0, 24.0, 8.0, 0.0, 0.0]));
        let article = normalizer.normalize_entry(&raw, &context()).expect("kept");
        assert_eq!(article.published_at.to_rfc3339(), "2024-12-24T08:00:00+00:00");

        raw.published_parsed = None;
        let article = normalizer.normalize_entry(&raw, &context()).expect("kept");
        assert_eq!(article.published_at.to_rfc3339(), "2024-12-25T10:30:00+00:00");

        raw.published = Some("not a date".into());
        let article = normalizer.normalize_entry(&raw, &context()).expect("kept");
        assert_eq!(article.published_at, processed_at());
    }

    #[test]
    fn long_description_is_cut_on_word_boundary() {
        let mut raw = entry("Title", "https://example.com/a");
        raw.summary = Some(format!("<p>{}</p>", "word ".repeat(150)));
        let article = Normalizer::new(processed_at())
            .normalize_entry(&raw, &context())
            .expect("kept");
        let description = article.description.expect("description kept");
        assert!(description.ends_with("word..."));
        assert!(description.chars().count() <= DESCRIPTION_MAX_CHARS + 3);
    }

    #[test]
    fn blank_description_becomes_none() {
        let mut raw = entry("Title", "https://example.com/a");
        raw.summary = Some("<p> &nbsp; </p>".into());
        let article = Normalizer::new(processed_at())
            .normalize_entry(&raw, &context())
            .expect("kept");
        assert_eq!(article.description, None);
    }

    #[test]
    fn explicit_guid_wins_over_link() {
        let mut raw = entry("Title", "https://example.com/a");
        raw.guid = Some(RawGuid::Object {
            value: Some("abc".into()),
        });
        let article = Normalizer::new(processed_at())
            .normalize_entry(&raw, &context())
            .expect("kept");
        assert_eq!(article.guid, "abc");
    }

    #[test]
    fn source_name_derived_from_feed_url() {
        let mut raw = entry("Title", "https://example.com/a");
        raw.source_feed_url = Some("https://feeds.bbci.co.uk/news/rss.xml".into());
        let mut context = context();
        context.source_name = String::new();
        let normalizer = Normalizer::new(processed_at());
        let article = normalizer.normalize_entry(&raw, &context).expect("kept");
        assert_eq!(article.source_name, "Bbci");

        raw.source_feed_url = None;
        let article = normalizer.normalize_entry(&raw, &context).expect("kept");
        assert_eq!(article.source_name, UNKNOWN_SOURCE);
    }

    #[test]
    fn normalize_all_skips_unconfigured_tabs_and_applies_overrides() {
        let config = FeedsConfig::from_yaml_str(
            r"
tabs:
  zh_news:
    language: zh
    sources:
      - category: 財經
        url: https://money.udn.com/rss
        source_name: 經濟日報
",
        )
        .expect("feeds parse");

        let mut from_source = entry("台股收紅", "https://money.udn.com/a/1");
        from_source.source_feed_url = Some("https://money.udn.com/rss".into());
        let mut overridden = entry("Tokyo markets", "https://example.jp/a");
        overridden.language = Some("ja".into());
        overridden.category = Some("商業".into());

        let mut feeds = RawFeeds::new();
        feeds.insert(
            "zh_news".into(),
            vec![from_source, overridden, entry("", "https://example.com/x")],
        );
        feeds.insert("kr_news".into(), vec![entry("Seoul", "https://example.kr/a")]);

        let run = RunContext::new(processed_at());
        let corpus = Normalizer::new(processed_at()).normalize_all(&run, &feeds, &config);

        assert_eq!(corpus.received, 4);
        assert_eq!(corpus.articles.len(), 2);
        assert_eq!(corpus.rejected, 2);
        assert_eq!(corpus.skipped_tabs, vec!["kr_news".to_string()]);

        let first = &corpus.articles[0];
        assert_eq!(first.rss_category, "財經");
        assert_eq!(first.source_name, "經濟日報");
        assert_eq!(first.language, Language::Zh);

        let second = &corpus.articles[1];
        assert_eq!(second.language, Language::Ja);
        assert_eq!(second.rss_category, "商業");
        assert_eq!(second.source_name, UNKNOWN_SOURCE);
    }

    #[test]
    fn bad_entries_do_not_drop_their_neighbours() {
        let input = r#"{
            "zh_news": [
                {"title": "颱風來襲", "link": "https://example.tw/a", "published": "2024-12-24T08:00:00Z"},
                {"title": 12345, "link": "https://example.tw/b"},
                {"title": "豪雨特報", "link": "https://example.tw/c", "summary": "s", "description": "d"},
                {"title": "地震", "link": "https://example.tw/d", "published_parsed": [2024, 1, 1, 0, 0, 0.0]},
                "not an entry"
            ],
            "en_news": "not a list"
        }"#;
        let decoded = decode_raw_feeds(input.as_bytes()).expect("object input decodes");
        assert_eq!(decoded.malformed, 2);
        assert!(!decoded.feeds.contains_key("en_news"));

        let entries = &decoded.feeds["zh_news"];
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1].title, None);
        assert_eq!(entries[2].summary_text(), Some("s"));

        let config = FeedsConfig::from_yaml_str("tabs:\n  zh_news:\n    language: zh\n")
            .expect("feeds parse");
        let run = RunContext::new(processed_at());
        let corpus = Normalizer::new(processed_at()).normalize_all(&run, &decoded.feeds, &config);
        let titles: Vec<&str> = corpus.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["颱風來襲", "豪雨特報", "地震"]);
        assert_eq!(corpus.rejected, 1);
        assert_eq!(
            corpus.articles[2].published_at.to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn non_object_input_is_an_error() {
        assert!(decode_raw_feeds(b"[1, 2]").is_err());
    }
}
