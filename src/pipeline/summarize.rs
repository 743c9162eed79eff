//! 選択済み記事に要約を付けて表示用レコードにする。
//!
//! 要約の生成元は [`Summarizer`] で差し替えられる。ここで提供するのは
//! フィードの説明文を流用する [`DescriptionSummarizer`] のみ。
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::{
    model::{ArticleWithSummary, CanonicalArticle, Language},
    util::text::{ELLIPSIS, truncate_on_word_boundary},
};

use super::select::{CategoryBucket, Selection, TabSelection};

/// Default upper bound of a summary, in characters.
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 200;

const CJK_SENTENCE_END: char = '。';
const CJK_ELLIPSIS: char = '…';

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("summarizer {provider} failed: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn summarize(&self, article: &CanonicalArticle) -> Result<String, SummarizeError>;
}

/// Reuses the feed description, or the title when there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptionSummarizer {
    max_chars: usize,
}

impl Default for DescriptionSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_MAX_CHARS)
    }
}

impl DescriptionSummarizer {
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    #[must_use]
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Summary text for `article`, never longer than `max_chars` characters.
    #[must_use]
    pub fn summary_for(&self, article: &CanonicalArticle) -> String {
        let text = article
            .description
            .as_deref()
            .filter(|description| !description.is_empty())
            .unwrap_or(&article.title);
        self.cap(text, article.language)
    }

    fn cap(&self, text: &str, language: Language) -> String {
        if text.chars().count() <= self.max_chars {
            return text.to_string();
        }
        match language {
            Language::Zh | Language::Ja => cut_cjk(text, self.max_chars),
            Language::En | Language::Other => {
                truncate_on_word_boundary(text, self.max_chars.saturating_sub(ELLIPSIS.len()))
            }
        }
    }
}

/// 末尾付近に句点があればそこで切り、無ければ省略記号で終える。
fn cut_cjk(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    if let Some(idx) = head.rfind(CJK_SENTENCE_END) {
        let kept_chars = head[..idx].chars().count();
        if kept_chars * 10 > max_chars * 7 {
            return head[..idx + CJK_SENTENCE_END.len_utf8()].to_string();
        }
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push(CJK_ELLIPSIS);
    cut
}

#[async_trait]
impl Summarizer for DescriptionSummarizer {
    fn name(&self) -> &'static str {
        "description"
    }

    async fn summarize(&self, article: &CanonicalArticle) -> Result<String, SummarizeError> {
        Ok(self.summary_for(article))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub generated: usize,
    pub fallbacks: usize,
}

/// Attaches a summary to every selected article.
///
/// A failing `summarizer` never fails the run: the article falls back to
/// `fallback`. The record's `final_category` becomes the display category it
/// was selected under.
pub async fn summarize_selection(
    selection: Selection<CanonicalArticle>,
    summarizer: &dyn Summarizer,
    fallback: &DescriptionSummarizer,
) -> (Selection<ArticleWithSummary>, SummaryReport) {
    let mut report = SummaryReport::default();
    let mut tabs = Vec::with_capacity(selection.tabs().len());

    for tab in selection.into_tabs() {
        let tab_id = tab.tab().to_string();
        let mut buckets = Vec::with_capacity(tab.buckets().len());
        for bucket in tab.into_buckets() {
            let category = bucket.category().to_string();
            let mut items = Vec::with_capacity(bucket.items().len());
            for article in bucket.into_items() {
                let summary = match summarizer.summarize(&article).await {
                    Ok(summary) => summary,
                    Err(error) => {
                        warn!(
                            guid = %article.guid,
                            summarizer = summarizer.name(),
                            error = %error,
                            "summarizer failed, using description"
                        );
                        report.fallbacks += 1;
                        fallback.summary_for(&article)
                    }
                };
                let mut record = ArticleWithSummary::from_article(&article, summary);
                record.final_category = Some(category.clone());
                items.push(record);
                report.generated += 1;
            }
            buckets.push(CategoryBucket::new(category, items));
        }
        tabs.push(TabSelection::new(tab_id, buckets));
    }

    (Selection::new(tabs), report)
}
