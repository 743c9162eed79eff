//! 3段階の重複除去（guid → link → タイトル近似）。
//!
//! 各段は前段の生存記事だけを受け取り、グループ内で最も新しい記事を残す。
//! 公開時刻が同じ場合は先に現れた記事を残す。
use std::{
    collections::{HashMap, hash_map::Entry},
    hash::Hash,
};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    model::CanonicalArticle,
    util::{links::normalize_link, text::title_comparison_key},
};

use super::{RunContext, normalize::NormalizedCorpus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeduplicatedCorpus {
    pub run_id: Uuid,
    pub articles: Vec<CanonicalArticle>,
    pub report: DedupReport,
}

pub trait DedupStage: Send + Sync {
    fn deduplicate(&self, run: &RunContext, corpus: NormalizedCorpus) -> DeduplicatedCorpus;
}

/// 各段の通過件数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub input: usize,
    pub after_guid: usize,
    pub after_link: usize,
    pub after_title: usize,
}

impl DedupReport {
    #[must_use]
    pub fn removed_by_guid(&self) -> usize {
        self.input.saturating_sub(self.after_guid)
    }

    #[must_use]
    pub fn removed_by_link(&self) -> usize {
        self.after_guid.saturating_sub(self.after_link)
    }

    #[must_use]
    pub fn removed_by_title(&self) -> usize {
        self.after_link.saturating_sub(self.after_title)
    }

    #[must_use]
    pub fn removed(&self) -> usize {
        self.input.saturating_sub(self.after_title)
    }
}

/// キーごとに最新の記事だけを残す。生存記事はグループが最初に現れた順に並ぶ。
fn keep_latest_by<K, F>(articles: Vec<CanonicalArticle>, key: F) -> Vec<CanonicalArticle>
where
    K: Eq + Hash,
    F: Fn(&CanonicalArticle) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::with_capacity(articles.len());
    let mut survivors: Vec<CanonicalArticle> = Vec::with_capacity(articles.len());

    for article in articles {
        match slots.entry(key(&article)) {
            Entry::Occupied(slot) => {
                let current = &mut survivors[*slot.get()];
                if article.published_at > current.published_at {
                    *current = article;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(survivors.len());
                survivors.push(article);
            }
        }
    }

    survivors
}

/// 第1段: guid 単位。
#[must_use]
pub fn dedup_by_guid(articles: Vec<CanonicalArticle>) -> Vec<CanonicalArticle> {
    keep_latest_by(articles, |article| article.guid.clone())
}

/// 第2段: 正規化済みリンク単位。正規化は冪等なので再計算しても値は変わらない。
#[must_use]
pub fn dedup_by_link(articles: Vec<CanonicalArticle>) -> Vec<CanonicalArticle> {
    keep_latest_by(articles, |article| normalize_link(&article.link))
}

/// 第3段: `(tab, タイトル比較キー, source_name)` 単位。
#[must_use]
pub fn dedup_by_title(articles: Vec<CanonicalArticle>) -> Vec<CanonicalArticle> {
    keep_latest_by(articles, |article| {
        (
            article.tab.clone(),
            title_comparison_key(&article.title),
            article.source_name.clone(),
        )
    })
}

/// 3段すべてを通し、各段の件数も返す。
#[must_use]
pub fn deduplicate_with_report(
    articles: Vec<CanonicalArticle>,
) -> (Vec<CanonicalArticle>, DedupReport) {
    let input = articles.len();
    let by_guid = dedup_by_guid(articles);
    let after_guid = by_guid.len();
    let by_link = dedup_by_link(by_guid);
    let after_link = by_link.len();
    let by_title = dedup_by_title(by_link);
    let report = DedupReport {
        input,
        after_guid,
        after_link,
        after_title: by_title.len(),
    };
    (by_title, report)
}

#[must_use]
pub fn deduplicate(articles: Vec<CanonicalArticle>) -> Vec<CanonicalArticle> {
    deduplicate_with_report(articles).0
}

/// 指定タブの記事だけを対象に重複除去する。
#[must_use]
pub fn deduplicate_within_tab(articles: &[CanonicalArticle], tab: &str) -> Vec<CanonicalArticle> {
    let scoped = articles
        .iter()
        .filter(|article| article.tab == tab)
        .cloned()
        .collect();
    deduplicate(scoped)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CascadeDedupStage;

impl CascadeDedupStage {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DedupStage for CascadeDedupStage {
    fn deduplicate(&self, run: &RunContext, corpus: NormalizedCorpus) -> DeduplicatedCorpus {
        let (articles, report) = deduplicate_with_report(corpus.articles);
        tracing::debug!(
            run_id = %run.run_id,
            input = report.input,
            removed_by_guid = report.removed_by_guid(),
            removed_by_link = report.removed_by_link(),
            removed_by_title = report.removed_by_title(),
            "deduplication finished"
        );
        DeduplicatedCorpus {
            run_id: run.run_id,
            articles,
            report,
        }
    }
}
