//! Run artifacts: the article listing, the run summary and the metrics dump.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    catalog::{CategoryTable, DEFAULT_CAPACITY},
    model::ArticleWithSummary,
    pipeline::{PipelineStats, select::Selection},
    util::text::truncate_chars,
};

pub const ARTICLES_DATA_FILE: &str = "articles_data.json";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";
pub const RUN_LOG_FILE: &str = "run_log.jsonl";
pub const METRICS_FILE: &str = "metrics.prom";

/// Summary characters kept in the article listing.
const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {file}: {source}")]
    Encode {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// One article in `articles_data.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleDigestEntry {
    pub title: String,
    pub link: String,
    pub source: String,
    pub published: String,
    pub summary: String,
}

impl From<&ArticleWithSummary> for ArticleDigestEntry {
    fn from(article: &ArticleWithSummary) -> Self {
        Self {
            title: article.title.clone(),
            link: article.link.clone(),
            source: article.source_name.clone(),
            published: article.published_at.to_rfc3339(),
            summary: truncate_chars(&article.summary, PREVIEW_CHARS),
        }
    }
}

#[must_use]
pub fn articles_data(selection: &Selection<ArticleWithSummary>) -> Selection<ArticleDigestEntry> {
    selection.clone().map(|article| ArticleDigestEntry::from(&article))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunCounts {
    pub entries_received: usize,
    pub articles_normalized: usize,
    pub articles_rejected: usize,
    pub articles_deduplicated: usize,
    pub articles_selected: usize,
    pub summaries_generated: usize,
    pub items_per_category: usize,
    pub selected_by_tab: BTreeMap<String, BTreeMap<String, usize>>,
}

/// Contents of `run_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub run_date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
    #[serde(flatten)]
    pub counts: Option<RunCounts>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, Vec<String>>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    #[must_use]
    pub fn success(
        run_id: Uuid,
        started: DateTime<FixedOffset>,
        finished: DateTime<FixedOffset>,
        stats: &PipelineStats,
        summaries_generated: usize,
        table: &CategoryTable,
    ) -> Self {
        let categories = table
            .tabs()
            .map(|tab| (tab.tab().to_string(), tab.categories().to_vec()))
            .collect();
        Self {
            counts: Some(RunCounts {
                entries_received: stats.entries_received,
                articles_normalized: stats.articles_normalized,
                articles_rejected: stats.articles_rejected,
                articles_deduplicated: stats.articles_deduplicated,
                articles_selected: stats.articles_selected,
                summaries_generated,
                items_per_category: DEFAULT_CAPACITY,
                selected_by_tab: stats.selected_by_tab.clone(),
            }),
            categories,
            status: RunStatus::Success,
            ..Self::timing(run_id, started, finished)
        }
    }

    #[must_use]
    pub fn failed(
        run_id: Uuid,
        started: DateTime<FixedOffset>,
        finished: DateTime<FixedOffset>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::timing(run_id, started, finished)
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn timing(
        run_id: Uuid,
        started: DateTime<FixedOffset>,
        finished: DateTime<FixedOffset>,
    ) -> Self {
        let millis = (finished - started).num_milliseconds().max(0);
        Self {
            run_id,
            run_date: started.format("%Y-%m-%d").to_string(),
            start_time: started.to_rfc3339(),
            end_time: finished.to_rfc3339(),
            duration_seconds: (millis as f64 / 10.0).round() / 100.0,
            counts: None,
            categories: BTreeMap::new(),
            status: RunStatus::Failed,
            error: None,
        }
    }
}

async fn ensure_dir(dir: &Path) -> Result<(), OutputError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| OutputError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })
}

async fn write_file(
    dir: &Path,
    file: &'static str,
    contents: &[u8],
) -> Result<PathBuf, OutputError> {
    ensure_dir(dir).await?;
    let path = dir.join(file);
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| OutputError::Write {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

async fn write_json<T: Serialize>(
    dir: &Path,
    file: &'static str,
    value: &T,
) -> Result<PathBuf, OutputError> {
    let encoded =
        serde_json::to_vec_pretty(value).map_err(|source| OutputError::Encode { file, source })?;
    write_file(dir, file, &encoded).await
}

/// Writes `articles_data.json`.
///
/// # Errors
/// Returns [`OutputError`] when the directory or file cannot be written.
pub async fn write_articles_data(
    dir: &Path,
    selection: &Selection<ArticleWithSummary>,
) -> Result<PathBuf, OutputError> {
    write_json(dir, ARTICLES_DATA_FILE, &articles_data(selection)).await
}

/// Writes `run_summary.json`.
///
/// # Errors
/// Returns [`OutputError`] when the directory or file cannot be written.
pub async fn write_run_summary(dir: &Path, summary: &RunSummary) -> Result<PathBuf, OutputError> {
    write_json(dir, RUN_SUMMARY_FILE, summary).await
}

/// Writes the Prometheus text exposition to `metrics.prom`.
///
/// # Errors
/// Returns [`OutputError`] when the directory or file cannot be written.
pub async fn write_metrics(dir: &Path, exposition: &str) -> Result<PathBuf, OutputError> {
    write_file(dir, METRICS_FILE, exposition.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::select::{CategoryBucket, TabSelection};
    use chrono::{Duration, TimeZone, Utc};

    fn started() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .expect("offset")
            .with_ymd_and_hms(2024, 12, 25, 7, 0, 0)
            .single()
            .expect("valid time")
    }

    fn summarized(summary: &str) -> ArticleWithSummary {
        ArticleWithSummary {
            title: "颱風來襲".into(),
            link: "https://example.tw/a".into(),
            published_at: Utc.with_ymd_and_hms(2024, 12, 24, 22, 0, 0).single().expect("time"),
            source_name: "中央社".into(),
            summary: summary.into(),
            tab: "zh_news".into(),
            final_category: Some("社會".into()),
        }
    }

    #[test]
    fn listing_truncates_long_summaries() {
        let entry = ArticleDigestEntry::from(&summarized(&"雨".repeat(120)));
        assert_eq!(entry.summary.chars().count(), 103);
        assert!(entry.summary.ends_with("..."));
        assert_eq!(entry.published, "2024-12-24T22:00:00+00:00");

        let short = ArticleDigestEntry::from(&summarized("短訊"));
        assert_eq!(short.summary, "短訊");
    }

    #[test]
    fn success_summary_serializes_counts_inline() {
        let stats = PipelineStats {
            entries_received: 10,
            articles_normalized: 9,
            articles_deduplicated: 7,
            articles_selected: 5,
            ..PipelineStats::default()
        };
        let summary = RunSummary::success(
            Uuid::nil(),
            started(),
            started() + Duration::milliseconds(1534),
            &stats,
            5,
            &CategoryTable::standard(),
        );
        let value = serde_json::to_value(&summary).expect("serializes");
        assert_eq!(value["status"], "success");
        assert_eq!(value["run_date"], "2024-12-25");
        assert_eq!(value["duration_seconds"], 1.53);
        assert_eq!(value["articles_deduplicated"], 7);
        assert_eq!(value["items_per_category"], 8);
        assert_eq!(value["categories"]["zh_news"][0], "頭條新聞");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failed_summary_carries_error_only() {
        let summary = RunSummary::failed(Uuid::nil(), started(), started(), "rules missing");
        let value = serde_json::to_value(&summary).expect("serializes");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "rules missing");
        assert!(value.get("articles_selected").is_none());
        assert!(value.get("categories").is_none());
    }

    #[tokio::test]
    async fn writes_artifacts_into_new_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let out = dir.path().join("output");
        let selection = Selection::new(vec![TabSelection::new(
            "zh_news",
            vec![CategoryBucket::new("社會", vec![summarized("颱風假")])],
        )]);

        let path = write_articles_data(&out, &selection).await.expect("write listing");
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read listing")).expect("json");
        assert_eq!(written["zh_news"]["社會"][0]["source"], "中央社");

        let metrics = write_metrics(&out, "digest_runs_completed_total 1\n")
            .await
            .expect("write metrics");
        assert!(metrics.ends_with(METRICS_FILE));
    }
}
