/// Prometheusメトリクス定義。
use prometheus::{
    Counter, CounterVec, Histogram, Registry, register_counter_vec_with_registry,
    register_counter_with_registry, register_histogram_with_registry,
};
use std::sync::Arc;

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub entries_received: Counter,
    pub articles_normalized: Counter,
    pub articles_rejected: Counter,
    pub dedup_removed: CounterVec,
    pub articles_classified: Counter,
    pub classification_fallbacks: Counter,
    pub articles_selected: Counter,
    pub summaries_generated: Counter,
    pub summary_fallbacks: Counter,
    pub runs_completed: Counter,
    pub runs_failed: Counter,

    // ヒストグラム
    pub normalize_duration: Histogram,
    pub dedup_duration: Histogram,
    pub classify_duration: Histogram,
    pub select_duration: Histogram,
    pub run_duration: Histogram,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成し、`registry` に登録する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録されている場合は [`prometheus::Error`] を返す。
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            entries_received: register_counter_with_registry!(
                "digest_entries_received_total",
                "Total number of raw feed entries received",
                registry
            )?,
            articles_normalized: register_counter_with_registry!(
                "digest_articles_normalized_total",
                "Total number of entries normalized into articles",
                registry
            )?,
            articles_rejected: register_counter_with_registry!(
                "digest_articles_rejected_total",
                "Total number of entries rejected during normalization",
                registry
            )?,
            dedup_removed: register_counter_vec_with_registry!(
                "digest_dedup_removed_total",
                "Articles removed by each deduplication stage",
                &["stage"],
                registry
            )?,
            articles_classified: register_counter_with_registry!(
                "digest_articles_classified_total",
                "Total number of zh articles classified",
                registry
            )?,
            classification_fallbacks: register_counter_with_registry!(
                "digest_classification_fallbacks_total",
                "zh articles that ended on the default category",
                registry
            )?,
            articles_selected: register_counter_with_registry!(
                "digest_articles_selected_total",
                "Total number of articles selected for display",
                registry
            )?,
            summaries_generated: register_counter_with_registry!(
                "digest_summaries_generated_total",
                "Total number of summaries attached",
                registry
            )?,
            summary_fallbacks: register_counter_with_registry!(
                "digest_summary_fallbacks_total",
                "Summaries that fell back to the feed description",
                registry
            )?,
            runs_completed: register_counter_with_registry!(
                "digest_runs_completed_total",
                "Total number of successful runs",
                registry
            )?,
            runs_failed: register_counter_with_registry!(
                "digest_runs_failed_total",
                "Total number of failed runs",
                registry
            )?,
            normalize_duration: register_histogram_with_registry!(
                "digest_normalize_duration_seconds",
                "Duration of the normalize stage",
                registry
            )?,
            dedup_duration: register_histogram_with_registry!(
                "digest_dedup_duration_seconds",
                "Duration of the dedup stage",
                registry
            )?,
            classify_duration: register_histogram_with_registry!(
                "digest_classify_duration_seconds",
                "Duration of the classify stage",
                registry
            )?,
            select_duration: register_histogram_with_registry!(
                "digest_select_duration_seconds",
                "Duration of the select stage",
                registry
            )?,
            run_duration: register_histogram_with_registry!(
                "digest_run_duration_seconds",
                "Duration of a whole digest run",
                registry
            )?,
        })
    }
}
