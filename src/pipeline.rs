use std::{collections::BTreeMap, sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    catalog::CategoryTable, classification::Classifier, config::FeedsConfig,
    model::CanonicalArticle, observability::metrics::Metrics,
};

pub mod classify;
pub mod dedup;
pub mod normalize;
pub mod select;
pub mod summarize;

use classify::{ClassifyStage, RuleClassifyStage};
use dedup::{CascadeDedupStage, DedupReport, DedupStage};
use normalize::{FeedNormalizeStage, NormalizeStage, RawFeeds};
use select::{CategorySelectStage, SelectStage, Selection};

/// Identity and clock of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: Uuid,
    /// Substituted for entries without a usable publish time.
    pub processed_at: DateTime<Utc>,
}

impl RunContext {
    #[must_use]
    pub fn new(processed_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            processed_at,
        }
    }
}

/// Counters collected while the stages run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub entries_received: usize,
    pub articles_normalized: usize,
    pub articles_rejected: usize,
    pub skipped_tabs: Vec<String>,
    pub dedup: DedupReport,
    pub articles_deduplicated: usize,
    pub zh_classified: usize,
    pub classification_fallbacks: usize,
    pub articles_selected: usize,
    pub selected_by_tab: BTreeMap<String, BTreeMap<String, usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub selection: Selection<CanonicalArticle>,
    pub stats: PipelineStats,
}

pub struct PipelineOrchestrator {
    stages: PipelineStages,
    metrics: Option<Arc<Metrics>>,
}

struct PipelineStages {
    normalize: Arc<dyn NormalizeStage>,
    dedup: Arc<dyn DedupStage>,
    classify: Arc<dyn ClassifyStage>,
    select: Arc<dyn SelectStage>,
}

pub struct PipelineBuilder {
    feeds: Arc<FeedsConfig>,
    table: Arc<CategoryTable>,
    classifier: Arc<Classifier>,
    normalize: Option<Arc<dyn NormalizeStage>>,
    dedup: Option<Arc<dyn DedupStage>>,
    classify: Option<Arc<dyn ClassifyStage>>,
    select: Option<Arc<dyn SelectStage>>,
    metrics: Option<Arc<Metrics>>,
}

impl PipelineOrchestrator {
    /// Builder whose unset stages fall back to the rule-based defaults.
    #[must_use]
    pub fn builder(
        feeds: Arc<FeedsConfig>,
        table: Arc<CategoryTable>,
        classifier: Arc<Classifier>,
    ) -> PipelineBuilder {
        PipelineBuilder::new(feeds, table, classifier)
    }

    /// Runs normalize → dedup → classify → select over `raw_feeds`.
    ///
    /// Never fails: unusable records are dropped and counted.
    #[must_use]
    pub fn execute(&self, run: &RunContext, raw_feeds: &RawFeeds) -> PipelineRun {
        tracing::debug!(run_id = %run.run_id, tabs = raw_feeds.len(), "digest pipeline started");

        let started = Instant::now();
        let normalized = self.stages.normalize.normalize(run, raw_feeds);
        self.observe(|metrics| metrics.normalize_duration.observe(started.elapsed().as_secs_f64()));
        let mut stats = PipelineStats {
            entries_received: normalized.received,
            articles_normalized: normalized.articles.len(),
            articles_rejected: normalized.rejected,
            skipped_tabs: normalized.skipped_tabs.clone(),
            ..PipelineStats::default()
        };

        let started = Instant::now();
        let deduplicated = self.stages.dedup.deduplicate(run, normalized);
        self.observe(|metrics| metrics.dedup_duration.observe(started.elapsed().as_secs_f64()));
        stats.dedup = deduplicated.report;
        stats.articles_deduplicated = deduplicated.articles.len();

        let started = Instant::now();
        let classified = self.stages.classify.classify(run, deduplicated);
        self.observe(|metrics| {
            metrics.classify_duration.observe(started.elapsed().as_secs_f64());
        });
        stats.zh_classified = classified.classified;
        stats.classification_fallbacks = classified.fallbacks;

        let started = Instant::now();
        let selection = self.stages.select.select(run, classified);
        self.observe(|metrics| metrics.select_duration.observe(started.elapsed().as_secs_f64()));
        stats.articles_selected = selection.total();
        stats.selected_by_tab = selection.counts();

        self.record(&stats);
        tracing::info!(
            run_id = %run.run_id,
            received = stats.entries_received,
            normalized = stats.articles_normalized,
            deduplicated = stats.articles_deduplicated,
            selected = stats.articles_selected,
            "digest pipeline finished"
        );

        PipelineRun {
            run_id: run.run_id,
            selection,
            stats,
        }
    }

    fn observe<F: FnOnce(&Metrics)>(&self, f: F) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn record(&self, stats: &PipelineStats) {
        self.observe(|metrics| {
            metrics.entries_received.inc_by(stats.entries_received as f64);
            metrics.articles_normalized.inc_by(stats.articles_normalized as f64);
            metrics.articles_rejected.inc_by(stats.articles_rejected as f64);
            for (stage, removed) in [
                ("guid", stats.dedup.removed_by_guid()),
                ("link", stats.dedup.removed_by_link()),
                ("title", stats.dedup.removed_by_title()),
            ] {
                metrics
                    .dedup_removed
                    .with_label_values(&[stage])
                    .inc_by(removed as f64);
            }
            metrics.articles_classified.inc_by(stats.zh_classified as f64);
            metrics
                .classification_fallbacks
                .inc_by(stats.classification_fallbacks as f64);
            metrics.articles_selected.inc_by(stats.articles_selected as f64);
        });
    }
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(
        feeds: Arc<FeedsConfig>,
        table: Arc<CategoryTable>,
        classifier: Arc<Classifier>,
    ) -> Self {
        Self {
            feeds,
            table,
            classifier,
            normalize: None,
            dedup: None,
            classify: None,
            select: None,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_normalize_stage(mut self, stage: Arc<dyn NormalizeStage>) -> Self {
        self.normalize = Some(stage);
        self
    }

    #[must_use]
    pub fn with_dedup_stage(mut self, stage: Arc<dyn DedupStage>) -> Self {
        self.dedup = Some(stage);
        self
    }

    #[must_use]
    pub fn with_classify_stage(mut self, stage: Arc<dyn ClassifyStage>) -> Self {
        self.classify = Some(stage);
        self
    }

    #[must_use]
    pub fn with_select_stage(mut self, stage: Arc<dyn SelectStage>) -> Self {
        self.select = Some(stage);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn build(self) -> PipelineOrchestrator {
        let stages = PipelineStages {
            normalize: self
                .normalize
                .unwrap_or_else(|| Arc::new(FeedNormalizeStage::new(Arc::clone(&self.feeds)))),
            dedup: self
                .dedup
                .unwrap_or_else(|| Arc::new(CascadeDedupStage::new())),
            classify: self
                .classify
                .unwrap_or_else(|| Arc::new(RuleClassifyStage::new(Arc::clone(&self.classifier)))),
            select: self
                .select
                .unwrap_or_else(|| Arc::new(CategorySelectStage::new(Arc::clone(&self.table)))),
        };

        PipelineOrchestrator {
            stages,
            metrics: self.metrics,
        }
    }
}
