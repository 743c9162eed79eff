use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    catalog::{CategoryTable, ZH_NEWS_TAB},
    classification::{Classifier, RuleSet},
    config::{Config, FeedsConfig},
    observability::{
        Telemetry,
        run_log::{RunEvent, RunLogger},
    },
    output::{self, RUN_LOG_FILE, RunSummary},
    pipeline::{
        PipelineOrchestrator, RunContext,
        normalize::decode_raw_feeds,
        summarize::{DescriptionSummarizer, summarize_selection},
    },
    util::time,
};

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub summary: RunSummary,
}

/// Runs one digest pass and writes its artifacts under the output directory.
///
/// A failed run still leaves `run_summary.json` (status `failed`),
/// `run_log.jsonl` and `metrics.prom` behind.
///
/// # Errors
/// Returns the first configuration, input or output error encountered.
pub async fn run(config: &Config, telemetry: &Telemetry) -> Result<RunOutcome> {
    let offset = time::report_offset(config.report_utc_offset_hours());
    let started = time::now().with_timezone(&offset);
    let run = RunContext::new(started.with_timezone(&Utc));
    let output_dir = config.output_dir();

    let logger = RunLogger::create(output_dir.join(RUN_LOG_FILE), offset)
        .with_context(|| format!("failed to prepare run log in {}", output_dir.display()))?;
    milestone(
        &logger,
        RunEvent::PipelineStart,
        json!({ "time": started.to_rfc3339(), "run_id": run.run_id }),
    );
    info!(run_id = %run.run_id, "starting digest run");

    let metrics = telemetry.metrics();
    let result = execute(config, telemetry, &logger, &run, started).await;
    let finished = time::now().with_timezone(&offset);
    metrics
        .run_duration
        .observe((finished - started).to_std().unwrap_or_default().as_secs_f64());

    let outcome = match result {
        Ok(summary) => {
            metrics.runs_completed.inc();
            let value = serde_json::to_value(&summary).unwrap_or(Value::Null);
            milestone(&logger, RunEvent::PipelineComplete, value);
            info!(
                run_id = %run.run_id,
                duration_seconds = summary.duration_seconds,
                "digest run completed"
            );
            Ok(RunOutcome {
                run_id: run.run_id,
                summary,
            })
        }
        Err(err) => {
            metrics.runs_failed.inc();
            error!(run_id = %run.run_id, error = ?err, "digest run failed");
            milestone(&logger, RunEvent::PipelineError, json!({ "error": format!("{err:#}") }));
            let summary = RunSummary::failed(run.run_id, started, finished, format!("{err:#}"));
            if let Err(write_err) = output::write_run_summary(output_dir, &summary).await {
                warn!(error = %write_err, "failed to write failure summary");
            }
            Err(err)
        }
    };

    let exposition = telemetry.render_prometheus();
    if let Err(write_err) = output::write_metrics(output_dir, &exposition).await {
        warn!(error = %write_err, "failed to write metrics exposition");
    }
    outcome
}

async fn execute(
    config: &Config,
    telemetry: &Telemetry,
    logger: &RunLogger,
    run: &RunContext,
    started: DateTime<FixedOffset>,
) -> Result<RunSummary> {
    let feeds =
        FeedsConfig::load(&config.feeds_path()).context("failed to load feeds configuration")?;
    let rules =
        RuleSet::load(&config.rules_path()).context("failed to load classification rules")?;
    let table = CategoryTable::standard();
    let valid = table
        .valid_categories(ZH_NEWS_TAB)
        .context("category table has no zh_news tab")?;
    let keyword_rules = rules.keyword_rules().len();
    let classifier = Classifier::new(rules, valid).context("failed to build classifier")?;
    milestone(
        logger,
        RunEvent::ConfigLoaded,
        json!({ "feeds_count": feeds.all_sources().len(), "keyword_rules": keyword_rules }),
    );

    let input = config.input().context("no raw feed input configured")?;
    let raw = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read raw feeds from {}", input.display()))?;
    let decoded = decode_raw_feeds(&raw)
        .with_context(|| format!("failed to parse raw feeds in {}", input.display()))?;
    if decoded.malformed > 0 {
        warn!(
            malformed = decoded.malformed,
            input = %input.display(),
            "skipped unreadable raw feed entries"
        );
    }

    let table = Arc::new(table);
    let pipeline =
        PipelineOrchestrator::builder(Arc::new(feeds), Arc::clone(&table), Arc::new(classifier))
            .with_metrics(telemetry.metrics())
            .build();
    let result = pipeline.execute(run, &decoded.feeds);
    let stats = &result.stats;

    milestone(
        logger,
        RunEvent::Normalized,
        json!({
            "count": stats.articles_normalized,
            "rejected": stats.articles_rejected,
            "malformed": decoded.malformed,
        }),
    );
    milestone(
        logger,
        RunEvent::Deduplicated,
        json!({ "before": stats.dedup.input, "after": stats.articles_deduplicated }),
    );
    milestone(
        logger,
        RunEvent::Classified,
        json!({ "count": stats.zh_classified, "fallbacks": stats.classification_fallbacks }),
    );
    milestone(
        logger,
        RunEvent::Selected,
        json!({ "total": stats.articles_selected, "by_tab": stats.selected_by_tab }),
    );

    let summarizer = DescriptionSummarizer::new(config.summary_max_chars());
    let (summarized, report) =
        summarize_selection(result.selection, &summarizer, &summarizer).await;
    #[allow(clippy::cast_precision_loss)]
    {
        let metrics = telemetry.metrics();
        metrics.summaries_generated.inc_by(report.generated as f64);
        metrics.summary_fallbacks.inc_by(report.fallbacks as f64);
    }
    milestone(logger, RunEvent::Summarized, json!({ "count": report.generated }));

    let articles_path = output::write_articles_data(config.output_dir(), &summarized).await?;
    milestone(
        logger,
        RunEvent::OutputWritten,
        json!({ "articles_data": articles_path.display().to_string() }),
    );

    let finished = time::now().with_timezone(&started.timezone());
    let summary = RunSummary::success(
        run.run_id,
        started,
        finished,
        &result.stats,
        report.generated,
        &table,
    );
    output::write_run_summary(config.output_dir(), &summary).await?;
    Ok(summary)
}

fn milestone(logger: &RunLogger, event: RunEvent, data: Value) {
    if let Err(err) = logger.log(event, Some(&data)) {
        warn!(
            event = ?event,
            error = %err,
            path = %logger.path().display(),
            "failed to append run log"
        );
    }
}
