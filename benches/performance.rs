/// 1日分・数千件規模のフィードを想定した性能ベンチマーク。
use std::{collections::HashMap, hint::black_box, sync::Arc};

use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};
use news_digest::{
    catalog::{CategoryTable, ValidCategories},
    classification::{Classifier, KeywordRule, RuleSet, SourceDefault},
    config::{FeedSource, FeedsConfig, TabConfig},
    model::RawEntry,
    pipeline::{
        PipelineOrchestrator, RunContext, dedup::deduplicate,
        normalize::{Normalizer, RawFeeds},
    },
};

const TOPICS: [&str; 6] = ["股市", "颱風", "棒球", "房價", "美國", "半導體"];

fn synthetic_feeds(per_tab: usize) -> RawFeeds {
    let zh = (0..per_tab)
        .map(|idx| RawEntry {
            title: Some(format!("{}最新消息 第{}則", TOPICS[idx % TOPICS.len()], idx % (per_tab / 2))),
            link: Some(format!(
                "https://example.tw/news/{}?utm_source=rss",
                idx % (per_tab * 3 / 4)
            )),
            published: Some(format!("2024-12-24T{:02}:{:02}:00Z", idx % 24, idx % 60)),
            summary: Some(format!("<p>{}相關報導，第{idx}段內容。</p>", TOPICS[idx % 3])),
            source_feed_url: Some("https://example.tw/rss".to_string()),
            ..RawEntry::default()
        })
        .collect();
    let en = (0..per_tab)
        .map(|idx| RawEntry {
            title: Some(format!("Markets update number {}", idx % (per_tab / 2))),
            link: Some(format!("https://example.com/story/{idx}/")),
            published: Some(format!("Tue, 24 Dec 2024 {:02}:00:00 +0000", idx % 24)),
            category: Some(if idx % 2 == 0 { "BBC World" } else { "Tech" }.to_string()),
            source_name: Some("Example".to_string()),
            ..RawEntry::default()
        })
        .collect();
    RawFeeds::from([("zh_news".to_string(), zh), ("en_news".to_string(), en)])
}

fn feeds_config() -> FeedsConfig {
    FeedsConfig::new(
        [
            (
                "zh_news".to_string(),
                TabConfig::new(
                    "zh",
                    vec![FeedSource {
                        category: "即時".to_string(),
                        url: "https://example.tw/rss".to_string(),
                        source_name: Some("範例".to_string()),
                    }],
                ),
            ),
            ("en_news".to_string(), TabConfig::new("en", Vec::new())),
        ]
        .into_iter()
        .collect(),
    )
}

fn pipeline() -> PipelineOrchestrator {
    let rules = RuleSet::new(
        HashMap::new(),
        vec![
            KeywordRule::new("股市", 1, &["股市", "台股"]),
            KeywordRule::new("房市", 2, &["房價"]),
            KeywordRule::new("全球國際新聞", 3, &["美國", "日本"]),
            KeywordRule::new("運動", 4, &["棒球"]),
            KeywordRule::new("社會", 99, &["颱風"]),
        ],
        vec![SourceDefault::new("example.tw", "產經")],
        "頭條新聞",
    );
    let classifier = Classifier::new(rules, ValidCategories::zh()).expect("classifier");
    PipelineOrchestrator::builder(
        Arc::new(feeds_config()),
        Arc::new(CategoryTable::standard()),
        Arc::new(classifier),
    )
    .build()
}

fn bench_full_pipeline(c: &mut Criterion) {
    let feeds = synthetic_feeds(2_000);
    let orchestrator = pipeline();

    c.bench_function("pipeline_4k_entries", |b| {
        b.iter(|| {
            let run = orchestrator.execute(&RunContext::new(Utc::now()), black_box(&feeds));
            black_box(run.stats.articles_selected);
        });
    });
}

fn bench_dedup(c: &mut Criterion) {
    let feeds = synthetic_feeds(2_000);
    let run = RunContext::new(Utc::now());
    let articles = Normalizer::new(run.processed_at)
        .normalize_all(&run, &feeds, &feeds_config())
        .articles;

    c.bench_function("dedup_cascade_4k", |b| {
        b.iter(|| black_box(deduplicate(articles.clone()).len()));
    });
}

criterion_group!(benches, bench_full_pipeline, bench_dedup);
criterion_main!(benches);
