//! 表示カテゴリ分類。
//!
//! zh の記事だけが RSS マッピング → キーワード → ソース既定 → デフォルト の
//! 順で判定される。他言語はフィード設定のカテゴリをそのまま返す。
use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::{
    catalog::ValidCategories,
    model::{CanonicalArticle, Language},
};

mod keywords;
pub mod rules;

use keywords::KeywordCascade;
pub use rules::{
    DEFAULT_CATEGORY, DEFAULT_RULE_PRIORITY, KeywordRule, KeywordRuleSpec, RuleLoadError, RuleSet,
    SourceDefault,
};

/// どの段で分類が決まったか。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum MatchedBy {
    /// zh 以外の記事。`rss_category` をそのまま使う。
    Passthrough,
    RssMapping,
    Keyword { keyword: String, priority: i64 },
    SourceDefault { pattern: String },
    Fallback,
}

/// 分類結果と根拠。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: String,
    pub matched_by: MatchedBy,
}

/// 規則ベースの分類器。構築後は不変。
#[derive(Debug)]
pub struct Classifier {
    valid: ValidCategories,
    rss_mapping: HashMap<String, String>,
    keywords: KeywordCascade,
    source_defaults: Vec<SourceDefault>,
    default_category: String,
}

impl Classifier {
    /// ルールセットと有効カテゴリ集合から分類器を組み立てる。
    ///
    /// デフォルトカテゴリが有効集合に含まれない場合は警告を出し、
    /// 有効集合の先頭カテゴリで置き換える。
    ///
    /// # Errors
    /// キーワードオートマトンの構築に失敗した場合は [`RuleLoadError::Matcher`] を返す。
    pub fn new(rules: RuleSet, valid: ValidCategories) -> Result<Self, RuleLoadError> {
        let keywords = KeywordCascade::compile(rules.keyword_rules())?;

        let configured = rules.default_category();
        let default_category = if valid.contains(configured) {
            configured.to_string()
        } else {
            let replacement = valid.first().unwrap_or(DEFAULT_CATEGORY).to_string();
            warn!(
                configured = %configured,
                replacement = %replacement,
                "default category is not a valid display category"
            );
            replacement
        };

        Ok(Self {
            valid,
            rss_mapping: rules.rss_mapping().clone(),
            keywords,
            source_defaults: rules.source_defaults().to_vec(),
            default_category,
        })
    }

    /// zh 記事の表示カテゴリ、または他言語の `rss_category` を返す。
    #[must_use]
    pub fn classify(&self, article: &CanonicalArticle) -> String {
        self.explain(article).category
    }

    /// [`Classifier::classify`] に加えて、どの段で決まったかを返す。
    #[must_use]
    pub fn explain(&self, article: &CanonicalArticle) -> Classification {
        if article.language != Language::Zh {
            return Classification {
                category: article.rss_category.clone(),
                matched_by: MatchedBy::Passthrough,
            };
        }

        if let Some(mapped) = self
            .rss_mapping
            .get(&article.rss_category)
            .filter(|mapped| self.valid.contains(mapped))
        {
            return Classification {
                category: mapped.clone(),
                matched_by: MatchedBy::RssMapping,
            };
        }

        let text = format!(
            "{} {}",
            article.title,
            article.description.as_deref().unwrap_or_default()
        )
        .to_lowercase();
        if let Some(hit) = self.keywords.first_match(&text, &self.valid) {
            return Classification {
                category: hit.category.to_string(),
                matched_by: MatchedBy::Keyword {
                    keyword: hit.keyword.to_string(),
                    priority: hit.priority,
                },
            };
        }

        if let Some(default) = self.source_defaults.iter().find(|default| {
            article.link.contains(default.pattern.as_str())
                && self.valid.contains(&default.category)
        }) {
            return Classification {
                category: default.category.clone(),
                matched_by: MatchedBy::SourceDefault {
                    pattern: default.pattern.clone(),
                },
            };
        }

        Classification {
            category: self.default_category.clone(),
            matched_by: MatchedBy::Fallback,
        }
    }

    #[must_use]
    pub fn valid_categories(&self) -> &ValidCategories {
        &self.valid
    }

    #[must_use]
    pub fn default_category(&self) -> &str {
        &self.default_category
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use rstest::rstest;

    fn zh_article(title: &str, link: &str, rss_category: &str) -> CanonicalArticle {
        CanonicalArticle {
            title: title.into(),
            link: link.into(),
            published_at: Utc::now(),
            source_name: "聯合新聞網".into(),
            language: Language::Zh,
            tab: "zh_news".into(),
            rss_category: rss_category.into(),
            guid: link.into(),
            description: None,
            final_category: None,
        }
    }

    fn rules() -> RuleSet {
        let mapping = [("財經", "產經"), ("科技", "Tech News")]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        RuleSet::new(
            mapping,
            vec![
                KeywordRule::new("運動", 2, &["nba", "棒球"]),
                KeywordRule::new("股市", 1, &["股市", "台股"]),
                KeywordRule::new("Startup", 0, &["新創"]),
            ],
            vec![
                SourceDefault::new("money.udn.com", "產經"),
                SourceDefault::new("udn.com", "社會"),
                SourceDefault::new("tech.example", "Tech News"),
            ],
            "頭條新聞",
        )
    }

    fn classifier() -> Classifier {
        Classifier::new(rules(), ValidCategories::zh()).expect("classifier builds")
    }

    #[test]
    fn keyword_beats_source_default() {
        let article = zh_article("股市大漲創新高", "https://money.udn.com/a/1", "");
        let result = classifier().explain(&article);
        assert_eq!(result.category, "股市");
        assert!(matches!(result.matched_by, MatchedBy::Keyword { priority: 1, .. }));
    }

    #[test]
    fn lower_priority_number_wins() {
        let article = zh_article("股市休市 nba 照常開打", "https://example.tw/a", "");
        assert_eq!(classifier().classify(&article), "股市");
    }

    #[test]
    fn description_participates_in_keyword_match() {
        let mut article = zh_article("今日焦點", "https://example.tw/a", "");
        article.description = Some("職棒開幕，棒球迷湧入球場".into());
        assert_eq!(classifier().classify(&article), "運動");
    }

    #[rstest]
    #[case("財經", "https://example.tw/a", "產經")]
    #[case("科技", "https://example.tw/a", "頭條新聞")]
    #[case("", "https://money.udn.com/story/1", "產經")]
    #[case("", "https://udn.com/news/1", "社會")]
    #[case("", "https://tech.example/post", "頭條新聞")]
    fn cascade_order(#[case] rss_category: &str, #[case] link: &str, #[case] expected: &str) {
        let article = zh_article("一般新聞", link, rss_category);
        assert_eq!(classifier().classify(&article), expected);
    }

    #[test]
    fn invalid_keyword_category_is_skipped() {
        let article = zh_article("新創募資", "https://example.tw/a", "");
        let result = classifier().explain(&article);
        assert_eq!(result.category, "頭條新聞");
        assert_eq!(result.matched_by, MatchedBy::Fallback);
    }

    #[test]
    fn non_zh_records_pass_through() {
        let mut article = zh_article("Stocks rally", "https://bbc.co.uk/a", "BBC Business");
        article.language = Language::En;
        let result = classifier().explain(&article);
        assert_eq!(result.category, "BBC Business");
        assert_eq!(result.matched_by, MatchedBy::Passthrough);
    }

    #[test]
    fn invalid_default_category_is_replaced() {
        let rules = RuleSet::new(HashMap::new(), Vec::new(), Vec::new(), "Misc");
        let classifier = Classifier::new(rules, ValidCategories::zh()).expect("classifier builds");
        assert_eq!(classifier.default_category(), "頭條新聞");
    }

    proptest! {
        #[test]
        fn zh_output_is_always_valid(title in "\\PC{0,40}", rss in "\\PC{0,6}", path in "[a-z./]{0,20}") {
            let classifier = classifier();
            let article = zh_article(&title, &format!("https://{path}"), &rss);
            let category = classifier.classify(&article);
            prop_assert!(ValidCategories::zh().contains(&category));
        }
    }
}
