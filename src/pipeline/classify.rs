use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::{
    classification::{Classifier, MatchedBy},
    model::{CanonicalArticle, Language},
};

use super::{RunContext, dedup::DeduplicatedCorpus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedCorpus {
    pub run_id: Uuid,
    pub articles: Vec<CanonicalArticle>,
    /// zh records that went through the rule cascade.
    pub classified: usize,
    /// zh records that ended on the default category.
    pub fallbacks: usize,
}

pub trait ClassifyStage: Send + Sync {
    fn classify(&self, run: &RunContext, corpus: DeduplicatedCorpus) -> ClassifiedCorpus;
}

/// Sets `final_category` on zh records. Other languages are left untouched.
#[derive(Debug, Clone)]
pub struct RuleClassifyStage {
    classifier: Arc<Classifier>,
}

impl RuleClassifyStage {
    #[must_use]
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self { classifier }
    }
}

impl ClassifyStage for RuleClassifyStage {
    fn classify(&self, run: &RunContext, corpus: DeduplicatedCorpus) -> ClassifiedCorpus {
        let mut classified = 0;
        let mut fallbacks = 0;
        let articles = corpus
            .articles
            .into_iter()
            .map(|mut article| {
                if article.language == Language::Zh {
                    let result = self.classifier.explain(&article);
                    classified += 1;
                    if result.matched_by == MatchedBy::Fallback {
                        fallbacks += 1;
                    }
                    debug!(
                        guid = %article.guid,
                        category = %result.category,
                        matched_by = ?result.matched_by,
                        "article classified"
                    );
                    article.final_category = Some(result.category);
                }
                article
            })
            .collect();

        ClassifiedCorpus {
            run_id: run.run_id,
            articles,
            classified,
            fallbacks,
        }
    }
}
