//! Fixed display-category catalog: per-tab category lists, capacities and
//! display-category resolution.
use std::collections::{HashMap, HashSet};

use crate::model::CanonicalArticle;

/// Capacity applied to categories without an explicit entry.
pub const DEFAULT_CAPACITY: usize = 8;

pub const ZH_NEWS_TAB: &str = "zh_news";
pub const EN_NEWS_TAB: &str = "en_news";
pub const JA_NEWS_TAB: &str = "ja_news";

/// The closed set of zh display categories.
pub const ZH_CATEGORIES: [&str; 9] = [
    "頭條新聞",
    "產經",
    "股市",
    "全球國際新聞",
    "社會",
    "生活",
    "娛樂",
    "運動",
    "房市",
];

const EN_CATEGORIES: [&str; 9] = [
    "Startup",
    "Tech News",
    "BBC Top Stories",
    "BBC World",
    "BBC Business",
    "BBC Education",
    "BBC Technology",
    "BBC Health",
    "BBC Science & Environment",
];

const JA_CATEGORIES: [&str; 7] = ["頭條", "國際", "政治", "運動", "商業", "文化", "娛樂"];

fn labels(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

/// Per-category selection capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capacity {
    /// One capacity for every category of the tab.
    Uniform(usize),
    /// Capacity looked up by category name, `DEFAULT_CAPACITY` when absent.
    PerCategory(HashMap<String, usize>),
}

impl Capacity {
    #[must_use]
    pub fn for_category(&self, category: &str) -> usize {
        match self {
            Self::Uniform(capacity) => *capacity,
            Self::PerCategory(capacities) => capacities
                .get(category)
                .copied()
                .unwrap_or(DEFAULT_CAPACITY),
        }
    }
}

/// Where a tab's display category comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySource {
    /// The classifier's `final_category`.
    Classified,
    /// The feed-declared `rss_category`, with legacy labels rewritten through `aliases`.
    Declared { aliases: HashMap<String, String> },
}

/// Category definition for one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabCategories {
    tab: String,
    categories: Vec<String>,
    capacity: Capacity,
    fallback: String,
    source: CategorySource,
}

impl TabCategories {
    #[must_use]
    pub fn new(
        tab: impl Into<String>,
        categories: Vec<String>,
        capacity: Capacity,
        fallback: impl Into<String>,
        source: CategorySource,
    ) -> Self {
        Self {
            tab: tab.into(),
            categories,
            capacity,
            fallback: fallback.into(),
            source,
        }
    }

    #[must_use]
    pub fn tab(&self) -> &str {
        &self.tab
    }

    /// Categories in display order.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    #[must_use]
    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|candidate| candidate == category)
    }

    #[must_use]
    pub fn capacity_for(&self, category: &str) -> usize {
        self.capacity.for_category(category)
    }

    #[must_use]
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Resolves the category an article is displayed under in this tab.
    ///
    /// The result may still fall outside `categories()` when the configured
    /// fallback or an alias target is not listed; callers drop such records.
    #[must_use]
    pub fn display_category(&self, article: &CanonicalArticle) -> String {
        match &self.source {
            CategorySource::Classified => article
                .final_category
                .as_deref()
                .filter(|category| self.contains(category))
                .unwrap_or(&self.fallback)
                .to_string(),
            CategorySource::Declared { aliases } => {
                let declared = article.rss_category.as_str();
                if self.contains(declared) {
                    declared.to_string()
                } else {
                    aliases
                        .get(declared)
                        .cloned()
                        .unwrap_or_else(|| self.fallback.clone())
                }
            }
        }
    }
}

/// Set of labels a classifier may emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCategories {
    labels: HashSet<String>,
    ordered: Vec<String>,
}

impl ValidCategories {
    #[must_use]
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut set = HashSet::new();
        for label in labels {
            let label = label.into();
            if set.insert(label.clone()) {
                ordered.push(label);
            }
        }
        Self {
            labels: set,
            ordered,
        }
    }

    /// The nine zh display categories.
    #[must_use]
    pub fn zh() -> Self {
        Self::new(ZH_CATEGORIES)
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.ordered.first().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Ordered per-tab category definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    tabs: Vec<TabCategories>,
}

impl CategoryTable {
    #[must_use]
    pub fn new(tabs: Vec<TabCategories>) -> Self {
        Self { tabs }
    }

    /// zh_news, en_news and ja_news as shown in the daily digest.
    #[must_use]
    pub fn standard() -> Self {
        let zh = TabCategories::new(
            ZH_NEWS_TAB,
            labels(&ZH_CATEGORIES),
            Capacity::Uniform(DEFAULT_CAPACITY),
            "頭條新聞",
            CategorySource::Classified,
        );

        let en_capacities = EN_CATEGORIES
            .iter()
            .map(|category| {
                let capacity = if category.starts_with("BBC") { 6 } else { 8 };
                ((*category).to_string(), capacity)
            })
            .collect();
        let en_aliases = [
            ("Tech", "Tech News"),
            ("Tech Media", "Tech News"),
            ("BBC", "BBC Top Stories"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
        let en = TabCategories::new(
            EN_NEWS_TAB,
            labels(&EN_CATEGORIES),
            Capacity::PerCategory(en_capacities),
            "Tech News",
            CategorySource::Declared {
                aliases: en_aliases,
            },
        );

        let ja = TabCategories::new(
            JA_NEWS_TAB,
            labels(&JA_CATEGORIES),
            Capacity::Uniform(DEFAULT_CAPACITY),
            "頭條",
            CategorySource::Declared {
                aliases: HashMap::new(),
            },
        );

        Self::new(vec![zh, en, ja])
    }

    #[must_use]
    pub fn tab(&self, tab: &str) -> Option<&TabCategories> {
        self.tabs.iter().find(|definition| definition.tab == tab)
    }

    pub fn tabs(&self) -> impl Iterator<Item = &TabCategories> {
        self.tabs.iter()
    }

    /// Category labels of a tab as a classifier-ready set.
    #[must_use]
    pub fn valid_categories(&self, tab: &str) -> Option<ValidCategories> {
        self.tab(tab)
            .map(|definition| ValidCategories::new(definition.categories.iter().cloned()))
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::standard()
    }
}
