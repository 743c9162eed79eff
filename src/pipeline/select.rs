use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use serde::{Serialize, Serializer, ser::SerializeMap};
use tracing::{debug, warn};

use crate::{catalog::CategoryTable, model::CanonicalArticle};

use super::{RunContext, classify::ClassifiedCorpus};

/// One category's selected items, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBucket<T> {
    category: String,
    items: Vec<T>,
}

impl<T> CategoryBucket<T> {
    #[must_use]
    pub fn new(category: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            category: category.into(),
            items,
        }
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Non-empty buckets of one tab in category display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSelection<T> {
    tab: String,
    buckets: Vec<CategoryBucket<T>>,
}

impl<T> TabSelection<T> {
    #[must_use]
    pub fn new(tab: impl Into<String>, buckets: Vec<CategoryBucket<T>>) -> Self {
        Self {
            tab: tab.into(),
            buckets,
        }
    }

    #[must_use]
    pub fn tab(&self) -> &str {
        &self.tab
    }

    #[must_use]
    pub fn buckets(&self) -> &[CategoryBucket<T>] {
        &self.buckets
    }

    #[must_use]
    pub fn into_buckets(self) -> Vec<CategoryBucket<T>> {
        self.buckets
    }

    #[must_use]
    pub fn category(&self, category: &str) -> Option<&[T]> {
        self.buckets
            .iter()
            .find(|bucket| bucket.category == category)
            .map(CategoryBucket::items)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.items.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// `tab → category → items`, in category-table order.
///
/// Serializes as nested JSON objects that keep this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<T> {
    tabs: Vec<TabSelection<T>>,
}

impl<T> Selection<T> {
    #[must_use]
    pub fn new(tabs: Vec<TabSelection<T>>) -> Self {
        Self { tabs }
    }

    #[must_use]
    pub fn tabs(&self) -> &[TabSelection<T>] {
        &self.tabs
    }

    #[must_use]
    pub fn into_tabs(self) -> Vec<TabSelection<T>> {
        self.tabs
    }

    #[must_use]
    pub fn tab(&self, tab: &str) -> Option<&TabSelection<T>> {
        self.tabs.iter().find(|selection| selection.tab == tab)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.tabs.iter().map(TabSelection::len).sum()
    }

    /// Item counts per tab and category.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, BTreeMap<String, usize>> {
        self.tabs
            .iter()
            .map(|tab| {
                let per_category = tab
                    .buckets
                    .iter()
                    .map(|bucket| (bucket.category.clone(), bucket.items.len()))
                    .collect();
                (tab.tab.clone(), per_category)
            })
            .collect()
    }

    /// Applies `f` to every item, keeping the layout.
    #[must_use]
    pub fn map<U, F>(self, mut f: F) -> Selection<U>
    where
        F: FnMut(T) -> U,
    {
        let tabs = self
            .tabs
            .into_iter()
            .map(|tab| TabSelection {
                tab: tab.tab,
                buckets: tab
                    .buckets
                    .into_iter()
                    .map(|bucket| CategoryBucket {
                        category: bucket.category,
                        items: bucket.items.into_iter().map(&mut f).collect(),
                    })
                    .collect(),
            })
            .collect();
        Selection { tabs }
    }
}

impl<T: Serialize> Serialize for TabSelection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for bucket in &self.buckets {
            map.serialize_entry(&bucket.category, &bucket.items)?;
        }
        map.end()
    }
}

impl<T: Serialize> Serialize for Selection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tabs.len()))?;
        for tab in &self.tabs {
            map.serialize_entry(&tab.tab, tab)?;
        }
        map.end()
    }
}

pub trait SelectStage: Send + Sync {
    fn select(&self, run: &RunContext, corpus: ClassifiedCorpus) -> Selection<CanonicalArticle>;
}

/// Partitions records by tab and display category, newest first, bounded
/// by each category's capacity.
///
/// Every tab in `table` is present in the result. Records of tabs missing from
/// `table`, or whose display category is not listed for their tab, are dropped.
#[must_use]
pub fn select_by_category(
    articles: Vec<CanonicalArticle>,
    table: &CategoryTable,
) -> Selection<CanonicalArticle> {
    let mut by_tab: HashMap<String, HashMap<String, Vec<CanonicalArticle>>> = HashMap::new();
    let mut unknown_tabs = BTreeSet::new();

    for article in articles {
        let Some(definition) = table.tab(&article.tab) else {
            unknown_tabs.insert(article.tab);
            continue;
        };
        let category = definition.display_category(&article);
        if !definition.contains(&category) {
            debug!(
                guid = %article.guid,
                tab = %article.tab,
                category = %category,
                "display category not listed for tab, dropping"
            );
            continue;
        }
        by_tab
            .entry(article.tab.clone())
            .or_default()
            .entry(category)
            .or_default()
            .push(article);
    }

    for tab in unknown_tabs {
        warn!(tab = %tab, "no category definition for tab, skipping its records");
    }

    let tabs = table
        .tabs()
        .map(|definition| {
            let mut buckets_by_category = by_tab.remove(definition.tab()).unwrap_or_default();
            let buckets = definition
                .categories()
                .iter()
                .filter_map(|category| {
                    let mut items = buckets_by_category.remove(category)?;
                    items.sort_by(|left, right| right.published_at.cmp(&left.published_at));
                    items.truncate(definition.capacity_for(category));
                    (!items.is_empty()).then(|| CategoryBucket::new(category.clone(), items))
                })
                .collect();
            TabSelection::new(definition.tab(), buckets)
        })
        .collect();

    Selection::new(tabs)
}

/// Per tab, a single list following category display order.
#[must_use]
pub fn flatten_selection<T: Clone>(selection: &Selection<T>) -> Vec<(String, Vec<T>)> {
    selection
        .tabs()
        .iter()
        .map(|tab| {
            let items = tab
                .buckets()
                .iter()
                .flat_map(|bucket| bucket.items().iter().cloned())
                .collect();
            (tab.tab().to_string(), items)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CategorySelectStage {
    table: Arc<CategoryTable>,
}

impl CategorySelectStage {
    #[must_use]
    pub fn new(table: Arc<CategoryTable>) -> Self {
        Self { table }
    }
}

impl SelectStage for CategorySelectStage {
    fn select(&self, run: &RunContext, corpus: ClassifiedCorpus) -> Selection<CanonicalArticle> {
        let selection = select_by_category(corpus.articles, &self.table);
        debug!(run_id = %run.run_id, selected = selection.total(), "selection finished");
        selection
    }
}
