// src/model.rs
//! Core value types shared by the parser, classifier, fetcher and the delivery adapter.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Topical category. `All` is a filter wildcard and is never assigned to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Local,
    Politics,
    Technology,
    Business,
    Health,
    World,
    Sports,
    All,
}

impl Category {
    /// Categories the classifier may assign, in rule-table order.
    pub const ASSIGNABLE: [Category; 7] = [
        Category::Local,
        Category::Politics,
        Category::Technology,
        Category::Business,
        Category::Health,
        Category::World,
        Category::Sports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Local => "Local",
            Category::Politics => "Politics",
            Category::Technology => "Technology",
            Category::Business => "Business",
            Category::Health => "Health",
            Category::World => "World",
            Category::Sports => "Sports",
            Category::All => "All",
        }
    }

    /// True when an item tagged with `categories` passes this filter.
    pub fn admits(&self, categories: &[Category]) -> bool {
        *self == Category::All || categories.contains(self)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ASSIGNABLE
            .iter()
            .chain(std::iter::once(&Category::All))
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| format!("unknown category `{wanted}`"))
    }
}

/// Cosmetic "newspaper volume/issue" label derived from the publish date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeLabel {
    /// `YYYY-MM`
    pub year_month: String,
    /// 1-based week within the month (days 1-7 → 1, 8-14 → 2, ...).
    pub week_of_month: u32,
}

impl VolumeLabel {
    pub fn from_date(ts: DateTime<Utc>) -> Self {
        Self {
            year_month: format!("{:04}-{:02}", ts.year(), ts.month()),
            week_of_month: (ts.day() - 1) / 7 + 1,
        }
    }
}

/// One normalized, classified article. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub link: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
    /// Markup-free, truncated rendition of `content`.
    #[serde(default)]
    pub preview: String,
    pub source_host: String,
    pub guid: String,
    /// Ranked by relevance, most relevant first.
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_label: Option<VolumeLabel>,
}

/// Merged result of the atomic aggregation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedNews {
    pub items: Vec<NewsItem>,
    pub sources_count: usize,
    pub total_items: usize,
}

impl AggregatedNews {
    pub fn new(items: Vec<NewsItem>, sources_count: usize) -> Self {
        let total_items = items.len();
        Self {
            items,
            sources_count,
            total_items,
        }
    }

    /// Copy restricted to `category`; `All` keeps everything.
    pub fn filtered(&self, category: Category) -> Self {
        let items = self
            .items
            .iter()
            .filter(|it| category.admits(&it.categories))
            .cloned()
            .collect::<Vec<_>>();
        Self::new(items, self.sources_count)
    }
}

/// Sort newest first. Stable, so equal timestamps keep their incoming order.
pub fn sort_newest_first(items: &mut [NewsItem]) {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}
