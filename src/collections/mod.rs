//! Collection derivation
//!
//! Turns the flat list of loaded content items into the views the templates
//! iterate: the published posts (newest first), the category identifiers in use,
//! and the posts of each category. Everything here is a pure function of the
//! input slice and is recomputed on every build.
//!
//! The synthetic [`ALL_CATEGORY`] identifier is always placed first, both in
//! [`unique_categories`] and as the first key of [`posts_by_category`].

use chrono::{DateTime, FixedOffset, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::SiteConfig;
use crate::content::frontmatter::parse_date_string;
use crate::content::ContentItem;

/// Identifier of the bucket that holds every published post
pub const ALL_CATEGORY: &str = "all";

/// Category id -> posts of that category, newest first
pub type CategoryIndex<'a> = IndexMap<String, Vec<&'a ContentItem>>;

/// Errors raised when an item list violates the loader contract
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("expected a sequence of content items, found {found}")]
    NotASequence { found: &'static str },

    #[error("content item at index {index} is not an object (found {found})")]
    NotAnObject { index: usize, found: &'static str },
}

/// All published posts, newest first
///
/// Drafts are dropped. The sort is stable, so posts sharing a date keep their
/// input order.
pub fn all_posts(items: &[ContentItem]) -> Vec<&ContentItem> {
    let mut posts: Vec<&ContentItem> = items.iter().filter(|item| item.is_published()).collect();
    posts.sort_by(|a, b| b.date.cmp(&a.date));
    posts
}

/// Distinct categories of published posts, preceded by `"all"`
///
/// Categories appear in order of first encounter in the input.
pub fn unique_categories(items: &[ContentItem]) -> IndexSet<String> {
    let mut categories = IndexSet::new();
    categories.insert(ALL_CATEGORY.to_string());
    for item in items.iter().filter(|item| item.is_published()) {
        categories.insert(item.category.clone());
    }
    categories
}

/// Published posts grouped by category, in [`unique_categories`] order
///
/// `"all"` maps to the full [`all_posts`] list; every other bucket is the
/// subsequence of that list with a matching category.
pub fn posts_by_category(items: &[ContentItem]) -> CategoryIndex<'_> {
    let posts = all_posts(items);
    index_posts(&unique_categories(items), &posts)
}

fn index_posts<'a>(
    categories: &IndexSet<String>,
    posts: &[&'a ContentItem],
) -> CategoryIndex<'a> {
    let mut index: CategoryIndex<'a> = categories
        .iter()
        .map(|category| (category.clone(), Vec::new()))
        .collect();

    for &post in posts {
        if post.category != ALL_CATEGORY {
            if let Some(bucket) = index.get_mut(&post.category) {
                bucket.push(post);
            }
        }
    }

    index.insert(ALL_CATEGORY.to_string(), posts.to_vec());
    index
}

/// The three derived views, computed together for one build
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collections<'a> {
    pub posts: Vec<&'a ContentItem>,
    pub categories: IndexSet<String>,
    pub posts_by_category: CategoryIndex<'a>,
}

impl<'a> Collections<'a> {
    /// Derive every view from the loaded items
    pub fn derive(items: &'a [ContentItem]) -> Self {
        let posts = all_posts(items);
        let categories = unique_categories(items);
        let posts_by_category = index_posts(&categories, &posts);

        tracing::debug!(
            "Derived {} posts in {} categories from {} items",
            posts.len(),
            categories.len().saturating_sub(1),
            items.len()
        );

        Self {
            posts,
            categories,
            posts_by_category,
        }
    }

    /// Posts of one category (empty if the category is unknown)
    pub fn category_posts(&self, category: &str) -> &[&'a ContentItem] {
        self.posts_by_category
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Date of the newest published post
    pub fn latest_date(&self) -> Option<DateTime<FixedOffset>> {
        self.posts.first().map(|post| post.date)
    }
}

/// Build items from an exported JSON item list
///
/// A value that is not an array, or an element that is not an object, breaks
/// the loader contract and fails the whole call. Missing or mistyped fields
/// fall back to defaults: empty title, `default_category`, not a draft, and the
/// Unix epoch for dates that are absent or unparseable.
pub fn items_from_json(
    value: &Value,
    config: &SiteConfig,
) -> Result<Vec<ContentItem>, CollectionError> {
    let entries = value.as_array().ok_or(CollectionError::NotASequence {
        found: json_kind(value),
    })?;

    // Validated by `Site::new`; fall back to local time for hand-built configs
    let zone = config.zone().unwrap_or(crate::config::SiteZone::Local);

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let fields = entry.as_object().ok_or(CollectionError::NotAnObject {
                index,
                found: json_kind(entry),
            })?;

            let text = |key: &str| fields.get(key).and_then(json_scalar_string);

            let title = text("title").unwrap_or_default();
            let category = text("category").unwrap_or_else(|| config.default_category.clone());
            let date = text("date")
                .and_then(|d| parse_date_string(&d, &zone))
                .unwrap_or_else(|| {
                    tracing::warn!("Item {} ({:?}) has no usable date", index, title);
                    DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
                });
            let draft = match fields.get("draft") {
                Some(Value::Bool(b)) => *b,
                Some(Value::String(s)) => matches!(s.as_str(), "true" | "yes"),
                _ => false,
            };

            let mut item = ContentItem::new(title, date, category, draft)
                .with_body(text("body").unwrap_or_default());
            item.description = text("description");
            if let Some(source) = text("source") {
                item.source = source;
            }
            if let Some(slug) = text("slug") {
                item.slug = slug;
            }
            item.path = text("path").unwrap_or_default();
            item.permalink = text("permalink").unwrap_or_default();
            Ok(item)
        })
        .collect()
}

fn json_scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
