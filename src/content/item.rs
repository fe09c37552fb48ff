//! Content item model

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single piece of authored content (a blog post or a draft)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Post title
    pub title: String,

    /// Publication date
    pub date: DateTime<FixedOffset>,

    /// Category identifier (open set, may be empty)
    pub category: String,

    /// Drafts are excluded from every published listing
    pub draft: bool,

    /// Raw markdown body (front matter removed)
    pub body: String,

    /// Short summary from front matter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Source file path (relative to the source dir)
    #[serde(default)]
    pub source: String,

    /// Slug (URL-friendly name)
    #[serde(default)]
    pub slug: String,

    /// URL path (with root)
    #[serde(default)]
    pub path: String,

    /// Full permalink URL
    #[serde(default)]
    pub permalink: String,

    /// Custom front-matter fields
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ContentItem {
    /// Create an item with the core fields; loader metadata starts empty
    pub fn new(
        title: impl Into<String>,
        date: DateTime<FixedOffset>,
        category: impl Into<String>,
        draft: bool,
    ) -> Self {
        let title = title.into();
        let slug = slug::slugify(&title);
        Self {
            title,
            date,
            category: category.into(),
            draft,
            body: String::new(),
            description: None,
            source: String::new(),
            slug,
            path: String::new(),
            permalink: String::new(),
            extra: HashMap::new(),
        }
    }

    /// Set the markdown body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether the item belongs in published listings
    pub fn is_published(&self) -> bool {
        !self.draft
    }
}
