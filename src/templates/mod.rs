//! Built-in site templates using the Tera template engine
//!
//! The templates are embedded in the binary. Filters and shortcodes come from
//! the typed [`Registry`], installed when the renderer is built.

use anyhow::{Context as _, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::registry::Registry;

/// Template renderer with the embedded site templates
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a renderer with the built-in filters and shortcodes
    pub fn new(config: Arc<SiteConfig>) -> Result<Self> {
        let registry = Registry::with_defaults()?;
        Self::with_registry(config, &registry)
    }

    /// Create a renderer with a caller-supplied registry
    pub fn with_registry(config: Arc<SiteConfig>, registry: &Registry) -> Result<Self> {
        let mut tera = Tera::default();

        // Output is HTML built from trusted content; templates escape explicitly
        tera.autoescape_on(vec![]);
        registry.install(&mut tera, config);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("site/layout.html")),
            ("index.html", include_str!("site/index.html")),
            ("post.html", include_str!("site/post.html")),
            ("category.html", include_str!("site/category.html")),
            ("partials/head.html", include_str!("site/partials/head.html")),
            ("partials/nav.html", include_str!("site/partials/nav.html")),
            (
                "partials/footer.html",
                include_str!("site/partials/footer.html"),
            ),
            ("partials/pager.html", include_str!("site/partials/pager.html")),
            (
                "partials/post_list.html",
                include_str!("site/partials/post_list.html"),
            ),
        ])?;

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        self.tera
            .render(template_name, context)
            .with_context(|| format!("Failed to render {}", template_name))
    }

    /// Render a one-off template, such as a post body containing shortcodes
    pub fn render_str(&mut self, input: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render_str(input, context)?)
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub url: String,
    pub root: String,
    pub feed_path: String,
    /// Categories that have a listing page, `all` first
    pub categories: Vec<CategoryData>,
    pub social: IndexMap<String, String>,
    /// ISO 8601 date of the newest post
    pub latest_date: Option<String>,
    pub year: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub title: String,
    /// Date in the configured `date_format`
    pub date: String,
    pub date_iso: String,
    pub category: String,
    pub category_path: Option<String>,
    pub path: String,
    pub permalink: String,
    pub description: Option<String>,
    pub excerpt: Option<String>,
    pub content: String,
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryData {
    pub id: String,
    pub slug: String,
    pub path: String,
    pub description: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationData {
    pub per_page: usize,
    pub total: usize,
    pub current: usize,
    pub current_url: String,
    pub prev_link: Option<String>,
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub path: String,
}
