//! Generator module - renders the derived collections to static HTML

use anyhow::{bail, Context as _, Result};
use chrono::Datelike;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Arc;
use tera::Context;

use crate::collections::{Collections, ALL_CATEGORY};
use crate::config::SiteConfig;
use crate::content::{ContentItem, MarkdownRenderer};
use crate::helpers::{
    absolutize_links, date_xml, escape_xml, format_date, full_url_for, strip_invalid_xml_chars,
    url_for,
};
use crate::templates::{
    CategoryData, NavPost, PaginationData, PostData, SiteData, TemplateRenderer,
};
use crate::Site;

/// Summary of one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Published posts rendered
    pub posts: usize,
    /// Items left out as drafts
    pub drafts: usize,
    /// Category identifiers, including `all`
    pub categories: usize,
    /// Files written to the public directory
    pub files: usize,
}

/// Static site generator using Tera templates
pub struct Generator {
    site: Site,
    config: Arc<SiteConfig>,
    renderer: TemplateRenderer,
    markdown: MarkdownRenderer,
    /// Category id -> unique URL slug for the current build
    category_slugs: HashMap<String, String>,
    written: HashSet<String>,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &Site) -> Result<Self> {
        let config = Arc::new(site.config.clone());
        let renderer = TemplateRenderer::new(Arc::clone(&config))?;
        let markdown = MarkdownRenderer::from_config(&config);

        Ok(Self {
            site: site.clone(),
            config,
            renderer,
            markdown,
            category_slugs: HashMap::new(),
            written: HashSet::new(),
        })
    }

    /// Generate the entire site from the loaded items
    pub fn generate(&mut self, items: &[ContentItem]) -> Result<BuildReport> {
        fs::create_dir_all(&self.site.public_dir)
            .with_context(|| format!("Failed to create {:?}", self.site.public_dir))?;
        self.written.clear();

        let collections = Collections::derive(items);
        self.category_slugs = unique_slugs(&collections.categories);
        self.check_output_paths(&collections)?;

        let mut posts = Vec::with_capacity(collections.posts.len());
        for item in &collections.posts {
            posts.push(self.post_data(item)?);
        }
        // Category listings hold references into `collections.posts`; map them back to rendered data
        let positions: HashMap<*const ContentItem, usize> = collections
            .posts
            .iter()
            .enumerate()
            .map(|(i, item)| (*item as *const ContentItem, i))
            .collect();

        let site_data = self.site_data(&collections);

        self.generate_index(&posts, &site_data)?;
        self.generate_post_pages(&posts, &site_data)?;
        self.generate_category_pages(&collections, &posts, &positions, &site_data)?;
        self.generate_atom_feed(&collections, &posts)?;

        let report = BuildReport {
            posts: posts.len(),
            drafts: items.len() - collections.posts.len(),
            categories: collections.categories.len(),
            files: self.written.len(),
        };
        tracing::info!(
            "Generated {} files: {} posts in {} categories ({} drafts skipped)",
            report.files,
            report.posts,
            report.categories.saturating_sub(1),
            report.drafts
        );

        Ok(report)
    }

    /// Render one post: shortcodes first, then markdown
    fn post_data(&mut self, item: &ContentItem) -> Result<PostData> {
        let body = if self.config.markdown_template_engine {
            self.expand_shortcodes(item)
        } else {
            item.body.clone()
        };

        let (excerpt_md, full_md) = MarkdownRenderer::split_excerpt(&body);
        let content = self
            .markdown
            .render(&full_md)
            .with_context(|| format!("Failed to render {:?}", item.source))?;
        let excerpt = excerpt_md
            .map(|md| self.markdown.render(&md))
            .transpose()?;

        Ok(PostData {
            title: item.title.clone(),
            date: format_date(&item.date, &self.config.date_format),
            date_iso: date_xml(&item.date),
            category: item.category.clone(),
            category_path: self.category_path(&item.category),
            path: item.path.clone(),
            permalink: item.permalink.clone(),
            description: item.description.clone(),
            excerpt,
            content,
            extra: item.extra.clone(),
        })
    }

    /// Expand shortcodes in the body, keeping the raw body if the template fails
    fn expand_shortcodes(&mut self, item: &ContentItem) -> String {
        let mut context = Context::new();
        context.insert("title", &item.title);
        context.insert("category", &item.category);
        context.insert("extra", &item.extra);

        match self.renderer.render_str(&item.body, &context) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    "Failed to expand shortcodes in {:?}: {:#}",
                    if item.source.is_empty() { &item.title } else { &item.source },
                    e
                );
                item.body.clone()
            }
        }
    }

    /// URL path of a category listing, or None if the category gets no page
    fn category_path(&self, category: &str) -> Option<String> {
        let dir = self.config.category_dir.trim_matches('/');
        if category == ALL_CATEGORY {
            return Some(url_for(&self.config, &format!("{}/", dir)));
        }
        let slug = self.category_slugs.get(category)?;
        Some(url_for(&self.config, &format!("{}/{}/", dir, slug)))
    }

    /// Number of listing pages for `len` posts
    fn page_count(&self, len: usize) -> (usize, usize) {
        let per_page = match self.config.per_page {
            0 => len.max(1),
            n => n,
        };
        (per_page, len.div_ceil(per_page).max(1))
    }

    /// Fail before writing anything if two pages would land on the same file
    fn check_output_paths(&self, collections: &Collections<'_>) -> Result<()> {
        let mut planned: HashMap<String, String> = HashMap::new();
        let mut claim = |url_path: &str, owner: String| -> Result<()> {
            let relative = self.relative_output(url_path);
            if let Some(previous) = planned.get(&relative) {
                bail!(
                    "{} and {} are both generated at {:?}; change the permalink or category_dir",
                    previous,
                    owner,
                    url_path
                );
            }
            planned.insert(relative, owner);
            Ok(())
        };

        claim(&url_for(&self.config, "/"), "the home page".to_string())?;
        claim(&url_for(&self.config, "atom.xml"), "the Atom feed".to_string())?;
        for post in &collections.posts {
            if !post.path.is_empty() {
                claim(&post.path, format!("post {:?}", post.source))?;
            }
        }
        for (category, category_posts) in &collections.posts_by_category {
            let Some(base) = self.category_path(category) else {
                continue;
            };
            let (_, total) = self.page_count(category_posts.len());
            for n in 1..=total {
                claim(&page_url(&base, n), format!("category listing {:?}", category))?;
            }
        }

        Ok(())
    }

    fn site_data(&self, collections: &Collections<'_>) -> SiteData {
        let categories = collections
            .posts_by_category
            .iter()
            .filter_map(|(id, posts)| {
                let path = self.category_path(id)?;
                Some(CategoryData {
                    id: id.clone(),
                    slug: self.category_slugs.get(id).cloned().unwrap_or_default(),
                    path,
                    description: self.config.category_description(id).map(str::to_string),
                    count: posts.len(),
                })
            })
            .collect();

        let now = self.config.zone().map(|z| z.now()).ok();
        SiteData {
            title: self.config.title.clone(),
            subtitle: self.config.subtitle.clone(),
            description: self.config.description.clone(),
            author: self.config.author.clone(),
            language: self.config.language.clone(),
            url: self.config.url.clone(),
            root: url_for(&self.config, "/"),
            feed_path: url_for(&self.config, "atom.xml"),
            categories,
            social: self.config.social.clone(),
            latest_date: collections.latest_date().map(|d| date_xml(&d)),
            year: now
                .map(|n| n.year().to_string())
                .unwrap_or_default(),
        }
    }

    /// Create a base context with common variables
    fn base_context(&self, site_data: &SiteData, current_path: &str) -> Context {
        let mut context = Context::new();
        context.insert("site", site_data);
        context.insert("page_title", "");
        context.insert("page_description", &self.config.description);
        context.insert("current_path", current_path);
        context
    }

    /// Generate the home page with the newest posts
    fn generate_index(&mut self, posts: &[PostData], site_data: &SiteData) -> Result<()> {
        let home_posts = &posts[..posts.len().min(self.config.home_posts)];

        let current_path = url_for(&self.config, "/");
        let mut context = self.base_context(site_data, &current_path);
        context.insert("posts", home_posts);
        context.insert("more_posts", &(posts.len() > home_posts.len()));
        context.insert("all_path", &self.category_path(ALL_CATEGORY));

        let html = self.renderer.render("index.html", &context)?;
        self.write_page(&current_path, &html)
    }

    /// Generate individual post pages
    fn generate_post_pages(&mut self, posts: &[PostData], site_data: &SiteData) -> Result<()> {
        for (i, post) in posts.iter().enumerate() {
            if post.path.is_empty() {
                tracing::warn!("Post {:?} has no path, skipping its page", post.title);
                continue;
            }

            // Posts are newest first: the previous post is the older one
            let prev_post = posts.get(i + 1).map(nav_post);
            let next_post = i.checked_sub(1).and_then(|j| posts.get(j)).map(nav_post);

            let mut context = self.base_context(site_data, &post.path);
            context.insert("page_title", &post.title);
            if let Some(description) = post.description.as_ref().or(post.excerpt.as_ref()) {
                context.insert("page_description", description);
            }
            context.insert("post", post);
            context.insert("prev_post", &prev_post);
            context.insert("next_post", &next_post);

            let html = self.renderer.render("post.html", &context)?;
            self.write_page(&post.path, &html)?;
        }

        Ok(())
    }

    /// Generate paginated listings for every category, `all` included
    fn generate_category_pages(
        &mut self,
        collections: &Collections<'_>,
        posts: &[PostData],
        positions: &HashMap<*const ContentItem, usize>,
        site_data: &SiteData,
    ) -> Result<()> {
        let mut generated = 0;

        for category in &site_data.categories {
            let category_posts: Vec<&PostData> = collections
                .category_posts(&category.id)
                .iter()
                .filter_map(|item| positions.get(&(*item as *const ContentItem)))
                .map(|&i| &posts[i])
                .collect();

            let (per_page, total) = self.page_count(category_posts.len());

            for current in 1..=total {
                let start = (current - 1) * per_page;
                let end = (start + per_page).min(category_posts.len());
                let page_posts = &category_posts[start..end];

                let pagination = PaginationData {
                    per_page,
                    total,
                    current,
                    current_url: page_url(&category.path, current),
                    prev_link: (current > 1).then(|| page_url(&category.path, current - 1)),
                    next_link: (current < total).then(|| page_url(&category.path, current + 1)),
                };

                let mut context = self.base_context(site_data, &pagination.current_url);
                context.insert("page_title", &category.id);
                if let Some(description) = &category.description {
                    context.insert("page_description", description);
                }
                context.insert("category", category);
                context.insert("posts", page_posts);
                context.insert("pagination", &pagination);

                let html = self.renderer.render("category.html", &context)?;
                self.write_page(&pagination.current_url, &html)?;
            }
            generated += 1;
        }

        let skipped = collections.categories.len() - generated;
        if skipped > 0 {
            tracing::debug!("{} categories have no URL-safe name and no listing page", skipped);
        }
        tracing::info!("Generated {} category listings", generated);

        Ok(())
    }

    /// Generate the Atom feed
    fn generate_atom_feed(&mut self, collections: &Collections<'_>, posts: &[PostData]) -> Result<()> {
        let config = Arc::clone(&self.config);
        let site_url = full_url_for(&config, "/");
        let updated = collections
            .latest_date()
            .map(|d| date_xml(&d))
            .unwrap_or_else(|| date_xml(&chrono::Utc::now()));

        let mut feed = String::new();
        feed.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        feed.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
        feed.push_str(&format!("  <title>{}</title>\n", escape_xml(&config.title)));
        if !config.subtitle.is_empty() {
            feed.push_str(&format!(
                "  <subtitle>{}</subtitle>\n",
                escape_xml(&config.subtitle)
            ));
        }
        feed.push_str(&format!(
            "  <link href=\"{}\" rel=\"self\"/>\n",
            full_url_for(&config, "atom.xml")
        ));
        feed.push_str(&format!("  <link href=\"{}\"/>\n", site_url));
        feed.push_str(&format!("  <updated>{}</updated>\n", updated));
        feed.push_str(&format!("  <id>{}</id>\n", site_url));
        feed.push_str(&format!(
            "  <author><name>{}</name></author>\n",
            escape_xml(&config.author)
        ));

        for post in posts.iter().take(config.feed_limit) {
            let link = if post.permalink.is_empty() {
                full_url_for(&config, &post.path)
            } else {
                post.permalink.clone()
            };
            let content = post.excerpt.as_ref().unwrap_or(&post.content);
            let content = strip_invalid_xml_chars(&absolutize_links(content, &config.url));

            feed.push_str("  <entry>\n");
            feed.push_str(&format!("    <title>{}</title>\n", escape_xml(&post.title)));
            feed.push_str(&format!("    <link href=\"{}\"/>\n", escape_xml(&link)));
            feed.push_str(&format!("    <id>{}</id>\n", escape_xml(&link)));
            feed.push_str(&format!("    <published>{}</published>\n", post.date_iso));
            feed.push_str(&format!("    <updated>{}</updated>\n", post.date_iso));
            if !post.category.is_empty() {
                feed.push_str(&format!(
                    "    <category term=\"{}\"/>\n",
                    escape_xml(&post.category)
                ));
            }
            if let Some(description) = &post.description {
                feed.push_str(&format!(
                    "    <summary>{}</summary>\n",
                    escape_xml(description)
                ));
            }
            feed.push_str(&format!(
                "    <content type=\"html\"><![CDATA[{}]]></content>\n",
                content.replace("]]>", "]]]]><![CDATA[>")
            ));
            feed.push_str("  </entry>\n");
        }

        feed.push_str("</feed>\n");

        let feed_path = url_for(&config, "atom.xml");
        self.write_page(&feed_path, &feed)
    }

    /// File of a URL path, relative to the public directory
    fn relative_output(&self, url_path: &str) -> String {
        let root = self.config.root.trim_end_matches('/');
        let relative = url_path
            .strip_prefix(root)
            .unwrap_or(url_path)
            .trim_start_matches('/');

        if relative.ends_with(".html") || relative.ends_with(".xml") {
            relative.to_string()
        } else if relative.is_empty() || relative.ends_with('/') {
            format!("{}index.html", relative)
        } else {
            format!("{}/index.html", relative)
        }
    }

    /// Write a rendered page at its URL path inside the public directory
    fn write_page(&mut self, url_path: &str, content: &str) -> Result<()> {
        let relative = self.relative_output(url_path);
        if !self.written.insert(relative.clone()) {
            bail!("{:?} is generated more than once", url_path);
        }
        let output_path = self.site.public_dir.join(&relative);

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {:?}", parent))?;
        }
        fs::write(&output_path, content)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        tracing::debug!("Generated: {:?}", output_path);

        Ok(())
    }
}

/// Give every named category a distinct URL slug
///
/// Ids that slugify alike (`CSS` and `css`) get `-2`, `-3` suffixes in
/// encounter order. `all` and ids with an empty slug get no entry.
fn unique_slugs(categories: &IndexSet<String>) -> HashMap<String, String> {
    let mut taken = IndexSet::new();
    let mut slugs = HashMap::new();

    for id in categories {
        if id == ALL_CATEGORY {
            continue;
        }
        let base = slug::slugify(id);
        if base.is_empty() {
            continue;
        }

        let mut slug = base.clone();
        let mut n = 2;
        while !taken.insert(slug.clone()) {
            slug = format!("{}-{}", base, n);
            n += 1;
        }
        if slug != base {
            tracing::warn!("Category {:?} shares the slug {:?}, using {:?}", id, base, slug);
        }
        slugs.insert(id.clone(), slug);
    }

    slugs
}

fn nav_post(post: &PostData) -> NavPost {
    NavPost {
        title: post.title.clone(),
        path: post.path.clone(),
    }
}

/// URL of page `n` of a listing rooted at `base`
fn page_url(base: &str, n: usize) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{}page/{}/", base, n)
    }
}
