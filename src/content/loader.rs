//! Content loader - loads posts and drafts from the source directory

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{ContentItem, FrontMatter};
use crate::config::SiteZone;
use crate::Site;

/// Loads content items from `source/_posts` and `source/_drafts`
pub struct ContentLoader<'a> {
    site: &'a Site,
    zone: SiteZone,
}

impl<'a> ContentLoader<'a> {
    /// Create a new content loader
    pub fn new(site: &'a Site) -> Result<Self> {
        let zone = site.config.zone()?;
        Ok(Self { site, zone })
    }

    /// Load every post and draft
    ///
    /// Items come back ordered by source path so repeated builds see the same
    /// input order. Files that cannot be read are skipped with a warning.
    pub fn load_items(&self) -> Result<Vec<ContentItem>> {
        let mut items = Vec::new();

        for (dir, is_draft_dir) in [(self.site.posts_dir(), false), (self.site.drafts_dir(), true)] {
            for path in markdown_files(&dir) {
                match self.load_item(&path, is_draft_dir) {
                    Ok(item) => items.push(item),
                    Err(e) => tracing::warn!("Failed to load post {:?}: {:#}", path, e),
                }
            }
        }

        items.sort_by(|a, b| a.source.cmp(&b.source));
        tracing::debug!("Loaded {} content items", items.len());

        Ok(items)
    }

    /// Load a single file
    fn load_item(&self, path: &Path, is_draft_dir: bool) -> Result<ContentItem> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let (fm, body) = match FrontMatter::parse(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("{:?}: {}, using defaults", path, e);
                (FrontMatter::default(), content.as_str())
            }
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();

        let date = match fm.parse_date(&self.zone) {
            Some(date) => date,
            None => {
                if let Some(raw) = fm.date.as_deref() {
                    tracing::warn!("{:?}: unrecognized date {:?}, using file time", path, raw);
                }
                self.file_date(path)
            }
        };

        let title = fm.title.clone().unwrap_or_else(|| stem.clone());
        let category = fm
            .category
            .clone()
            .unwrap_or_else(|| self.site.config.default_category.clone());
        let draft = is_draft_dir || fm.is_draft();

        let source = path
            .strip_prefix(&self.site.source_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        // The permalink :title uses the file name, not the display title
        let slug = slug::slugify(&stem);
        let path_url = self.permalink_path(&date, &slug, &category);
        let permalink = format!("{}{}", self.site.config.url.trim_end_matches('/'), path_url);

        let extra = fm
            .extra
            .iter()
            .filter_map(|(key, value)| match serde_json::to_value(value) {
                Ok(json) => Some((key.clone(), json)),
                Err(e) => {
                    tracing::warn!("{:?}: dropping front-matter field {:?}: {}", path, key, e);
                    None
                }
            })
            .collect();

        let mut item = ContentItem::new(title, date, category, draft).with_body(body);
        item.description = fm.description;
        item.source = source;
        item.slug = slug;
        item.path = path_url;
        item.permalink = permalink;
        item.extra = extra;

        Ok(item)
    }

    /// Modification time of the file, or now
    fn file_date(&self, path: &Path) -> DateTime<FixedOffset> {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .map(|t| self.zone.convert(DateTime::<Utc>::from(t)))
            .unwrap_or_else(|_| self.zone.now())
    }

    /// Expand the permalink pattern into a rooted URL path
    fn permalink_path(&self, date: &DateTime<FixedOffset>, slug: &str, category: &str) -> String {
        let config = &self.site.config;

        let result = config
            .permalink
            .replace(":year", &date.format("%Y").to_string())
            .replace(":i_month", &date.format("%-m").to_string())
            .replace(":i_day", &date.format("%-d").to_string())
            .replace(":month", &date.format("%m").to_string())
            .replace(":day", &date.format("%d").to_string())
            .replace(":title", slug)
            .replace(":category", &slug::slugify(category));

        // An empty category leaves a double slash behind
        let mut result = result.trim_start_matches('/').to_string();
        while result.contains("//") {
            result = result.replace("//", "/");
        }

        format!("{}/{}", config.root.trim_end_matches('/'), result)
    }
}

/// Markdown files under `dir`, sorted by path
fn markdown_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_markdown_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site_with(config: &str, files: &[(&str, &str)]) -> (TempDir, Site) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("_config.yml"), config).unwrap();
        for (name, content) in files {
            let path = dir.path().join("source").join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let site = Site::new(dir.path()).unwrap();
        (dir, site)
    }

    #[test]
    fn test_load_items() {
        let (_dir, site) = site_with(
            "timezone: UTC\nurl: https://example.com\n",
            &[
                (
                    "_posts/dark-mode.md",
                    "---\ntitle: Dark Mode\ndate: 2024-02-01 10:00:00\ncategory: css\ndescription: Colors\nseries: night\n---\nBody text.",
                ),
                ("_posts/notes.txt", "ignored"),
                ("_drafts/wip.md", "---\ntitle: WIP\n---\nLater."),
            ],
        );

        let items = ContentLoader::new(&site).unwrap().load_items().unwrap();
        assert_eq!(items.len(), 2);

        let post = &items[1];
        assert_eq!(post.source, "_posts/dark-mode.md");
        assert_eq!(post.title, "Dark Mode");
        assert_eq!(post.category, "css");
        assert!(!post.draft);
        assert_eq!(post.body, "Body text.");
        assert_eq!(post.description.as_deref(), Some("Colors"));
        assert_eq!(post.date.to_rfc3339(), "2024-02-01T10:00:00+00:00");
        assert_eq!(post.path, "/blog/dark-mode/");
        assert_eq!(post.permalink, "https://example.com/blog/dark-mode/");
        assert_eq!(post.extra.get("series"), Some(&serde_json::json!("night")));

        let draft = &items[0];
        assert_eq!(draft.source, "_drafts/wip.md");
        assert!(draft.draft);
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let (_dir, site) = site_with(
            "default_category: misc\n",
            &[("_posts/plain-note.md", "Just text, no front matter.")],
        );

        let items = ContentLoader::new(&site).unwrap().load_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "plain-note");
        assert_eq!(items[0].category, "misc");
        assert_eq!(items[0].body, "Just text, no front matter.");
    }

    #[test]
    fn test_published_false_is_draft() {
        let (_dir, site) = site_with(
            "title: Test\n",
            &[("_posts/hidden.md", "---\ntitle: Hidden\npublished: false\n---\n")],
        );
        let items = ContentLoader::new(&site).unwrap().load_items().unwrap();
        assert!(items[0].draft);
    }

    #[test]
    fn test_permalink_pattern() {
        let (_dir, site) = site_with(
            "timezone: UTC\nroot: /notes/\npermalink: :category/:year/:month/:i_day/:title/\n",
            &[
                (
                    "_posts/first-light.md",
                    "---\ndate: 2024-03-05\ncategory: Night Sky\n---\n",
                ),
                ("_posts/loose.md", "---\ndate: 2024-03-06\n---\n"),
            ],
        );

        let items = ContentLoader::new(&site).unwrap().load_items().unwrap();
        assert_eq!(items[0].path, "/notes/night-sky/2024/03/5/first-light/");
        assert_eq!(items[1].path, "/notes/2024/03/6/loose/");
    }

    #[test]
    fn test_missing_posts_dir() {
        let (_dir, site) = site_with("title: Test\n", &[]);
        let items = ContentLoader::new(&site).unwrap().load_items().unwrap();
        assert!(items.is_empty());
    }
}
