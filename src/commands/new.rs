//! Create a new post or draft

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::Site;

#[derive(Serialize)]
struct NewFrontMatter<'a> {
    title: &'a str,
    date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
}

/// Create a new post, or a draft under `source/_drafts`
///
/// The file is named after the slugified title unless `path` is given.
pub fn create_post(
    site: &Site,
    title: &str,
    category: Option<&str>,
    draft: bool,
    path: Option<&str>,
) -> Result<PathBuf> {
    let target_dir = if draft {
        site.drafts_dir()
    } else {
        site.posts_dir()
    };

    let filename = match path {
        Some(p) => format!("{}.md", p.trim_end_matches(".md")),
        None => {
            let slug = slug::slugify(title);
            if slug.is_empty() {
                bail!("Cannot derive a file name from {:?}, pass --path", title);
            }
            format!("{}.md", slug)
        }
    };
    let file_path = target_dir.join(filename);

    if file_path.exists() {
        bail!("File already exists: {:?}", file_path);
    }

    let now = site.config.zone()?.now();
    let front_matter = NewFrontMatter {
        title,
        date: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        category: category.or_else(|| {
            let default = site.config.default_category.as_str();
            (!default.is_empty()).then_some(default)
        }),
    };
    let content = format!("---\n{}---\n\n", serde_yaml::to_string(&front_matter)?);

    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    fs::write(&file_path, content).with_context(|| format!("Failed to write {:?}", file_path))?;

    tracing::info!("Created: {:?}", file_path);
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentLoader, FrontMatter};
    use tempfile::TempDir;

    fn site() -> (TempDir, Site) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("_config.yml"), "timezone: UTC\n").unwrap();
        let site = Site::new(dir.path()).unwrap();
        (dir, site)
    }

    #[test]
    fn test_create_post() {
        let (_dir, site) = site();
        let path = create_post(&site, "Night: a # Story", Some("css"), false, None).unwrap();
        assert_eq!(path, site.posts_dir().join("night-a-story.md"));

        let content = fs::read_to_string(&path).unwrap();
        let (fm, body) = FrontMatter::parse(&content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Night: a # Story"));
        assert_eq!(fm.category.as_deref(), Some("css"));
        assert!(fm.date.is_some());
        assert!(body.trim().is_empty());
    }

    #[test]
    fn test_create_draft_is_excluded() {
        let (_dir, site) = site();
        let path = create_post(&site, "Later", None, true, Some("ideas/later")).unwrap();
        assert_eq!(path, site.drafts_dir().join("ideas/later.md"));

        let items = ContentLoader::new(&site).unwrap().load_items().unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].draft);
    }

    #[test]
    fn test_existing_file_is_not_overwritten() {
        let (_dir, site) = site();
        create_post(&site, "Twice", None, false, None).unwrap();
        assert!(create_post(&site, "Twice", None, false, None).is_err());
    }
}
