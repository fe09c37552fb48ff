//! List site content

use anyhow::{bail, Result};
use std::fmt::Write as _;

use crate::collections::Collections;
use crate::content::ContentLoader;
use crate::registry::Registry;
use crate::Site;

/// Print the site content of one kind
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    print!("{}", listing(site, content_type)?);
    Ok(())
}

/// Render the listing for `post`, `draft`, `category` or `helper`
pub fn listing(site: &Site, content_type: &str) -> Result<String> {
    if matches!(content_type, "helper" | "helpers") {
        return helpers();
    }

    let items = ContentLoader::new(site)?.load_items()?;
    let collections = Collections::derive(&items);
    let mut out = String::new();

    match content_type {
        "post" | "posts" => {
            writeln!(out, "Posts ({}):", collections.posts.len())?;
            for post in &collections.posts {
                writeln!(
                    out,
                    "  {} - {} [{}] ({})",
                    post.date.format("%Y-%m-%d"),
                    post.title,
                    post.category,
                    post.source
                )?;
            }
        }
        "draft" | "drafts" => {
            let drafts: Vec<_> = items.iter().filter(|item| item.draft).collect();
            writeln!(out, "Drafts ({}):", drafts.len())?;
            for draft in drafts {
                writeln!(out, "  {} ({})", draft.title, draft.source)?;
            }
        }
        "category" | "categories" => {
            writeln!(out, "Categories ({}):", collections.categories.len())?;
            for (category, posts) in &collections.posts_by_category {
                let name = if category.is_empty() { "(none)" } else { category.as_str() };
                writeln!(out, "  {} ({})", name, posts.len())?;
            }
        }
        _ => {
            bail!(
                "Unknown type: {}. Available: post, draft, category, helper",
                content_type
            );
        }
    }

    Ok(out)
}

/// Filters and shortcodes available to templates and posts
fn helpers() -> Result<String> {
    let registry = Registry::with_defaults()?;
    let mut out = String::new();
    writeln!(out, "Filters:")?;
    for name in registry.filter_names() {
        writeln!(out, "  {}", name)?;
    }
    writeln!(out, "Shortcodes:")?;
    for name in registry.shortcode_names() {
        writeln!(out, "  {}", name)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> (TempDir, Site) {
        let dir = TempDir::new().unwrap();
        let posts = dir.path().join("source/_posts");
        fs::create_dir_all(&posts).unwrap();
        fs::write(
            posts.join("a.md"),
            "---\ntitle: Alpha\ndate: 2024-01-01\ncategory: css\n---\n",
        )
        .unwrap();
        fs::write(
            posts.join("b.md"),
            "---\ntitle: Beta\ndate: 2024-02-01\ndraft: true\n---\n",
        )
        .unwrap();
        let site = Site::new(dir.path()).unwrap();
        (dir, site)
    }

    #[test]
    fn test_listings() {
        let (_dir, site) = site();

        let posts = listing(&site, "post").unwrap();
        assert!(posts.starts_with("Posts (1):"));
        assert!(posts.contains("2024-01-01 - Alpha [css] (_posts/a.md)"));

        let drafts = listing(&site, "draft").unwrap();
        assert!(drafts.contains("Beta (_posts/b.md)"));

        let categories = listing(&site, "category").unwrap();
        assert_eq!(categories, "Categories (2):\n  all (1)\n  css (1)\n");

        assert!(listing(&site, "tag").is_err());
    }

    #[test]
    fn test_helper_listing() {
        let (_dir, site) = site();
        let helpers = listing(&site, "helper").unwrap();
        let (filters, shortcodes) = helpers.split_once("Shortcodes:\n").unwrap();
        assert!(filters.contains("  format_date\n"));
        assert!(shortcodes.contains("  aside\n"));
        assert!(!filters.contains("  aside\n"));
    }
}
