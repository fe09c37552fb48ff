//! nightlog: a static blog generator
//!
//! Posts are loaded from Markdown with front matter, turned into the blog's
//! collections (all posts, categories, posts by category) and rendered through
//! embedded Tera templates.

pub mod collections;
pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod helpers;
pub mod registry;
pub mod server;
pub mod templates;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A site on disk with its loaded configuration
#[derive(Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Source directory
    pub source_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
}

impl Site {
    /// Load the site rooted at `base_dir`
    ///
    /// This is the only place configuration is read. `_config.yml` is optional;
    /// `source/_data/category_descriptions.yml` is merged in when present.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let mut config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        let source_dir = base_dir.join(&config.source_dir);
        let public_dir = base_dir.join(&config.public_dir);

        config
            .load_category_descriptions(source_dir.join("_data").join("category_descriptions.yml"))
            .context("Failed to load site data")?;

        Ok(Self {
            config,
            base_dir,
            source_dir,
            public_dir,
        })
    }

    /// Directory holding published posts
    pub fn posts_dir(&self) -> PathBuf {
        self.source_dir.join("_posts")
    }

    /// Directory holding drafts
    pub fn drafts_dir(&self) -> PathBuf {
        self.source_dir.join("_drafts")
    }

    /// Generate the static site
    pub fn generate(&self) -> Result<generator::BuildReport> {
        commands::generate::run(self)
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_site_without_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        assert_eq!(site.config.title, "Nightlog");
        assert_eq!(site.source_dir, dir.path().join("source"));
        assert_eq!(site.public_dir, dir.path().join("public"));
    }

    #[test]
    fn test_site_merges_category_descriptions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("_config.yml"), "title: Night\npublic_dir: out\n").unwrap();
        let data = dir.path().join("source/_data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("category_descriptions.yml"), "css: Styling notes\n").unwrap();

        let site = Site::new(dir.path()).unwrap();
        assert_eq!(site.config.title, "Night");
        assert_eq!(site.public_dir, dir.path().join("out"));
        assert_eq!(site.config.category_description("css"), Some("Styling notes"));
    }

    #[test]
    fn test_site_rejects_bad_timezone() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("_config.yml"), "timezone: Mars/Olympus\n").unwrap();
        assert!(Site::new(dir.path()).is_err());
    }
}
