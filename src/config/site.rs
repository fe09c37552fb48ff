//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::collections::ALL_CATEGORY;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,
    pub permalink: String,

    // Directory
    pub source_dir: String,
    pub public_dir: String,
    pub category_dir: String,

    // Writing
    pub default_category: String,
    pub markdown_template_engine: bool,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub footnotes: FootnotesConfig,

    // Listings
    pub per_page: usize,
    pub home_posts: usize,
    pub feed_limit: usize,

    // Date / Time format
    pub date_format: String,

    /// Platform -> profile URL, shown as icons in the footer
    pub social: IndexMap<String, String>,

    /// Category id -> description, usually merged from `_data/category_descriptions.yml`
    #[serde(default)]
    pub category_descriptions: IndexMap<String, String>,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Nightlog".to_string(),
            subtitle: String::new(),
            description: String::new(),
            author: "John Doe".to_string(),
            language: "en".to_string(),
            timezone: String::new(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),
            permalink: "blog/:title/".to_string(),

            source_dir: "source".to_string(),
            public_dir: "public".to_string(),
            category_dir: "blog".to_string(),

            default_category: String::new(),
            markdown_template_engine: true,
            highlight: HighlightConfig::default(),
            footnotes: FootnotesConfig::default(),

            per_page: 10,
            home_posts: 5,
            feed_limit: 20,

            date_format: "MMMM DD, YYYY".to_string(),

            social: IndexMap::new(),

            category_descriptions: IndexMap::new(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: SiteConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        config.zone()?;
        Ok(config)
    }

    /// Merge category descriptions from a YAML data file, if it exists
    pub fn load_category_descriptions<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(path)?;
        let descriptions: IndexMap<String, String> = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse category descriptions {:?}", path))?;
        for (category, description) in descriptions {
            self.category_descriptions.insert(category, description);
        }
        tracing::debug!("Loaded category descriptions from {:?}", path);

        Ok(())
    }

    /// Description shown on a category listing. `all` falls back to the site description.
    pub fn category_description(&self, category: &str) -> Option<&str> {
        match self.category_descriptions.get(category) {
            Some(description) => Some(description.as_str()),
            None if category == ALL_CATEGORY && !self.description.is_empty() => {
                Some(self.description.as_str())
            }
            None => None,
        }
    }

    /// Resolve the configured timezone
    pub fn zone(&self) -> Result<SiteZone> {
        let name = self.timezone.trim();
        if name.is_empty() {
            return Ok(SiteZone::Local);
        }
        name.parse::<Tz>()
            .map(SiteZone::Named)
            .map_err(|e| anyhow::anyhow!("Unknown timezone {:?}: {}", name, e))
    }
}

/// Timezone used to interpret naive front-matter dates
#[derive(Debug, Clone, Copy)]
pub enum SiteZone {
    Local,
    Named(Tz),
}

impl SiteZone {
    /// Attach this zone to a naive timestamp
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            SiteZone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.fixed_offset()),
            SiteZone::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.fixed_offset()),
        }
    }

    /// Express an instant in this zone
    pub fn convert(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            SiteZone::Local => instant.with_timezone(&Local).fixed_offset(),
            SiteZone::Named(tz) => instant.with_timezone(tz).fixed_offset(),
        }
    }

    /// The current time in this zone
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.convert(Utc::now())
    }
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            line_number: false,
        }
    }
}

/// Footnote section markup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FootnotesConfig {
    pub base_class: String,
    pub list_class: String,
    pub title: String,
    pub title_id: String,
    /// `{n}` is replaced with the reference number
    pub back_link_label: String,
}

impl Default for FootnotesConfig {
    fn default() -> Self {
        Self {
            base_class: "footnotes".to_string(),
            list_class: "list".to_string(),
            title: "Footnotes".to_string(),
            title_id: "footnotes-label".to_string(),
            back_link_label: "Back to reference {n}".to_string(),
        }
    }
}

impl FootnotesConfig {
    pub fn back_link_label(&self, number: usize) -> String {
        self.back_link_label.replace("{n}", &number.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.category_dir, "blog");
        assert_eq!(config.per_page, 10);
        assert!(config.markdown_template_engine);
        assert_eq!(config.footnotes.title_id, "footnotes-label");
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: Night Notes
author: Test User
per_page: 20
timezone: America/New_York
footnotes:
  title: Notes
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "Night Notes");
        assert_eq!(config.author, "Test User");
        assert_eq!(config.per_page, 20);
        assert_eq!(config.footnotes.title, "Notes");
        assert_eq!(config.footnotes.base_class, "footnotes");
        assert!(matches!(config.zone().unwrap(), SiteZone::Named(_)));
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let config = SiteConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Default::default()
        };
        assert!(config.zone().is_err());
    }

    #[test]
    fn test_category_description_all_falls_back_to_site() {
        let mut config = SiteConfig {
            description: "Writing about the web.".to_string(),
            ..Default::default()
        };
        config
            .category_descriptions
            .insert("math".to_string(), "A glimpse into math.".to_string());

        assert_eq!(
            config.category_description("all"),
            Some("Writing about the web.")
        );
        assert_eq!(
            config.category_description("math"),
            Some("A glimpse into math.")
        );
        assert_eq!(config.category_description("css"), None);

        config
            .category_descriptions
            .insert("all".to_string(), "Everything.".to_string());
        assert_eq!(config.category_description("all"), Some("Everything."));
    }

    #[test]
    fn test_load_category_descriptions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("category_descriptions.yml");
        fs::write(&path, "css: Modern CSS.\na11y: Accessibility.\n").unwrap();

        let mut config = SiteConfig::default();
        config.load_category_descriptions(&path).unwrap();
        let keys: Vec<_> = config.category_descriptions.keys().cloned().collect();
        assert_eq!(keys, vec!["css", "a11y"]);

        // Missing file is not an error
        config
            .load_category_descriptions(dir.path().join("missing.yml"))
            .unwrap();
    }

    #[test]
    fn test_named_zone_localize() {
        let zone = SiteZone::Named("Asia/Tokyo".parse().unwrap());
        let naive = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let dt = zone.localize(naive).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 9 * 3600);
    }
}
