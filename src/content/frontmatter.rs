//! Front-matter parsing

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::config::SiteZone;

/// Accepts a string, a number, a bool, or the first element of a list of those
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct LenientString;

    impl<'de> Visitor<'de> for LenientString {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, a scalar, or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let first = seq.next_element::<serde_yaml::Value>()?;
            // Drain the rest so the deserializer stays consistent
            while seq.next_element::<serde_yaml::Value>()?.is_some() {}
            Ok(first.and_then(|v| scalar_to_string(&v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(LenientString)
}

/// Accepts a bool or a "true"/"yes"/"false"/"no" string; anything else is `false`
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        serde_yaml::Value::Bool(b) => b,
        serde_yaml::Value::String(s) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes")
        }
        serde_yaml::Value::Number(n) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        _ => false,
    }))
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Front-matter data from a post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub draft: Option<bool>,
    /// `published: false` marks a draft
    #[serde(deserialize_with = "lenient_bool")]
    pub published: Option<bool>,
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,

    /// Additional custom fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl FrontMatter {
    /// Parse front-matter from content string
    /// Returns (front_matter, remaining_content)
    pub fn parse(content: &str) -> Result<(Self, &str)> {
        let content = content.trim_start();

        if content.starts_with("---") {
            return Self::parse_yaml(content);
        }

        if content.starts_with(";;;") || content.starts_with('{') {
            return Self::parse_json(content);
        }

        Ok((FrontMatter::default(), content))
    }

    fn parse_yaml(content: &str) -> Result<(Self, &str)> {
        let rest = content[3..].trim_start_matches(['\n', '\r']);

        let Some(end_pos) = rest.find("\n---") else {
            // No closing fence, the whole file is content
            return Ok((FrontMatter::default(), content));
        };

        let yaml_content = &rest[..end_pos];
        let remaining = rest[end_pos + 4..].trim_start_matches(['\n', '\r']);

        if yaml_content.trim().is_empty() {
            return Ok((FrontMatter::default(), remaining));
        }

        // A leading `---` may be a markdown thematic break; require at least one `key: value`
        if !yaml_content.lines().any(looks_like_yaml_key) {
            return Ok((FrontMatter::default(), content));
        }

        match serde_yaml::from_str::<FrontMatter>(yaml_content) {
            Ok(fm) => Ok((fm, remaining)),
            Err(e) => {
                tracing::warn!("Failed to parse YAML front-matter, using defaults: {}", e);
                Ok((FrontMatter::default(), remaining))
            }
        }
    }

    fn parse_json(content: &str) -> Result<(Self, &str)> {
        if let Some(rest) = content.strip_prefix(";;;") {
            if let Some(end_pos) = rest.find(";;;") {
                let json_content = &rest[..end_pos];
                let remaining = rest[end_pos + 3..].trim_start_matches(['\n', '\r']);

                let fm: FrontMatter = serde_json::from_str(json_content)
                    .map_err(|e| anyhow!("Failed to parse JSON front-matter: {}", e))?;
                return Ok((fm, remaining));
            }
        }

        if content.starts_with('{') {
            // The object ends wherever the JSON parser stops
            let mut stream = serde_json::Deserializer::from_str(content).into_iter::<FrontMatter>();
            return match stream.next() {
                Some(Ok(fm)) => {
                    let remaining = content[stream.byte_offset()..].trim_start_matches(['\n', '\r']);
                    Ok((fm, remaining))
                }
                Some(Err(e)) => Err(anyhow!("Failed to parse JSON front-matter: {}", e)),
                None => Err(anyhow!("Invalid JSON front-matter")),
            };
        }

        Err(anyhow!("Invalid JSON front-matter"))
    }

    /// Whether this item should be treated as a draft
    pub fn is_draft(&self) -> bool {
        self.draft.unwrap_or(false) || self.published == Some(false)
    }

    /// Parse the date string in the given zone
    pub fn parse_date(&self, zone: &SiteZone) -> Option<DateTime<FixedOffset>> {
        self.date.as_deref().and_then(|s| parse_date_string(s, zone))
    }
}

fn looks_like_yaml_key(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return false;
    }
    let Some(colon_pos) = trimmed.find(':') else {
        return false;
    };
    let key = &trimmed[..colon_pos];
    let is_valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !matches!(key, "http" | "https" | "ftp");
    let after = &trimmed[colon_pos + 1..];
    is_valid_key && (after.is_empty() || after.starts_with(' '))
}

/// Parse a date string in various formats; naive values are placed in `zone`
pub fn parse_date_string(s: &str, zone: &SiteZone) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt);
    }

    const DATETIME_FORMATS: [&str; 7] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return zone.localize(naive);
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return zone.localize(d.and_hms_opt(0, 0, 0)?);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> SiteZone {
        SiteZone::Named(chrono_tz::UTC)
    }

    #[test]
    fn test_parse_yaml_frontmatter() {
        let content = r#"---
title: Hello World
date: 2024-01-15 10:30:00
category: css
description: A short intro.
---

This is the content.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Hello World"));
        assert_eq!(fm.category.as_deref(), Some("css"));
        assert_eq!(fm.description.as_deref(), Some("A short intro."));
        assert!(!fm.is_draft());
        assert!(remaining.starts_with("This is the content."));
    }

    #[test]
    fn test_parse_json_frontmatter() {
        let content = r#"{"title": "Test Post", "category": "math", "draft": true}

This is content.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Test Post"));
        assert_eq!(fm.category.as_deref(), Some("math"));
        assert!(fm.is_draft());
        assert!(remaining.contains("This is content."));
    }

    #[test]
    fn test_json_frontmatter_with_braces_in_strings() {
        let content = "{\"title\": \"a}b\", \"description\": \"{x\"}\nBody {with braces}\n";
        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("a}b"));
        assert_eq!(fm.description.as_deref(), Some("{x"));
        assert_eq!(remaining, "Body {with braces}\n");
    }

    #[test]
    fn test_lenient_fields() {
        let content = r#"---
title: 1984
category:
  - 11ty
  - css
draft: "yes"
---
Body
"#;
        let (fm, _) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("1984"));
        assert_eq!(fm.category.as_deref(), Some("11ty"));
        assert!(fm.is_draft());
    }

    #[test]
    fn test_published_false_is_draft() {
        let (fm, _) = FrontMatter::parse("---\ntitle: Hidden\npublished: false\n---\n").unwrap();
        assert!(fm.is_draft());
    }

    #[test]
    fn test_extra_fields_kept() {
        let (fm, _) = FrontMatter::parse("---\ntitle: T\nthumbnail: cover.png\n---\n").unwrap();
        assert_eq!(
            fm.extra.get("thumbnail").and_then(|v| v.as_str()),
            Some("cover.png")
        );
    }

    #[test]
    fn test_invalid_yaml_recovers_with_defaults() {
        let content = "---\ntitle: [unclosed\n---\nBody text\n";
        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert_eq!(remaining, "Body text\n");
    }

    #[test]
    fn test_markdown_separator_not_yaml() {
        let content = r#"
---

Some random text with markdown lists:
- Item 1
- Item 2

---
More content here.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.contains("Some random text"));
    }

    #[test]
    fn test_content_with_url_not_yaml() {
        let content = "\n---\n\nCheck out https://example.com/path\n\n---\nMore.\n";
        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.contains("https://example.com"));
    }

    #[test]
    fn test_parse_date_formats() {
        let zone = utc();
        let fm = FrontMatter {
            date: Some("2024-01-15 10:30:00".to_string()),
            ..Default::default()
        };
        let dt = fm.parse_date(&zone).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-15 10:30");

        let dt = parse_date_string("2024/03/01", &zone).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-03-01");

        let dt = parse_date_string("2024-03-01T08:00:00+02:00", &zone).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);

        assert!(parse_date_string("last tuesday", &zone).is_none());
    }
}
