//! Print the derived collections as JSON

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::collections::{items_from_json, Collections};
use crate::content::ContentLoader;
use crate::Site;

/// Derive `posts`, `categories` and `postsByCategory` and return them as JSON
///
/// Items come from the site's sources, or from an exported JSON item list when
/// `input` is given.
pub fn run(site: &Site, input: Option<&Path>) -> Result<String> {
    let items = match input {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {:?}", path))?;
            items_from_json(&value, &site.config)?
        }
        None => ContentLoader::new(site)?.load_items()?,
    };

    let collections = Collections::derive(&items);
    Ok(serde_json::to_string_pretty(&collections)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::CollectionError;
    use serde_json::Value;
    use tempfile::TempDir;

    fn site() -> (TempDir, Site) {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        (dir, site)
    }

    #[test]
    fn test_derive_from_json_input() {
        let (dir, site) = site();
        let input = dir.path().join("items.json");
        fs::write(
            &input,
            r#"[
                {"title": "Old", "date": "2023-01-01T00:00:00Z", "category": "css"},
                {"title": "New", "date": "2024-01-01T00:00:00Z", "category": "math"},
                {"title": "Hidden", "date": "2024-06-01T00:00:00Z", "category": "art", "draft": true}
            ]"#,
        )
        .unwrap();

        let json: Value = serde_json::from_str(&run(&site, Some(&input)).unwrap()).unwrap();
        assert_eq!(json["categories"], serde_json::json!(["all", "css", "math"]));

        let titles: Vec<_> = json["posts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["New", "Old"]);

        let keys: Vec<_> = json["postsByCategory"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["all", "css", "math"]);
        assert_eq!(json["postsByCategory"]["css"][0]["title"], "Old");
    }

    #[test]
    fn test_derive_rejects_non_sequence() {
        let (dir, site) = site();
        let input = dir.path().join("items.json");
        fs::write(&input, r#"{"title": "not a list"}"#).unwrap();

        let err = run(&site, Some(&input)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CollectionError>(),
            Some(CollectionError::NotASequence { .. })
        ));
    }

    #[test]
    fn test_derive_empty_site() {
        let (_dir, site) = site();
        let json: Value = serde_json::from_str(&run(&site, None).unwrap()).unwrap();
        assert_eq!(json["posts"], serde_json::json!([]));
        assert_eq!(json["categories"], serde_json::json!(["all"]));
        assert_eq!(json["postsByCategory"], serde_json::json!({"all": []}));
    }
}
