//! Generate static files

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use crate::content::ContentLoader;
use crate::generator::{BuildReport, Generator};
use crate::Site;

/// Generate the static site from scratch
pub fn run(site: &Site) -> Result<BuildReport> {
    let start = Instant::now();

    let items = ContentLoader::new(site)?.load_items()?;
    tracing::info!("Loaded {} content items", items.len());

    let mut generator = Generator::new(site)?;
    let report = generator.generate(&items)?;

    tracing::info!("Generated in {:.2}s", start.elapsed().as_secs_f64());
    Ok(report)
}

/// Reload the site configuration and generate again
pub fn rebuild(base_dir: &Path) -> Result<BuildReport> {
    let site = Site::new(base_dir)?;
    run(&site)
}

/// Watch the sources and `_config.yml`, rebuilding on every change
///
/// Blocks the calling thread. `on_rebuild` runs after each rebuild attempt.
pub fn watch<F>(base_dir: &Path, mut on_rebuild: F) -> Result<()>
where
    F: FnMut(&Result<BuildReport>),
{
    let site = Site::new(base_dir)?;
    let config_path = base_dir.join("_config.yml");

    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;

    if site.source_dir.exists() {
        debouncer
            .watcher()
            .watch(&site.source_dir, RecursiveMode::Recursive)?;
        tracing::debug!("Watching: {:?}", site.source_dir);
    }
    if config_path.exists() {
        debouncer
            .watcher()
            .watch(&config_path, RecursiveMode::NonRecursive)?;
        tracing::debug!("Watching: {:?}", config_path);
    }

    tracing::info!("Watching for changes. Press Ctrl+C to stop.");

    for result in rx {
        match result {
            Ok(events) => {
                let changed: Vec<_> = events.iter().filter(|e| is_relevant(&e.path)).collect();
                if changed.is_empty() {
                    continue;
                }
                for event in &changed {
                    tracing::info!("File changed: {}", event.path.display());
                }

                let result = rebuild(base_dir);
                if let Err(e) = &result {
                    tracing::error!("Generation failed: {:#}", e);
                }
                on_rebuild(&result);
            }
            Err(e) => tracing::error!("Watch error: {:?}", e),
        }
    }

    Ok(())
}

/// Editor and VCS noise that should not trigger a rebuild
fn is_relevant(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    !path_str.contains(".git")
        && !path_str.contains(".DS_Store")
        && !path_str.ends_with('~')
        && !path_str.ends_with(".swp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_run_builds_site() {
        let dir = TempDir::new().unwrap();
        let posts = dir.path().join("source/_posts");
        fs::create_dir_all(&posts).unwrap();
        fs::write(
            posts.join("first.md"),
            "---\ntitle: First\ndate: 2024-01-01\ncategory: notes\n---\nHello.\n",
        )
        .unwrap();

        let report = rebuild(dir.path()).unwrap();
        assert_eq!(report.posts, 1);
        assert_eq!(report.categories, 2);
        assert!(dir.path().join("public/blog/first/index.html").exists());
        assert!(dir.path().join("public/blog/notes/index.html").exists());
    }

    #[test]
    fn test_is_relevant() {
        assert!(is_relevant(Path::new("source/_posts/a.md")));
        assert!(!is_relevant(Path::new("source/_posts/.a.md.swp")));
        assert!(!is_relevant(Path::new("source/_posts/a.md~")));
        assert!(!is_relevant(Path::new(".git/index")));
    }
}
