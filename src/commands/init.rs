//! Initialize a new site

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

const CONFIG_TEMPLATE: &str = r#"# Site
title: Nightlog
subtitle: ''
description: ''
author: John Doe
language: en
# IANA name such as Europe/Berlin; empty uses the local zone
timezone: ''

# URL
url: http://example.com
root: /
permalink: blog/:title/

# Directory
source_dir: source
public_dir: public
category_dir: blog

# Writing
default_category: ''
# Expand shortcodes such as {% filter aside %} inside posts
markdown_template_engine: true
highlight:
  theme: base16-ocean.dark
  line_number: false
footnotes:
  title: Footnotes
  back_link_label: Back to reference {n}

# Listings
per_page: 10
home_posts: 5
feed_limit: 20

# Date format (Moment.js tokens)
date_format: MMMM DD, YYYY

# Footer links
social: {}
"#;

const CATEGORY_DESCRIPTIONS: &str = r#"# Category id -> description shown on its listing page
notes: Short notes and announcements.
"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        bail!("{:?} already contains a site", target_dir);
    }

    for dir in ["source/_posts", "source/_drafts", "source/_data"] {
        let path = target_dir.join(dir);
        fs::create_dir_all(&path).with_context(|| format!("Failed to create {:?}", path))?;
    }

    fs::write(&config_path, CONFIG_TEMPLATE)?;
    fs::write(
        target_dir.join("source/_data/category_descriptions.yml"),
        CATEGORY_DESCRIPTIONS,
    )?;

    let now = chrono::Local::now();
    let sample_post = format!(
        r#"---
title: Hello World
date: {}
category: notes
---

Welcome to your new blog. Posts live in `source/_posts`; drafts in `source/_drafts`
stay out of every listing.
<!-- more -->

## Writing

```bash
$ nightlog new "My New Post" --category notes
```

{{% filter aside %}}
Shortcodes run before markdown, so **markdown** works inside them.
{{% endfilter %}}

## Building

```bash
$ nightlog generate
$ nightlog server
```
"#,
        now.format("%Y-%m-%d %H:%M:%S")
    );

    fs::write(target_dir.join("source/_posts/hello-world.md"), sample_post)?;
    tracing::debug!("Wrote starter files to {:?}", target_dir);

    Ok(())
}
