//! Built-in shortcodes

use super::{ArgSpec, RegistryError, ShortcodeCall, ShortcodeDef, ShortcodeKind, ValueKind};
use crate::config::SiteConfig;
use crate::content::render_fragment;
use crate::helpers::{html_escape, url_for};

const QUOTE_ARGS: &[ArgSpec] = &[
    ArgSpec::optional("cite", ValueKind::String),
    ArgSpec::optional("source", ValueKind::String),
];
const IMAGE_ARGS: &[ArgSpec] = &[
    ArgSpec::required("src", ValueKind::String),
    ArgSpec::required("alt", ValueKind::String),
    ArgSpec::optional("caption", ValueKind::String),
    ArgSpec::optional("width", ValueKind::Number),
    ArgSpec::optional("height", ValueKind::Number),
];
const ICON_ARGS: &[ArgSpec] = &[
    ArgSpec::required("name", ValueKind::String),
    ArgSpec::optional("style", ValueKind::String),
];
const SOCIAL_ICON_ARGS: &[ArgSpec] = &[
    ArgSpec::required("platform", ValueKind::String),
    ArgSpec::required("url", ValueKind::String),
    ArgSpec::optional("label", ValueKind::String),
];

pub(super) fn builtin() -> Vec<ShortcodeDef> {
    vec![
        ShortcodeDef {
            name: "aside",
            kind: ShortcodeKind::Paired,
            args: &[],
            func: aside,
        },
        ShortcodeDef {
            name: "quote",
            kind: ShortcodeKind::Paired,
            args: QUOTE_ARGS,
            func: quote,
        },
        ShortcodeDef {
            name: "image",
            kind: ShortcodeKind::Single,
            args: IMAGE_ARGS,
            func: image,
        },
        ShortcodeDef {
            name: "icon",
            kind: ShortcodeKind::Single,
            args: ICON_ARGS,
            func: icon,
        },
        ShortcodeDef {
            name: "social_icon",
            kind: ShortcodeKind::Single,
            args: SOCIAL_ICON_ARGS,
            func: social_icon,
        },
    ]
}

fn aside(call: &ShortcodeCall<'_>, _config: &SiteConfig) -> Result<String, RegistryError> {
    let body = render_fragment(call.body.unwrap_or_default().trim());
    Ok(format!(
        r#"<aside class="post-aside" role="note">{}</aside>"#,
        body.trim_end()
    ))
}

fn quote(call: &ShortcodeCall<'_>, _config: &SiteConfig) -> Result<String, RegistryError> {
    let body = render_fragment(call.body.unwrap_or_default().trim());
    let cite_attr = call
        .args
        .str("source")
        .map(|url| format!(r#" cite="{}""#, html_escape(url)))
        .unwrap_or_default();
    let footer = match (call.args.str("cite"), call.args.str("source")) {
        (Some(name), Some(url)) => format!(
            r#"<footer class="quote-author"><cite><a href="{}">{}</a></cite></footer>"#,
            html_escape(url),
            html_escape(name)
        ),
        (Some(name), None) => format!(
            r#"<footer class="quote-author"><cite>{}</cite></footer>"#,
            html_escape(name)
        ),
        _ => String::new(),
    };

    Ok(format!(
        r#"<blockquote class="quote"{}>{}{}</blockquote>"#,
        cite_attr,
        body.trim_end(),
        footer
    ))
}

fn image(call: &ShortcodeCall<'_>, config: &SiteConfig) -> Result<String, RegistryError> {
    let src = call.args.str("src").unwrap_or_default();
    if src.trim().is_empty() {
        return Err(RegistryError::failed("image", "src must not be empty"));
    }
    let alt = call.args.str("alt").unwrap_or_default();

    let mut img = format!(
        r#"<img src="{}" alt="{}" loading="lazy" decoding="async""#,
        html_escape(&url_for(config, src)),
        html_escape(alt)
    );
    for dimension in ["width", "height"] {
        if let Some(n) = call.args.f64(dimension) {
            img.push_str(&format!(r#" {}="{}""#, dimension, n.round() as u64));
        }
    }
    img.push('>');

    Ok(match call.args.str("caption") {
        Some(caption) => format!(
            r#"<figure class="post-image">{}<figcaption>{}</figcaption></figure>"#,
            img,
            render_fragment(caption)
                .trim()
                .trim_start_matches("<p>")
                .trim_end_matches("</p>")
        ),
        None => format!(r#"<figure class="post-image">{}</figure>"#, img),
    })
}

fn icon(call: &ShortcodeCall<'_>, _config: &SiteConfig) -> Result<String, RegistryError> {
    let name = call.args.str("name").unwrap_or_default();
    let style = call.args.str("style").unwrap_or("solid");
    Ok(format!(
        r#"<i class="fa-{} fa-{}" aria-hidden="true"></i>"#,
        html_escape(style),
        html_escape(name)
    ))
}

fn social_icon(call: &ShortcodeCall<'_>, _config: &SiteConfig) -> Result<String, RegistryError> {
    let platform = call.args.str("platform").unwrap_or_default();
    let url = call.args.str("url").unwrap_or_default();
    let label = call.args.str("label").unwrap_or(platform);
    Ok(format!(
        r#"<a class="social-icon" href="{}" aria-label="{}" rel="noopener"><i class="fa-brands fa-{}" aria-hidden="true"></i></a>"#,
        html_escape(url),
        html_escape(label),
        html_escape(platform)
    ))
}

#[cfg(test)]
mod tests {
    use super::super::Registry;
    use super::*;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn expand(name: &str, body: Option<&str>, args: &[(&str, Value)]) -> Result<String, RegistryError> {
        let registry = Registry::with_defaults().unwrap();
        let config = SiteConfig {
            root: "/".to_string(),
            ..Default::default()
        };
        let args: HashMap<String, Value> = args
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        registry.shortcode(name).unwrap().call(body, &args, &config)
    }

    #[test]
    fn test_aside_renders_markdown_body() {
        let html = expand("aside", Some("\n**Note:** careful.\n"), &[]).unwrap();
        assert_eq!(
            html,
            r#"<aside class="post-aside" role="note"><p><strong>Note:</strong> careful.</p></aside>"#
        );
    }

    #[test]
    fn test_quote_with_attribution() {
        let html = expand(
            "quote",
            Some("Simplicity is prerequisite for reliability."),
            &[("cite", json!("Dijkstra")), ("source", json!("https://example.com/ewd"))],
        )
        .unwrap();
        assert!(html.starts_with(r#"<blockquote class="quote" cite="https://example.com/ewd">"#));
        assert!(html.contains(r#"<cite><a href="https://example.com/ewd">Dijkstra</a></cite>"#));
    }

    #[test]
    fn test_image() {
        let html = expand(
            "image",
            None,
            &[
                ("src", json!("/images/night.png")),
                ("alt", json!("A \"dark\" sky")),
                ("caption", json!("Taken at *dusk*")),
                ("width", json!(800)),
            ],
        )
        .unwrap();
        assert!(html.contains(r#"src="/images/night.png""#));
        assert!(html.contains(r#"alt="A &quot;dark&quot; sky""#));
        assert!(html.contains(r#"width="800""#));
        assert!(html.contains("<figcaption>Taken at <em>dusk</em></figcaption>"));
    }

    #[test]
    fn test_image_requires_alt() {
        assert!(matches!(
            expand("image", None, &[("src", json!("a.png"))]),
            Err(RegistryError::MissingArg { .. })
        ));
    }

    #[test]
    fn test_icons() {
        assert_eq!(
            expand("icon", None, &[("name", json!("moon"))]).unwrap(),
            r#"<i class="fa-solid fa-moon" aria-hidden="true"></i>"#
        );
        let html = expand(
            "social_icon",
            None,
            &[("platform", json!("github")), ("url", json!("https://github.com/me"))],
        )
        .unwrap();
        assert!(html.contains(r#"aria-label="github""#));
        assert!(html.contains("fa-brands fa-github"));
    }
}
