//! Markdown rendering with syntax highlighting and endnote-style footnotes

use anyhow::Result;
use indexmap::IndexMap;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::{FootnotesConfig, SiteConfig};
use crate::helpers::html_escape;

const MORE_MARKER: &str = "<!-- more -->";

fn markdown_options() -> Options {
    // Front matter is stripped before rendering, so no metadata blocks
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
    line_numbers: bool,
    footnotes: FootnotesConfig,
}

impl MarkdownRenderer {
    /// Create a renderer with default settings
    pub fn new() -> Self {
        Self::from_config(&SiteConfig::default())
    }

    /// Create a renderer from the site's highlight and footnote settings
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme_name: config.highlight.theme.clone(),
            line_numbers: config.highlight.line_number,
            footnotes: config.footnotes.clone(),
        }
    }

    /// Render markdown to HTML
    pub fn render(&self, markdown: &str) -> Result<String> {
        let parser = Parser::new_ext(markdown, markdown_options());

        let mut events: Vec<Event> = Vec::new();
        let mut code_block: Option<(Option<String>, String)> = None;

        let mut footnotes = FootnoteCollector::default();
        // Events inside a footnote definition go to the collector instead of the body
        let mut current_definition: Option<(String, Vec<Event>)> = None;

        for event in parser {
            let event = match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(lang) => {
                            let lang = lang.split_whitespace().next().unwrap_or("").to_string();
                            (!lang.is_empty()).then_some(lang)
                        }
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some((lang, String::new()));
                    continue;
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, content)) = code_block.as_mut() {
                        content.push_str(&text);
                    }
                    continue;
                }
                Event::End(TagEnd::CodeBlock) => {
                    let Some((lang, content)) = code_block.take() else {
                        continue;
                    };
                    Event::Html(CowStr::from(self.highlight_code(&content, lang.as_deref())))
                }
                Event::Start(Tag::FootnoteDefinition(label)) => {
                    current_definition = Some((label.to_string(), Vec::new()));
                    continue;
                }
                Event::End(TagEnd::FootnoteDefinition) => {
                    if let Some((label, body)) = current_definition.take() {
                        footnotes.define(label, body);
                    }
                    continue;
                }
                Event::FootnoteReference(label) => {
                    let number = footnotes.reference(&label);
                    Event::Html(CowStr::from(self.footnote_ref(&label, number)))
                }
                other => other,
            };

            match current_definition.as_mut() {
                Some((_, body)) => body.push(event),
                None => events.push(event),
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output.push_str(&self.footnotes_section(footnotes));

        Ok(html_output)
    }

    /// Highlight a code block
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = self
            .theme_set
            .themes
            .get(&self.theme_name)
            .or_else(|| self.theme_set.themes.values().next());

        let highlighted = theme.and_then(|theme| {
            highlighted_html_for_string(code, &self.syntax_set, syntax, theme).ok()
        });

        match highlighted {
            Some(highlighted) if self.line_numbers => self.add_line_numbers(&highlighted, lang),
            Some(highlighted) => format!(
                r#"<div class="code-block language-{}">{}</div>"#,
                lang, highlighted
            ),
            None => format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                lang,
                html_escape(code)
            ),
        }
    }

    /// Add line numbers to highlighted code
    fn add_line_numbers(&self, code: &str, lang: &str) -> String {
        let lines: Vec<&str> = code.lines().collect();

        let gutter = (1..=lines.len())
            .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
            lang,
            gutter,
            lines.join("\n")
        )
    }

    fn footnote_ref(&self, label: &str, number: usize) -> String {
        format!(
            r##"<sup class="{base}__ref"><a href="#fn-{id}" id="fnref-{id}" aria-describedby="{title_id}" role="doc-noteref">{n}</a></sup>"##,
            base = self.footnotes.base_class,
            id = footnote_id(label),
            title_id = self.footnotes.title_id,
            n = number
        )
    }

    fn footnotes_section(&self, footnotes: FootnoteCollector) -> String {
        let notes = footnotes.into_ordered();
        if notes.is_empty() {
            return String::new();
        }

        let cfg = &self.footnotes;
        let mut out = format!(
            r#"<footer class="{base}" role="doc-endnotes"><h2 class="{base}__title" id="{title_id}">{title}</h2><ol class="{base}__list {list}">"#,
            base = cfg.base_class,
            title_id = cfg.title_id,
            title = html_escape(&cfg.title),
            list = cfg.list_class,
        );

        for (number, label, body) in notes {
            let mut body_html = String::new();
            html::push_html(&mut body_html, body.into_iter());
            out.push_str(&format!(
                r##"<li id="fn-{id}" class="{base}__item">{body}<a href="#fnref-{id}" class="{base}__back-link" aria-label="{aria}" role="doc-backlink">↩</a></li>"##,
                id = footnote_id(&label),
                base = cfg.base_class,
                body = body_html.trim_end(),
                aria = html_escape(&cfg.back_link_label(number)),
            ));
        }

        out.push_str("</ol></footer>");
        out
    }

    /// Split excerpt from content at `<!-- more -->`
    /// Returns (excerpt, content without the marker)
    pub fn split_excerpt(content: &str) -> (Option<String>, String) {
        match content.find(MORE_MARKER) {
            Some(pos) => {
                let excerpt = content[..pos].trim().to_string();
                let remaining = content[pos + MORE_MARKER.len()..].trim();
                let full = format!("{}\n\n{}", excerpt, remaining);
                (Some(excerpt), full)
            }
            None => (None, content.to_string()),
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Render markdown without highlighting or footnote handling
pub fn render_fragment(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, markdown_options());
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

fn footnote_id(label: &str) -> String {
    let id = slug::slugify(label);
    if id.is_empty() {
        crate::helpers::encode_url(label)
    } else {
        id
    }
}

/// Numbers footnote references in order of first use and keeps their definitions
#[derive(Default)]
struct FootnoteCollector<'a> {
    numbers: IndexMap<String, usize>,
    definitions: IndexMap<String, Vec<Event<'a>>>,
}

impl<'a> FootnoteCollector<'a> {
    /// A reference gets its number on first use; definitions are matched at the end
    fn reference(&mut self, label: &str) -> usize {
        let next = self.numbers.len() + 1;
        *self.numbers.entry(label.to_string()).or_insert(next)
    }

    fn define(&mut self, label: String, body: Vec<Event<'a>>) {
        self.definitions.insert(label, body);
    }

    fn into_ordered(mut self) -> Vec<(usize, String, Vec<Event<'a>>)> {
        let mut notes = Vec::new();
        for (label, number) in self.numbers {
            match self.definitions.shift_remove(&label) {
                Some(body) => notes.push((number, label, body)),
                None => tracing::debug!("Footnote [^{}] has no definition", label),
            }
        }
        for label in self.definitions.keys() {
            tracing::debug!("Footnote definition [^{}] is never referenced", label);
        }
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("# Hello World\n\nThis is a test.").unwrap();
        assert!(html.contains("<h1>Hello World</h1>"));
        assert!(html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_render_code_block() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```rust\nfn main() {}\n```").unwrap();
        assert!(html.contains("language-rust"));
        assert!(html.contains("main"));
        assert!(!html.contains("```"));
    }

    #[test]
    fn test_line_numbers() {
        let mut config = SiteConfig::default();
        config.highlight.line_number = true;
        let renderer = MarkdownRenderer::from_config(&config);
        let html = renderer.render("```js\nlet a = 1;\nlet b = 2;\n```").unwrap();
        assert!(html.contains(r#"<span class="line-number">2</span>"#));
        assert!(html.contains(r#"class="highlight js""#));
    }

    #[test]
    fn test_footnotes_rendered_as_endnotes() {
        let renderer = MarkdownRenderer::new();
        let md = "First[^b] and second[^a].\n\n[^a]: Note A.\n\n[^b]: Note B.\n";
        let html = renderer.render(md).unwrap();

        assert!(html.contains(r##"<a href="#fn-b" id="fnref-b" aria-describedby="footnotes-label" role="doc-noteref">1</a>"##));
        assert!(html.contains(r##"<a href="#fn-a" id="fnref-a" aria-describedby="footnotes-label" role="doc-noteref">2</a>"##));
        assert!(html.contains(r#"<h2 class="footnotes__title" id="footnotes-label">Footnotes</h2>"#));
        assert!(html.contains(r#"aria-label="Back to reference 1""#));

        // Listed in order of first reference, after the body
        let b = html.find(r#"<li id="fn-b""#).unwrap();
        let a = html.find(r#"<li id="fn-a""#).unwrap();
        assert!(b < a);
        assert!(html.find("<footer").unwrap() > html.find("second").unwrap());
    }

    #[test]
    fn test_unreferenced_footnote_dropped() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("Text.\n\n[^x]: Orphan.\n").unwrap();
        assert!(!html.contains("Orphan"));
        assert!(!html.contains("<footer"));
    }

    #[test]
    fn test_split_excerpt() {
        let content = "This is excerpt.\n<!-- more -->\nThis is more content.";
        let (excerpt, full) = MarkdownRenderer::split_excerpt(content);
        assert_eq!(excerpt, Some("This is excerpt.".to_string()));
        assert!(full.contains("This is excerpt."));
        assert!(full.contains("This is more content."));
        assert!(!full.contains("<!-- more -->"));
    }

    #[test]
    fn test_render_fragment() {
        assert_eq!(render_fragment("*hi*").trim(), "<p><em>hi</em></p>");
    }
}
