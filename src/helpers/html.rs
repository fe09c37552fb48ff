//! HTML helper functions

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").expect("valid tag regex");
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escape XML special characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Strip HTML tags from a string
pub fn strip_html(s: &str) -> String {
    TAG_RE.replace_all(s, "").into_owned()
}

/// Replace newlines with `<br>`
pub fn newline_to_br(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\n', "<br>")
}

/// Remove newlines entirely
pub fn strip_newlines(s: &str) -> String {
    s.replace(['\r', '\n'], "")
}

/// Count words in HTML content (tags are stripped first)
///
/// CJK ideographs count as one word each.
pub fn count_words(html: &str) -> usize {
    let text = strip_html(html);
    let mut count = 0;
    let mut in_word = false;

    for c in text.chars() {
        if ('\u{4E00}'..='\u{9FFF}').contains(&c) {
            count += 1;
            in_word = false;
        } else if c.is_alphanumeric() || (in_word && (c == '\'' || c == '-')) {
            if !in_word {
                in_word = true;
                count += 1;
            }
        } else {
            in_word = false;
        }
    }

    count
}

/// Strip characters XML 1.0 does not allow (keeps tab, newline, carriage return)
pub fn strip_invalid_xml_chars(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            c == '\t'
                || c == '\n'
                || c == '\r'
                || ('\u{0020}'..='\u{D7FF}').contains(&c)
                || ('\u{E000}'..='\u{FFFD}').contains(&c)
                || ('\u{10000}'..='\u{10FFFF}').contains(&c)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <b>World</b></p>"), "Hello World");
        assert_eq!(strip_html("<a\nhref=\"x\">link</a>"), "link");
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("<p>Hello, <em>night</em> owl's world</p>"), 4);
        assert_eq!(count_words("第一条"), 3);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn test_newlines() {
        assert_eq!(newline_to_br("a\nb\r\nc"), "a<br>b<br>c");
        assert_eq!(strip_newlines("a\nb\r\n"), "ab");
    }

    #[test]
    fn test_strip_invalid_xml_chars() {
        assert_eq!(strip_invalid_xml_chars("a\u{0001}b\n"), "ab\n");
    }
}
