// src/normalize.rs
//! Text Normalizer: markup stripping, whitespace collapsing and preview truncation.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Default preview length in characters (before the `...` suffix).
pub const PREVIEW_LEN: usize = 200;

fn re_blocks() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)\s*>")
            .expect("block regex")
    })
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<!--.*?-->|</?[a-z!][^>]*>").expect("tag regex"))
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

/// Strip scripts, styles, comments and tags, decode entities and collapse whitespace.
pub fn strip_markup(html: &str) -> String {
    // 1) Drop script/style bodies entirely
    let out = re_blocks().replace_all(html, " ");

    // 2) Tags become spaces so adjacent block text does not glue together
    let out = re_tags().replace_all(&out, " ");

    // 3) Entities (&amp;, &#8217;, &nbsp; ...)
    let out = html_escape::decode_html_entities(&out);

    // 4) Non-breaking spaces survive decoding; fold them into plain spaces
    let out = out.replace('\u{00A0}', " ");

    collapse_whitespace(&out)
}

pub fn collapse_whitespace(s: &str) -> String {
    re_ws().replace_all(s, " ").trim().to_string()
}

/// Cut `text` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head.trim_end())
}

/// Markup-free preview of an item body.
pub fn preview(content: &str) -> String {
    truncate_preview(&strip_markup(content), PREVIEW_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_scripts_and_entities() {
        let html = r#"<p>Suva&nbsp;&amp; Nadi</p><script>alert("x")</script><style>p{}</style><b>rain</b>"#;
        assert_eq!(strip_markup(html), "Suva & Nadi rain");
    }

    #[test]
    fn block_elements_do_not_glue_words() {
        assert_eq!(strip_markup("<p>one</p><p>two</p>"), "one two");
    }

    #[test]
    fn comments_are_removed() {
        assert_eq!(strip_markup("a <!-- hidden <b>x</b> --> b"), "a b");
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let s = "ā".repeat(10);
        let t = truncate_preview(&s, 4);
        assert_eq!(t, "āāāā...");
        assert_eq!(truncate_preview("short", 200), "short");
    }

    #[test]
    fn preview_is_bounded() {
        let body = format!("<p>{}</p>", "word ".repeat(100));
        let p = preview(&body);
        assert!(p.ends_with("..."));
        assert!(p.chars().count() <= PREVIEW_LEN + 3);
    }
}
