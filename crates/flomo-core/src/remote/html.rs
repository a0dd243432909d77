//! Memo HTML to plain text

use std::sync::LazyLock;

use regex::{Captures, Regex};

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("Invalid regex"));
static BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|div|li|h[1-6]|blockquote|pre)\s*>").expect("Invalid regex")
});
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<li(\s[^>]*)?>").expect("Invalid regex"));
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos|nbsp);").expect("Invalid regex")
});
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid regex"));

/// Convert memo HTML into plain text.
///
/// Paragraphs and `<br>` become line breaks, list items become `- ` lines,
/// other markup is dropped and entities are decoded. Plain text passes
/// through unchanged apart from trailing whitespace.
///
/// # Examples
///
/// ```
/// use flomo_core::remote::html_to_text;
///
/// let text = html_to_text("<p>Buy milk</p><ul><li>2%</li><li>oat</li></ul>");
/// assert_eq!(text, "Buy milk\n- 2%\n- oat");
/// ```
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let text = LINE_BREAK.replace_all(html, "\n");
    let text = BLOCK_END.replace_all(&text, "\n");
    let text = LIST_ITEM.replace_all(&text, "- ");
    let text = ANY_TAG.replace_all(&text, "");
    let text = decode_entities(&text);

    let text = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN.replace_all(&text, "\n\n").trim().to_string()
}

/// Decode entities in one left-to-right pass so decoded text is never
/// decoded again.
fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            let decoded = match &caps[1] {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                numeric => decode_numeric(&numeric[1..]),
            };
            decoded.map_or_else(|| caps[0].to_string(), |ch| ch.to_string())
        })
        .into_owned()
}

fn decode_numeric(raw: &str) -> Option<char> {
    let code = match raw.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => raw.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_become_lines() {
        assert_eq!(
            html_to_text("<p>Hello</p><p>World #idea</p>"),
            "Hello\nWorld #idea"
        );
    }

    #[test]
    fn line_breaks_and_blank_runs() {
        assert_eq!(
            html_to_text("<p>a<br>b<br/></p><p></p><p></p><p>c</p>"),
            "a\nb\n\nc"
        );
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(
            html_to_text("<p>1 &lt; 2 &amp;&amp; &quot;x&quot; &#39;y&#39; &#x4F60;&#22909;</p>"),
            "1 < 2 && \"x\" 'y' 你好"
        );
        assert_eq!(html_to_text("&amp;lt;"), "&lt;");
    }

    #[test]
    fn decoded_text_is_not_decoded_again() {
        assert_eq!(html_to_text("<p>&#38;lt;b&#38;gt;</p>"), "&lt;b&gt;");
        assert_eq!(html_to_text("<p>&#38;amp;</p>"), "&amp;");
        assert_eq!(html_to_text("<p>&amp;#60;</p>"), "&#60;");
    }

    #[test]
    fn unknown_or_invalid_entities_are_kept() {
        assert_eq!(html_to_text("&copy; &#xD800; &#X41;"), "&copy; &#xD800; A");
    }

    #[test]
    fn attributes_and_inline_tags_are_stripped() {
        assert_eq!(
            html_to_text(r#"<p><strong>bold</strong> <a href="https://x.y">link</a></p>"#),
            "bold link"
        );
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(html_to_text("just text\nsecond"), "just text\nsecond");
    }
}
