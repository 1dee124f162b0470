//! Inline markdown conversion for a single line of text.
//!
//! Works on already block-classified text: the scanner hands over heading
//! text, list item content, table cells and paragraph lines. XML escaping
//! runs first, then the emphasis/code/link patterns rewrite the escaped
//! text, so entity replacements are never re-escaped.

use std::sync::LazyLock;

use regex::Regex;

static BOLD_STAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static BOLD_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__(.+?)__").unwrap());
static ITALIC_STAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.+?)\*").unwrap());
static ITALIC_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_(.+?)_").unwrap());
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`(.+?)`").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(.+?)\]\((.+?)\)").unwrap());

/// Escape the five XML special characters.
#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}

/// Convert inline markdown spans to storage format markup.
///
/// Patterns apply in a fixed order: bold (`**`, `__`), italic (`*`, `_`),
/// inline code, then links. The patterns are non-greedy and do not nest;
/// overlapping emphasis yields whatever this order produces.
#[must_use]
pub fn convert_inline(text: &str) -> String {
    let escaped = escape_xml(text);
    let bolded = BOLD_STAR_RE.replace_all(&escaped, "<strong>$1</strong>");
    let bolded = BOLD_UNDERSCORE_RE.replace_all(&bolded, "<strong>$1</strong>");
    let emphasized = ITALIC_STAR_RE.replace_all(&bolded, "<em>$1</em>");
    let emphasized = ITALIC_UNDERSCORE_RE.replace_all(&emphasized, "<em>$1</em>");
    let coded = CODE_RE.replace_all(&emphasized, "<code>$1</code>");
    LINK_RE
        .replace_all(&coded, r#"<a href="$2">$1</a>"#)
        .into_owned()
}
