//! Snippet cleanup: search snippets arrive as HTML fragments with `<b>`
//! highlights and escaped entities.

use std::sync::LazyLock;

use regex_lite::{Captures, Regex};

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,15});")
        .expect("entity pattern is valid")
});

/// Ellipsis appended to truncated text.
pub const ELLIPSIS: char = '…';

/// Unescape entities, strip tags, and collapse whitespace.
pub fn clean_snippet(raw: &str) -> String {
    let unescaped = unescape_html(raw.trim());
    let stripped = TAG_RE.replace_all(&unescaped, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to `max_chars` characters plus an ellipsis. `0` means no limit.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push(ELLIPSIS);
    out
}

/// Decode named and numeric character references. Unknown names are kept.
pub fn unescape_html(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let body = &caps[1];
            decode_entity(body).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let ch = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "laquo" => '«',
        "raquo" => '»',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "sect" => '§',
        "para" => '¶',
        "deg" => '°',
        "plusmn" => '±',
        "times" => '×',
        "micro" => 'µ',
        _ => return None,
    };
    Some(ch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_highlight_tags_and_entities() {
        let raw = "  A <b>widget</b> &amp; its <i>clamp</i>&nbsp;assembly &#8212; claim&#x20;1 ";
        assert_eq!(clean_snippet(raw), "A widget & its clamp assembly — claim 1");
    }

    #[test]
    fn escaped_tags_are_removed_after_unescaping() {
        assert_eq!(clean_snippet("x &lt;b&gt;y&lt;/b&gt; z"), "x y z");
    }

    #[test]
    fn collapses_all_whitespace_runs() {
        assert_eq!(clean_snippet("one\n\n two\t\tthree"), "one two three");
    }

    #[test]
    fn unknown_entities_are_left_alone() {
        assert_eq!(unescape_html("&bogus; &amp"), "&bogus; &amp");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("ééééé", 3), "ééé…");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exact", 5), "exact");
        assert_eq!(truncate_chars("anything", 0), "anything");
    }
}
