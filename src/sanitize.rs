//! Episode body cleanup: turns the inner HTML of the content node into plain prose.
//!
//! The rules run in a fixed order; each one relies on the normalization done by the
//! ones before it (e.g. tag stripping assumes paragraph and line-break tags are
//! already newlines).

use regex::Regex;
use std::sync::LazyLock;

static DIV_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</?div\b[^>]*>").unwrap());

static P_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</?p\b[^>]*>").unwrap());

static BR_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<\s*br\b[^>]*>").unwrap());

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());

static NEWLINE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());

/// Named entities decoded by literal substitution. `&amp;` is last so that an
/// escaped entity such as `&amp;lt;` decodes once, to `&lt;`.
const ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#039;", "'"),
    ("&nbsp;", " "),
    ("&ndash;", "\u{2013}"),
    ("&mdash;", "\u{2014}"),
    ("&lsquo;", "\u{2018}"),
    ("&rsquo;", "\u{2019}"),
    ("&ldquo;", "\u{201C}"),
    ("&rdquo;", "\u{201D}"),
    ("&amp;", "&"),
];

/// Convert a raw HTML fragment to normalized text. Never fails; malformed markup
/// just loses whatever looks like a tag.
pub fn sanitize(raw: &str) -> String {
    let text = DIV_TAG.replace_all(raw, "");
    let text = P_TAG.replace_all(&text, "\n");
    let text = BR_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = SPACE_RUN.replace_all(&text, " ");
    let text = NEWLINE_RUN.replace_all(&text, "\n\n");
    let text = decode_entities(&text);
    // Adjacent `&nbsp;` decode into a fresh space run.
    SPACE_RUN.replace_all(&text, " ").trim().to_string()
}

fn decode_entities(s: &str) -> String {
    ENTITIES
        .iter()
        .fold(s.to_string(), |acc, (entity, ch)| acc.replace(entity, ch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_become_newlines() {
        let out = sanitize("<p>a</p><p>b</p>");
        assert!(!out.contains("<p>"));
        assert!(out.contains('a') && out.contains('b'));
        let between = &out[out.find('a').unwrap() + 1..out.find('b').unwrap()];
        assert!(!between.is_empty());
        assert!(between.chars().all(|c| c == '\n'));
    }

    #[test]
    fn nbsp_becomes_space() {
        assert_eq!(sanitize("a&nbsp;b"), "a b");
    }

    #[test]
    fn divs_are_unwrapped() {
        assert_eq!(
            sanitize(r#"<div id="novel_content"><div class="x">text</div></div>"#),
            "text"
        );
    }

    #[test]
    fn br_variants_become_newlines() {
        assert_eq!(sanitize("a<br>b<br/>c<br />d<BR  />e"), "a\nb\nc\nd\ne");
        assert_eq!(sanitize(r#"one<br class="x">two<br clear="all"/>three"#), "one\ntwo\nthree");
    }

    #[test]
    fn br_prefix_does_not_match_other_tags() {
        assert_eq!(sanitize("a<bra>b"), "ab");
    }

    #[test]
    fn remaining_tags_are_stripped_with_attributes() {
        assert_eq!(
            sanitize(r#"<span style="color:red">red</span> and <img src="x.png"/>"#),
            "red and"
        );
    }

    #[test]
    fn pre_is_not_mistaken_for_p() {
        assert_eq!(sanitize("<pre>code</pre>"), "code");
    }

    #[test]
    fn space_runs_collapse() {
        assert_eq!(sanitize("one     two  three"), "one two three");
    }

    #[test]
    fn newline_runs_cap_at_two() {
        assert_eq!(sanitize("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(sanitize("<p>a</p>\n<p>b</p>"), "a\n\nb");
    }

    #[test]
    fn entity_table_decodes() {
        assert_eq!(
            sanitize("&lt;&gt;&amp;&quot;&apos;&#039;&ndash;&mdash;&lsquo;&rsquo;&ldquo;&rdquo;"),
            "<>&\"''\u{2013}\u{2014}\u{2018}\u{2019}\u{201C}\u{201D}"
        );
    }

    #[test]
    fn unknown_entities_are_left_alone() {
        assert_eq!(sanitize("&hellip; &#8230; &copy;"), "&hellip; &#8230; &copy;");
    }

    #[test]
    fn escaped_entity_decodes_once() {
        assert_eq!(sanitize("&amp;lt;"), "&lt;");
    }

    #[test]
    fn empty_and_whitespace_only_input() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("<div>\n  <p> </p>\n</div>"), "");
    }

    #[test]
    fn unterminated_tag_degrades_gracefully() {
        assert_eq!(sanitize("text <b"), "text <b");
    }

    #[test]
    fn idempotent_on_tag_free_input() {
        let samples = [
            "plain text",
            "two  spaces   here",
            "line\n\n\n\nbreaks",
            "quote &quot;this&quot; &ndash; that",
            "  padded  \n\n\n  ",
            "a&nbsp;b",
            "a&nbsp;&nbsp;b",
            "x &nbsp; &nbsp;y",
            "\u{C548}\u{B155}\u{D558}\u{C138}\u{C694}\n\n\u{BC18}\u{AC11}\u{C2B5}\u{B2C8}\u{B2E4}",
        ];
        for s in samples {
            let once = sanitize(s);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn adjacent_nbsp_collapse_to_one_space() {
        assert_eq!(sanitize("a&nbsp;&nbsp;b"), "a b");
        assert_eq!(sanitize("a &nbsp;&nbsp; b"), "a b");
    }

    #[test]
    fn escaped_markup_decodes_to_literal_text() {
        // Decoding runs last, so escaped markup survives one pass as text and a
        // second pass would strip it.
        let once = sanitize("&lt;b&gt;bold");
        assert_eq!(once, "<b>bold");
        assert_eq!(sanitize(&once), "bold");
    }

    #[test]
    fn realistic_episode_fragment() {
        let raw = r#"<div class="content"><p>&ldquo;Hello,&rdquo; she said.</p>
<p>He   nodded.<br>Then left.</p><p></p></div>"#;
        assert_eq!(
            sanitize(raw),
            "\u{201C}Hello,\u{201D} she said.\n\nHe nodded.\nThen left."
        );
    }
}
