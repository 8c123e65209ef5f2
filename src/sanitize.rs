use std::sync::LazyLock;

use regex::Regex;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\d+\]").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Make text safe for a delimiter-sensitive CSV field.
///
/// Quotes are dropped, line terminators become spaces, commas become
/// semicolons and citation markers such as `[12]` are removed. Removal
/// repeats until no marker is left, since deleting `[1]` out of `[[1]2]`
/// exposes a new one. Applying it twice gives the same result as once.
pub fn clean_text(raw: &str) -> String {
    let mut text = raw
        .replace('"', "")
        .replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
        .replace(',', ";");

    while CITATION_RE.is_match(&text) {
        text = CITATION_RE.replace_all(&text, "").into_owned();
    }

    text.trim().to_string()
}

/// Remove markup tags and decode the handful of entities a page title can carry.
pub fn strip_tags(raw: &str) -> String {
    TAG_RE
        .replace_all(raw, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Escape a literal value so it fits on one statement line between double quotes.
pub fn escape_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Text built from the pieces that trip the cleaner up: brackets that
    /// nest around digits, quotes, commas and every kind of line break.
    fn noisy_text() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just("[".to_string()),
                Just("]".to_string()),
                "[0-9]{1,3}",
                Just("\"".to_string()),
                Just(",".to_string()),
                Just("\r\n".to_string()),
                Just("\r".to_string()),
                Just("\n".to_string()),
                "[a-z ]{1,4}",
            ],
            0..40,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn clean_text_is_idempotent(raw in noisy_text()) {
            let once = clean_text(&raw);
            prop_assert_eq!(clean_text(&once), once);
        }

        #[test]
        fn clean_text_leaves_no_markers_or_delimiters(raw in noisy_text()) {
            let out = clean_text(&raw);
            prop_assert!(!CITATION_RE.is_match(&out), "marker left in {:?}", out);
            prop_assert!(!out.contains(['"', ',', '\r', '\n']), "delimiter left in {:?}", out);
        }

        #[test]
        fn clean_text_handles_arbitrary_input(raw in "\\PC*") {
            let once = clean_text(&raw);
            prop_assert!(!CITATION_RE.is_match(&once));
            prop_assert_eq!(clean_text(&once), once);
        }
    }
}
