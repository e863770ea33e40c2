//! Caption scrubbing applied before an upload is forwarded.
//!
//! Uploaded media often arrives with promotional links and mentions baked
//! into the caption; the stored copy keeps only the descriptive text so the
//! search index stays clean.

use std::sync::OnceLock;

use regex::Regex;

struct Rules {
    markdown_link: Regex,
    html_link: Regex,
    mention: Regex,
    url: Regex,
    whitespace: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        // Patterns are static literals; construction cannot fail.
        markdown_link: Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap(),
        html_link: Regex::new(r#"<a\s+href="[^"]+">([^<]+)</a>"#).unwrap(),
        mention: Regex::new(r"@\w+").unwrap(),
        url: Regex::new(r"(?i)(https?://\S+|www\.\S+)").unwrap(),
        whitespace: Regex::new(r"\s+").unwrap(),
    })
}

/// Strip link wrappers, URLs and mentions, keeping the visible text.
pub fn clean_caption(caption: &str) -> String {
    let rules = rules();
    let text = rules.markdown_link.replace_all(caption, "$1");
    let text = rules.html_link.replace_all(&text, "$1");
    let text = rules.mention.replace_all(&text, "");
    let text = rules.url.replace_all(&text, "");
    let text = rules.whitespace.replace_all(&text, " ");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_links_keep_label() {
        assert_eq!(clean_caption("[My Movie](https://spam.example)"), "My Movie");
    }

    #[test]
    fn html_links_keep_label() {
        assert_eq!(
            clean_caption(r#"watch <a href="https://x.example">here</a> now"#),
            "watch here now"
        );
    }

    #[test]
    fn urls_and_mentions_are_dropped() {
        assert_eq!(
            clean_caption("Great film https://t.example/abc join @somechannel"),
            "Great film join"
        );
        assert_eq!(clean_caption("see www.spam.example now"), "see now");
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(clean_caption("  a   b  \n c "), "a b c");
    }

    #[test]
    fn plain_captions_pass_through() {
        assert_eq!(clean_caption("funny cat"), "funny cat");
    }
}
