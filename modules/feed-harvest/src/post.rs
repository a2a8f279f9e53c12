// Post records and the content fingerprint used to deduplicate them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of characters of normalized text that make up a fingerprint.
pub const FINGERPRINT_CHARS: usize = 150;

/// One collected post. Created once, at first extraction, and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub fingerprint: String,
    pub content: String,
    /// Outer HTML of the post's content container at extraction time.
    pub raw_markup: String,
    pub collected_at: DateTime<Utc>,
}

impl PostRecord {
    /// Build a record from the post's message text. Returns `None` when the
    /// text is blank once whitespace is collapsed.
    pub fn from_text(text: &str, raw_markup: String, collected_at: DateTime<Utc>) -> Option<Self> {
        let content = normalize_text(text);
        if content.is_empty() {
            return None;
        }

        Some(Self {
            fingerprint: char_prefix(&content, FINGERPRINT_CHARS).to_string(),
            content,
            raw_markup,
            collected_at,
        })
    }

    /// First `max_chars` characters of the content.
    pub fn preview(&self, max_chars: usize) -> &str {
        char_prefix(&self.content, max_chars)
    }
}

/// Trim and collapse every whitespace run to a single space.
pub fn normalize_text(text: &str) -> String {
    text.split(is_text_space)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace as the browser's text APIs see it: the byte-order mark counts,
/// NEL (U+0085) does not.
fn is_text_space(c: char) -> bool {
    c == '\u{feff}' || (c.is_whitespace() && c != '\u{85}')
}

/// Dedup key for a piece of post text.
pub fn fingerprint(text: &str) -> String {
    char_prefix(&normalize_text(text), FINGERPRINT_CHARS).to_string()
}

fn char_prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_collapses_and_trims_whitespace() {
        assert_eq!(fingerprint("  Hello   world  \n\n"), "Hello world");
    }

    #[test]
    fn long_text_keeps_full_content_but_truncates_fingerprint() {
        let text = format!("  {}\n\t{}  ", "a".repeat(120), "b".repeat(120));
        let post = PostRecord::from_text(&text, "<div></div>".into(), Utc::now()).unwrap();

        assert_eq!(post.content.chars().count(), 241);
        assert_eq!(post.fingerprint.chars().count(), FINGERPRINT_CHARS);
        assert!(post.content.starts_with(&post.fingerprint));
        assert_eq!(post.fingerprint, fingerprint(&text));
    }

    #[test]
    fn fingerprint_counts_characters_not_bytes() {
        let text = "é".repeat(200);
        let fp = fingerprint(&text);
        assert_eq!(fp.chars().count(), FINGERPRINT_CHARS);
        assert_eq!(fp.len(), FINGERPRINT_CHARS * 2);
    }

    #[test]
    fn blank_text_produces_no_record() {
        assert!(PostRecord::from_text("", String::new(), Utc::now()).is_none());
        assert!(PostRecord::from_text(" \n\u{a0}\t ", String::new(), Utc::now()).is_none());
    }

    #[test]
    fn byte_order_mark_is_whitespace() {
        assert!(PostRecord::from_text("\u{feff}", String::new(), Utc::now()).is_none());
        assert_eq!(fingerprint("\u{feff}Garage sale\u{feff} Sunday "), "Garage sale Sunday");
    }

    #[test]
    fn next_line_is_kept_as_text() {
        assert_eq!(normalize_text("a\u{85}b  c"), "a\u{85}b c");
    }

    #[test]
    fn preview_is_char_bounded() {
        let post = PostRecord::from_text("Job opening — café staff needed", String::new(), Utc::now()).unwrap();
        assert_eq!(post.preview(14), "Job opening — ");
        assert_eq!(post.preview(500), post.content);
    }
}
