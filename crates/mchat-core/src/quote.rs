//! Quoted reply removal.
//!
//! Mail clients append the conversation so far to every reply. Two markers
//! are recognized:
//!
//! - a line starting with `___` (Outlook's separator rule), cut at that line
//! - a line starting with `>`, cut three lines earlier to drop the
//!   "On ... wrote:" attribution above it
//!
//! The earliest cut point wins.

/// Lines above a `>` line that belong to the attribution.
const ATTRIBUTION_LINES: usize = 3;

/// Removes trailing quoted text.
///
/// The text is returned unchanged if no marker is found or the cut would
/// remove everything; otherwise the kept part is trimmed. A `>` within the
/// first three lines puts the cut at the start, so a later `___` line does
/// not shorten the text.
///
/// ```
/// use mchat_core::quote::strip;
///
/// let reply = "Who's There?\n\nOn 2006-01-02 MChat wrote:\n\n> Knock Knock!\n";
/// assert_eq!(strip(reply), "Who's There?");
/// ```
#[must_use]
pub fn strip(text: &str) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();

    let mut cut: Option<usize> = None;
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("___") {
            cut = Some(cut.map_or(i, |c| c.min(i)));
            break;
        }
        if line.starts_with('>') && cut.is_none() {
            cut = Some(i.saturating_sub(ATTRIBUTION_LINES));
        }
    }

    match cut {
        None | Some(0) => text.to_string(),
        Some(at) => lines[..at].concat().trim().to_string(),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_gmail_reply() {
        let text = "Who's There?\n\nOn 2006-01-02 MChat wrote:\n\n> Knock Knock!\n";
        assert_eq!(strip(text), "Who's There?");
    }

    #[test]
    fn test_outlook_rule() {
        let text = "Sure, see you then\r\n\r\n________________________________\r\nFrom: Bob\r\nSent: today\r\n";
        assert_eq!(strip(text), "Sure, see you then");
    }

    #[test]
    fn test_no_marker_is_unchanged() {
        let text = "  just a message\n with lines \n";
        assert_eq!(strip(text), text);
    }

    #[test]
    fn test_early_quote_shadows_later_separator() {
        // The quote clamps the cut to line 0, which is earlier than `___`.
        let text = "ok\n> q\n___\nsig";
        assert_eq!(strip(text), text);
    }

    #[test]
    fn test_cut_at_start_is_unchanged() {
        let text = "> quoted only\n> more\n";
        assert_eq!(strip(text), text);
        let text = "hi\n> quoted\n";
        assert_eq!(strip(text), text);
    }

    #[test]
    fn test_earliest_marker_wins() {
        let text = "one\ntwo\nthree\nfour\n> q\nfive\n____\nsix\n";
        assert_eq!(strip(text), "one");

        let text = "one\n___\ntwo\nthree\nfour\nfive\n> q\n";
        assert_eq!(strip(text), "one");
    }

    #[test]
    fn test_later_quote_does_not_move_cut() {
        let text = "a\nb\nc\nd\n> q1\ne\nf\ng\nh\n> q2\n";
        assert_eq!(strip(text), "a");
    }

    proptest! {
        #[test]
        fn prop_never_grows(text in "[a-z>_ \n]{0,200}") {
            prop_assert!(strip(&text).len() <= text.len());
        }

        #[test]
        fn prop_result_is_part_of_input(text in "[a-z>_ \n]{0,200}") {
            prop_assert!(text.contains(strip(&text).as_str()));
        }

        #[test]
        fn prop_unquoted_text_is_unchanged(text in "[a-z ]{0,40}(\n[a-z ]{0,40}){0,8}") {
            prop_assert_eq!(strip(&text), text);
        }

        #[test]
        fn prop_idempotent(text in "[a-z>_ \n]{0,200}") {
            let once = strip(&text);
            prop_assert_eq!(strip(&once), once);
        }
    }
}
