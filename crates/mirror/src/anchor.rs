//! Invisible anchor tokens appended to mirrored messages.
//!
//! Every mirrored message ends with a timestamp anchor: a link whose label
//! is an invisible character and whose URL is a dummy host carrying the
//! origin message's timestamp. It renders as nothing but lets later events
//! (rewrites, reaction sync) locate a message's mirrored counterpart.
//! Quoting messages additionally carry a quote anchor on their last line,
//! deep-linking the quoted origin message.

/// Dummy URI prefix carrying the origin timestamp; never meant to resolve.
pub const TIMESTAMP_ANCHOR_URI: &str = "http://example.invalid/?origin_message_ts=";

/// Hangul filler: renders as nothing in the relay client.
const INVISIBLE_LABEL: char = '\u{3164}';

/// Trailing token appended to every mirrored message.
#[must_use]
pub fn timestamp_anchor(timestamp: &str) -> String {
    format!(" <{TIMESTAMP_ANCHOR_URI}{timestamp}|{INVISIBLE_LABEL}>")
}

/// Recover the origin timestamp from a mirrored message's text.
#[must_use]
pub fn extract_timestamp(text: &str) -> Option<&str> {
    let start = text.rfind(TIMESTAMP_ANCHOR_URI)? + TIMESTAMP_ANCHOR_URI.len();
    let rest = &text[start..];
    let end = rest.find('|')?;
    Some(&rest[..end])
}

/// Last-line token deep-linking the message a mirrored message quoted.
#[must_use]
pub fn quote_anchor(link: &str) -> String {
    format!("(ref: <{link}>)")
}

fn is_quote_anchor(line: &str) -> bool {
    line.starts_with("(ref: <https:") && line.ends_with(">)")
}

/// The quote prefix and trailing quote anchor wrapped around quoting
/// messages, kept aside so rewrites only touch the inner content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteWrapper {
    pub quote_line: String,
    pub anchor_line: String,
}

/// Split wrapped content into its inner body and the wrapper, when the last
/// line is a quote anchor.
#[must_use]
pub fn unwrap_quoted(content: &str) -> (String, Option<QuoteWrapper>) {
    let lines: Vec<&str> = content.split('\n').collect();
    match lines.as_slice() {
        [first, inner @ .., last] if is_quote_anchor(last) => (
            inner.join("\n"),
            Some(QuoteWrapper {
                quote_line: (*first).to_string(),
                anchor_line: (*last).to_string(),
            }),
        ),
        _ => (content.to_string(), None),
    }
}

/// Reattach a wrapper around rewritten inner content.
#[must_use]
pub fn rewrap(inner: &str, wrapper: &QuoteWrapper) -> String {
    format!("{}\n{inner}\n{}", wrapper.quote_line, wrapper.anchor_line)
}

/// Recover the primary id from a mirrored display name `Nickname(PrimaryID)`.
#[must_use]
pub fn primary_id_from_display(name: &str) -> Option<&str> {
    let (_, rest) = name.rsplit_once('(')?;
    let (primary, _) = rest.split_once(')')?;
    Some(primary)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_anchor_round_trips() {
        let text = format!("hello{}", timestamp_anchor("1700000000.123"));
        assert_eq!(extract_timestamp(&text), Some("1700000000.123"));
    }

    #[test]
    fn missing_anchor_extracts_nothing() {
        assert_eq!(extract_timestamp("plain message"), None);
    }

    #[test]
    fn unwrap_and_rewrap_preserve_the_wrapper() {
        let anchor = quote_anchor("https://origin.example/channels/g/c/m");
        let wrapped = format!("> quoted line\ninner body\n{anchor}");
        let (inner, wrapper) = unwrap_quoted(&wrapped);
        assert_eq!(inner, "inner body");
        let wrapper = wrapper.expect("wrapper detected");
        assert_eq!(rewrap("edited body", &wrapper), wrapped.replace("inner body", "edited body"));
    }

    #[test]
    fn unwrapped_content_passes_through() {
        let (inner, wrapper) = unwrap_quoted("line one\nline two");
        assert_eq!(inner, "line one\nline two");
        assert!(wrapper.is_none());
    }

    #[test]
    fn multi_line_inner_body_survives() {
        let anchor = quote_anchor("https://origin.example/channels/g/c/m");
        let wrapped = format!("> q\na\nb\n{anchor}");
        let (inner, _) = unwrap_quoted(&wrapped);
        assert_eq!(inner, "a\nb");
    }

    #[test]
    fn display_name_yields_primary_id() {
        assert_eq!(primary_id_from_display("Ali(alice)"), Some("alice"));
        assert_eq!(primary_id_from_display("nested (x) name(bob)"), Some("bob"));
        assert_eq!(primary_id_from_display("no-primary"), None);
    }
}
