//! The `ss/pattern/replacement/` rewrite command grammar.
//!
//! Delimiter-split tokenizer with single-character-lookback escaping: a
//! segment ending in one backslash joins the next segment with the `/`
//! restored; a segment ending in a doubled backslash keeps one literal
//! backslash and the boundary stands. Substitution is literal substring
//! replace-all, never pattern matching.

/// A parsed rewrite command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteCommand {
    pub pattern: String,
    pub replacement: String,
}

/// Result of trying to read a message body as a rewrite command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteParse {
    /// The body does not start with the command prefix.
    NotACommand,
    /// Command prefix present but the expression is malformed.
    Malformed,
    Command(RewriteCommand),
}

const COMMAND_PREFIX: &str = "ss/";

/// Parse a message body. Leading/trailing whitespace and one trailing `/`
/// are tolerated; exactly a pattern and a replacement must remain.
#[must_use]
pub fn parse_command(body: &str) -> RewriteParse {
    let Some(rest) = body.trim().strip_prefix(COMMAND_PREFIX) else {
        return RewriteParse::NotACommand;
    };

    let mut segments = split_escaped(rest);
    // The optional trailing delimiter leaves one empty segment behind.
    if segments.len() > 2 && segments.last().is_some_and(String::is_empty) {
        segments.pop();
    }

    match <[String; 2]>::try_from(segments) {
        Ok([pattern, replacement]) if !pattern.is_empty() => {
            RewriteParse::Command(RewriteCommand {
                pattern,
                replacement,
            })
        },
        _ => RewriteParse::Malformed,
    }
}

/// Replace every occurrence of the pattern, as a literal substring.
#[must_use]
pub fn apply(command: &RewriteCommand, content: &str) -> String {
    content.replace(&command.pattern, &command.replacement)
}

fn split_escaped(input: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut pending: Option<String> = None;

    for raw in input.split('/') {
        let mut segment = match pending.take() {
            Some(mut joined) => {
                joined.push('/');
                joined.push_str(raw);
                joined
            },
            None => raw.to_string(),
        };

        if segment.ends_with('\\') && !segment.ends_with("\\\\") {
            segment.pop();
            pending = Some(segment);
            continue;
        }
        if segment.ends_with("\\\\") {
            // Doubled escape: keep one literal backslash, boundary stands.
            segment.pop();
        }
        segments.push(segment);
    }

    // A dangling escape at the very end has nothing to join; drop it so the
    // segment count comes up short and the expression reads as malformed.
    segments
}
