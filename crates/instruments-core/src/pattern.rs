//! Label discovery by dotted wildcard.
//!
//! Labels are dot-separated (`api.users.get`). A pattern is split the same
//! way; a `*` segment matches anything, including a segment the label does
//! not have, and label segments past the end of the pattern are ignored.
//! Inside a segment `*` matches any run of characters (`user*` matches
//! `users`), but such a segment needs a label segment to match against.
//! A pattern without any `*` must equal the label exactly.

/// Pattern-matching capability used by `find_*_metrics`.
pub trait LabelMatcher: Send + Sync {
    fn matches(&self, pattern: &str, label: &str) -> bool;
}

/// Labels accepted by `pattern`, in input order.
pub fn filter_labels<'a, I>(matcher: &dyn LabelMatcher, pattern: &str, labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    labels
        .into_iter()
        .filter(|l| matcher.matches(pattern, l))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DottedWildcard;

const SEPARATOR: char = '.';
const WILD: &str = "*";

impl LabelMatcher for DottedWildcard {
    fn matches(&self, pattern: &str, label: &str) -> bool {
        if !pattern.contains(WILD) {
            return pattern == label;
        }

        let segments: Vec<&str> = label.split(SEPARATOR).collect();
        pattern
            .split(SEPARATOR)
            .enumerate()
            .all(|(i, part)| part == WILD || segments.get(i).is_some_and(|s| glob(part, s)))
    }
}

fn glob(part: &str, segment: &str) -> bool {
    if !part.contains(WILD) {
        return part == segment;
    }

    let mut pieces = part.split(WILD);
    let head = pieces.next().unwrap_or_default();
    let Some(mut rest) = segment.strip_prefix(head) else {
        return false;
    };
    let mut pieces: Vec<&str> = pieces.collect();
    let tail = pieces.pop().unwrap_or_default();
    for piece in pieces {
        match rest.find(piece) {
            Some(at) => rest = &rest[at + piece.len()..],
            None => return false,
        }
    }
    rest.ends_with(tail)
}
