//! Structured search queries rendered to Gmail query syntax

use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Characters that may be embedded in a query value verbatim
static UNSAFE_QUERY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s0-9']").expect("valid regex"));

/// Which side of a conversation a correspondent is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Messages sent to the correspondent
    To,
    /// Messages received from the correspondent
    From,
}

impl Direction {
    /// Both directions, in the order they are queried
    pub const ALL: [Direction; 2] = [Direction::To, Direction::From];

    /// Gmail search operator for this direction
    pub fn operator(self) -> &'static str {
        match self {
            Direction::To => "to",
            Direction::From => "from",
        }
    }
}

/// A Gmail search query
///
/// Free-text values are sanitized before rendering so that user content
/// (subjects, snippets) can never inject operators or unbalance quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Direction filter and address, e.g. `from:alice@example.com`
    pub correspondent: Option<(Direction, String)>,
    /// Phrase that must appear in the subject
    pub subject: Option<String>,
    /// Free-text phrases
    pub phrases: Vec<String>,
    /// Inclusive start day
    pub after: Option<NaiveDate>,
    /// Exclusive end day
    pub before: Option<NaiveDate>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match messages exchanged with `address` in the given direction
    pub fn correspondent(mut self, direction: Direction, address: impl Into<String>) -> Self {
        self.correspondent = Some((direction, address.into()));
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrases.push(phrase.into());
        self
    }

    /// Restrict to messages received on days in `[from, to)`
    pub fn date_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.after = Some(from);
        self.before = Some(to);
        self
    }

    /// Render to Gmail query syntax
    pub fn render(&self) -> String {
        let mut parts = Vec::new();

        if let Some((direction, address)) = &self.correspondent {
            parts.push(format!("{}:{}", direction.operator(), address));
        }
        if let Some(subject) = &self.subject {
            parts.push(format!("subject:\"{}\"", sanitize(subject)));
        }
        if let Some(after) = self.after {
            parts.push(format!("after:{}", after.format("%Y/%m/%d")));
        }
        if let Some(before) = self.before {
            parts.push(format!("before:{}", before.format("%Y/%m/%d")));
        }
        for phrase in &self.phrases {
            parts.push(format!("\"{}\"", sanitize(phrase)));
        }

        parts.join(" ")
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Replace every character outside word characters, whitespace, digits and
/// apostrophes with a space
pub fn sanitize(text: &str) -> String {
    UNSAFE_QUERY_CHARS.replace_all(text, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_query_syntax() {
        assert_eq!(sanitize("Re: \"hi\" (urgent)"), "Re   hi   urgent ");
        assert_eq!(sanitize("don't panic"), "don't panic");
        assert_eq!(sanitize("café 2024"), "café 2024");
    }

    #[test]
    fn test_render_correspondent() {
        let query = SearchQuery::new().correspondent(Direction::From, "alice@example.com");
        assert_eq!(query.render(), "from:alice@example.com");
    }

    #[test]
    fn test_render_duplicate_probe() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let query = SearchQuery::new()
            .subject("Re: lunch?")
            .date_range(day, day.succ_opt().unwrap())
            .phrase("See you at 12:30 \"sharp\"");
        assert_eq!(
            query.render(),
            "subject:\"Re  lunch \" after:2024/03/05 before:2024/03/06 \"See you at 12 30  sharp \""
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(SearchQuery::new().render(), "");
    }
}
