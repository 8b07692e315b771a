//! Gmail-style query parser
//!
//! Reads back the syntax [`SearchQuery`](super::SearchQuery) renders, so
//! [`InMemoryMailbox`](crate::mailbox::InMemoryMailbox) can evaluate listing
//! queries without a server.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// One query token: an optional `key:` prefix, then a quoted or bare value
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:([A-Za-z]+):)?(?:"([^"]*)"?|(\S+))"#).expect("valid token regex")
});

const DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// Parsed query with structured components
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    /// Free-text words and phrases
    pub terms: Vec<String>,
    pub from: Vec<String>,
    pub to: Vec<String>,
    /// Phrases that must appear in the subject
    pub subject: Vec<String>,
    /// Exclusive upper bound
    pub before: Option<DateTime<Utc>>,
    /// Inclusive lower bound
    pub after: Option<DateTime<Utc>>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy)]
enum Operator {
    From,
    To,
    Subject,
    Before,
    After,
}

impl Operator {
    fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "from" => Some(Self::From),
            "to" => Some(Self::To),
            "subject" => Some(Self::Subject),
            "before" => Some(Self::Before),
            "after" => Some(Self::After),
            _ => None,
        }
    }
}

/// Parse a search query string
///
/// Recognizes `from:`, `to:`, `subject:`, `before:` and `after:` with bare or
/// quoted values. Dates are `YYYY/MM/DD` or `YYYY-MM-DD`. Unknown operators
/// and operators without a value are kept as free text.
pub fn parse_query(input: &str) -> ParsedQuery {
    let mut query = ParsedQuery::default();

    for caps in TOKEN.captures_iter(input) {
        let whole = &caps[0];
        let value = token_value(&caps);
        let operator = caps
            .get(1)
            .and_then(|key| Operator::from_key(key.as_str()))
            .filter(|_| !value.is_empty());

        match operator {
            Some(Operator::From) => query.from.push(value),
            Some(Operator::To) => query.to.push(value),
            Some(Operator::Subject) => query.subject.push(value),
            Some(Operator::Before) => query.before = parse_date(&value).or(query.before),
            Some(Operator::After) => query.after = parse_date(&value).or(query.after),
            None if caps.get(1).is_some() => query.terms.push(whole.to_string()),
            None if !value.is_empty() => query.terms.push(value),
            None => {}
        }
    }

    query
}

fn token_value(caps: &Captures<'_>) -> String {
    caps.get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Midnight UTC of a `YYYY/MM/DD` or `YYYY-MM-DD` date
fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight))
}
