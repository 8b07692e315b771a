//! Gmail search queries and paginated message discovery

mod enumerate;
mod query;
mod query_parser;

pub use enumerate::{Enumeration, Enumerator};
pub use query::{Direction, SearchQuery, sanitize};
pub use query_parser::{ParsedQuery, parse_query};
