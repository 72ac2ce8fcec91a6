//! Web search and page acquisition.
//!
//! - [`search::SearchProvider`] and the Brave implementation ([`brave`])
//! - [`extract::ContentExtractor`], fetching pages and reducing them to text
//! - [`readability`], the reader-mode heuristics behind that reduction

pub mod brave;
pub mod extract;
pub mod readability;
pub mod search;

pub use brave::BraveSearch;
pub use extract::{ContentExtractor, ExtractError, PageExtractor, PageExtractorConfig};
pub use search::{SearchError, SearchProvider};
