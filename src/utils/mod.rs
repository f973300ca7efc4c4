//! Utility modules supporting catalog and resolver operations.
//!
//! - [`HttpClient`]: shared reqwest client with crate user agent
//! - [`slugify`]: derive a URL-safe slug from a book title
//! - [`key_suffix`]: disambiguating slug suffix derived from a catalog key

mod http;
mod slug;

pub use http::HttpClient;
pub use slug::{key_suffix, slugify};
