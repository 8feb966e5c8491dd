//! Page retrieval and extraction.
//!
//! - [`fetch`]: multi-strategy HTML retrieval
//! - [`profile`]: per-site selector profiles
//! - [`page`]: full-page parser built on the [`fields`] parsers
//! - [`sanitize`]: whitelist HTML cleaner
//! - [`sitemap`]: review URL discovery

pub(crate) mod dom;
pub mod fetch;
pub mod fields;
pub mod page;
pub mod profile;
pub mod sanitize;
pub mod sitemap;

pub use fetch::{FetchError, HtmlFetcher, ResilientFetcher, RetryPolicy};
pub use page::{parse_page, parse_rating, ParseError};
pub use profile::{ProfileRegistry, SelectorProfile};
pub use sanitize::sanitize_fragment;
