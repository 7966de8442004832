//! Page retrieval and parsing: the document-source port, the HTTP client behind it,
//! the listing-page link collector, and the episode content fetcher.

mod client;
mod error;

pub mod episode;
pub mod listing;

pub use client::{PoliteClient, PoliteClientBuilder};
pub use episode::{Confirm, EpisodeFetcher};
pub use error::ScraperError;
pub use listing::{canonical_listing_url, collect_episode_links, extract_title, listing_page_url};

use scraper::Selector;

/// Something that can hand back the HTML of a URL.
///
/// `PoliteClient` is the real implementation; tests script responses per URL.
pub trait DocumentSource {
    fn fetch_html(&mut self, url: &str) -> Result<String, ScraperError>;
}

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
pub(crate) fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::Selector {
        selector: sel.to_string(),
        reason: e.to_string(),
    })
}
