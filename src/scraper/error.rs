//! Shared error type for page retrieval and parsing.

use thiserror::Error;

/// Errors from fetching or parsing a listing or episode page.
///
/// Inside the pipeline these are soft failures: listing pages absorb them and episodes
/// route them into CAPTCHA recovery. Only the CLI's title lookup surfaces them as fatal.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead { url: String, source: reqwest::Error },

    #[error("Missing content container {selector} at {url}.")]
    MissingContent { selector: String, url: String },

    #[error("Episode at {url} has no text content.")]
    EmptyContent { url: String },

    #[error("Could not find the novel title on the listing page {url}.")]
    MissingTitle { url: String },

    #[error("Invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
}
