//! Blocking HTTP client used for listing and episode pages.
//!
//! The client makes exactly one request per call. Pacing between episodes is the
//! downloader's job and retries only happen through CAPTCHA recovery.

use super::{DocumentSource, ScraperError};
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Blocking HTTP client with a cookie jar, so a CAPTCHA clearance cookie set by the
/// site on an earlier response is replayed on the retry.
#[derive(Debug)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
}

impl PoliteClient {
    /// Build a client with default User-Agent and timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    /// Builder for custom User-Agent and/or timeout.
    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    /// GET `url` and return the body. Non-2xx statuses are errors.
    pub fn get_text(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .inner
            .get(url)
            .send()
            .map_err(|e| ScraperError::Network {
                url: url.to_string(),
                source: e,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response.text().map_err(|e| ScraperError::BodyRead {
            url: url.to_string(),
            source: e,
        })
    }
}

impl DocumentSource for PoliteClient {
    fn fetch_html(&mut self, url: &str) -> Result<String, ScraperError> {
        self.get_text(url)
    }
}

/// Builder for PoliteClient with optional User-Agent and timeout.
#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl PoliteClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(PoliteClient { inner })
    }
}
