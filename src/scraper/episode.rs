//! Episode content fetcher with operator-assisted CAPTCHA recovery.
//!
//! A failed first attempt (network error, non-2xx, missing `#novel_content`, or content
//! that cleans up to nothing) asks the operator to clear the CAPTCHA in a browser.
//! If they agree, exactly one more attempt is made; otherwise the episode is skipped.

use super::{parse_selector, DocumentSource, ScraperError};
use crate::model::{FetchOutcome, SkipReason};
use crate::sanitize::sanitize;
use scraper::{Html, Selector};

const CONTENT_SELECTOR: &str = "#novel_content";

/// Yes/no question put to the operator.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

/// Fetches and cleans one episode at a time.
pub struct EpisodeFetcher<'a> {
    source: &'a mut dyn DocumentSource,
    confirm: &'a mut dyn Confirm,
    content_sel: Selector,
}

impl<'a> EpisodeFetcher<'a> {
    pub fn new(
        source: &'a mut dyn DocumentSource,
        confirm: &'a mut dyn Confirm,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            source,
            confirm,
            content_sel: parse_selector(CONTENT_SELECTOR)?,
        })
    }

    /// Fetch one episode. Never more than two requests per call.
    pub fn fetch(&mut self, url: &str) -> FetchOutcome {
        let first_error = match self.attempt(url) {
            Ok(text) => return FetchOutcome::Success(text),
            Err(e) => e,
        };
        tracing::warn!(url, error = %first_error, "episode fetch failed; asking for CAPTCHA");

        if !self.confirm.confirm(&captcha_message(url)) {
            tracing::info!(url, "CAPTCHA declined; episode skipped");
            return FetchOutcome::Skipped(SkipReason::UserDeclinedCaptcha);
        }

        match self.attempt(url) {
            Ok(text) => FetchOutcome::Success(text),
            Err(e) => {
                tracing::warn!(url, error = %e, "episode still failing after CAPTCHA; skipped");
                FetchOutcome::Skipped(SkipReason::CaptchaRetryFailed)
            }
        }
    }

    fn attempt(&mut self, url: &str) -> Result<String, ScraperError> {
        let html = self.source.fetch_html(url)?;
        extract_content(&html, &self.content_sel, url)
    }
}

/// Sanitized text of the content node.
fn extract_content(html: &str, content_sel: &Selector, url: &str) -> Result<String, ScraperError> {
    let doc = Html::parse_document(html);
    let node = doc
        .select(content_sel)
        .next()
        .ok_or_else(|| ScraperError::MissingContent {
            selector: CONTENT_SELECTOR.to_string(),
            url: url.to_string(),
        })?;
    let text = sanitize(&node.inner_html());
    if text.is_empty() {
        return Err(ScraperError::EmptyContent {
            url: url.to_string(),
        });
    }
    Ok(text)
}

fn captcha_message(url: &str) -> String {
    format!(
        "A CAPTCHA was detected on this page:\n{}\nOpen it in a browser, solve the CAPTCHA, then confirm to retry.",
        url
    )
}
