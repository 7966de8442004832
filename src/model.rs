//! Data model shared by the crawler, the downloader, and the EPUB writer.

use std::fmt;

/// One entry of the episode list, in the order the site lists it (newest first).
///
/// Duplicates are kept; `position` is the 0-based index in the collected list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeLink {
    pub url: String,
    pub position: usize,
}

/// Why an episode was left out of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The operator solved the CAPTCHA but the single retry still failed.
    CaptchaRetryFailed,
    /// The operator declined to solve the CAPTCHA.
    UserDeclinedCaptcha,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::CaptchaRetryFailed => f.write_str("captcha-retry-failed"),
            SkipReason::UserDeclinedCaptcha => f.write_str("user-declined-captcha"),
        }
    }
}

/// Result of fetching one episode. Garbled or partial content is never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(String),
    Skipped(SkipReason),
}

/// One chapter of the output book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based, dense, in processing order.
    pub number: u32,
    pub title: String,
    /// Sanitized plain text.
    pub body: String,
}

impl Chapter {
    /// Chapter with the standard `Chapter N` title.
    pub fn numbered(number: u32, body: String) -> Self {
        Self {
            number,
            title: chapter_label(number),
            body,
        }
    }
}

/// Display label used for chapter headings and TOC entries.
pub fn chapter_label(number: u32) -> String {
    format!("Chapter {}", number)
}

/// Everything the downloader needs for one novel. Not modified once a run starts.
#[derive(Debug, Clone)]
pub struct NovelJob {
    pub title: String,
    /// Collected links, newest episode at index 0.
    pub links: Vec<EpisodeLink>,
    /// 1-based, counted from the oldest episode.
    pub start_episode: usize,
}

impl NovelJob {
    pub fn new(title: impl Into<String>, links: Vec<EpisodeLink>, start_episode: usize) -> Self {
        Self {
            title: title.into(),
            links,
            start_episode,
        }
    }

    /// Array index of the first episode to download, or `None` when the link list is
    /// empty or `start_episode` is outside `1..=links.len()`.
    pub fn starting_index(&self) -> Option<usize> {
        if self.links.is_empty() || self.start_episode < 1 || self.start_episode > self.links.len()
        {
            return None;
        }
        Some(self.links.len() - self.start_episode)
    }

    /// Links to process, oldest first, starting at the requested episode.
    pub fn episodes_in_order(&self) -> impl Iterator<Item = &EpisodeLink> + '_ {
        let end = self.starting_index().map(|i| i + 1).unwrap_or(0);
        self.links[..end].iter().rev()
    }
}

/// Build the ordered link list from raw URLs, assigning positions.
pub fn links_from_urls<I, S>(urls: I) -> Vec<EpisodeLink>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    urls.into_iter()
        .enumerate()
        .map(|(position, url)| EpisodeLink {
            url: url.into(),
            position,
        })
        .collect()
}
