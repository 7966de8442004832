//! Download loop: walks the chosen episode range oldest-first, one request at a time,
//! with a randomized pause between episodes, and hands each fetched episode to the
//! EPUB builder as the next chapter.

use crate::epub::{EpubBuilder, EpubError};
use crate::model::{chapter_label, FetchOutcome, NovelJob};
use crate::scraper::{Confirm, DocumentSource, EpisodeFetcher, ScraperError};
use rand::Rng;
use std::ops::Range;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Episode URLs must start with this to be downloaded.
pub const DEFAULT_SITE_PREFIX: &str = "https://booktoki";
pub const DEFAULT_MIN_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 1500;
pub const DEFAULT_LANGUAGE: &str = "ko";

/// Errors that abort a whole run. Per-episode failures never show up here.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("No episode links were collected; nothing to download.")]
    NoEpisodes,

    #[error("Start episode {start} is out of range (1 to {total}).")]
    StartOutOfRange { start: usize, total: usize },

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Epub(#[from] EpubError),
}

/// One progress update, sent after every processed episode (fetched or skipped).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub processed: u32,
    pub total: u32,
    pub elapsed: Duration,
    pub remaining: Duration,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        f64::from(self.processed) / f64::from(self.total)
    }
}

/// Receives progress updates. Purely observational.
pub trait ProgressSink {
    fn report(&mut self, progress: &Progress);
}

/// Sink that drops every update (quiet mode).
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _progress: &Progress) {}
}

/// Blocks the run between episodes. Tests substitute a recorder.
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

/// Real pause: `std::thread::sleep`.
#[derive(Debug, Default)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Randomized inter-episode delay, uniform in `[min, max)` milliseconds.
#[derive(Debug, Clone)]
pub struct Throttle {
    range_ms: Range<u64>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY_MS, DEFAULT_MAX_DELAY_MS)
    }
}

impl Throttle {
    /// `max_ms <= min_ms` means a fixed delay of `min_ms`.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            range_ms: min_ms..max_ms.max(min_ms),
        }
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.range_ms.is_empty() {
            return Duration::from_millis(self.range_ms.start);
        }
        Duration::from_millis(rng.gen_range(self.range_ms.clone()))
    }
}

/// Linear extrapolation: total time is `elapsed / fraction`.
pub fn estimate_remaining(elapsed: Duration, fraction: f64) -> Duration {
    if fraction <= 0.0 || fraction >= 1.0 {
        return Duration::ZERO;
    }
    let total = elapsed.as_secs_f64() / fraction;
    Duration::from_secs_f64((total - elapsed.as_secs_f64()).max(0.0))
}

/// Settings for a run that do not come from the job itself.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub site_prefix: String,
    pub language: String,
    pub throttle: Throttle,
    /// Written as `dc:identifier`, typically the listing URL.
    pub identifier: Option<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            site_prefix: DEFAULT_SITE_PREFIX.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            throttle: Throttle::default(),
            identifier: None,
        }
    }
}

/// Drives one novel from link list to archive bytes.
pub struct Downloader<'a> {
    fetcher: EpisodeFetcher<'a>,
    progress: &'a mut dyn ProgressSink,
    pause: &'a mut dyn Pause,
    options: DownloadOptions,
}

impl<'a> Downloader<'a> {
    pub fn new(
        source: &'a mut dyn DocumentSource,
        confirm: &'a mut dyn Confirm,
        progress: &'a mut dyn ProgressSink,
        pause: &'a mut dyn Pause,
        options: DownloadOptions,
    ) -> Result<Self, DownloadError> {
        Ok(Self {
            fetcher: EpisodeFetcher::new(source, confirm)?,
            progress,
            pause,
            options,
        })
    }

    /// Download every episode from `job.start_episode` to the newest and return the
    /// EPUB archive. Only invalid input and archive build failures are errors.
    pub fn run(&mut self, job: &NovelJob) -> Result<Vec<u8>, DownloadError> {
        if job.links.is_empty() {
            return Err(DownloadError::NoEpisodes);
        }
        let starting_index = job
            .starting_index()
            .ok_or(DownloadError::StartOutOfRange {
                start: job.start_episode,
                total: job.links.len(),
            })?;

        let episodes: Vec<&str> = job
            .episodes_in_order()
            .filter_map(|link| {
                if link.url.starts_with(&self.options.site_prefix) {
                    Some(link.url.as_str())
                } else {
                    tracing::info!(url = %link.url, position = link.position, "skipping invalid episode link");
                    None
                }
            })
            .collect();
        let total = episodes.len() as u32;
        tracing::info!(
            title = %job.title,
            start = job.start_episode,
            starting_index,
            episodes = total,
            "starting download"
        );

        let mut builder = EpubBuilder::new(job.title.as_str(), self.options.language.as_str());
        if let Some(id) = &self.options.identifier {
            builder = builder.identifier(id.as_str());
        }

        let mut rng = rand::thread_rng();
        let started = Instant::now();
        let mut next_chapter = 1u32;
        for (i, &url) in episodes.iter().enumerate() {
            let processed = i as u32 + 1;
            tracing::debug!(url, processed, total, "downloading episode");
            match self.fetcher.fetch(url) {
                FetchOutcome::Success(text) => {
                    builder.add_chapter(next_chapter, &chapter_label(next_chapter), &text);
                    next_chapter += 1;
                }
                FetchOutcome::Skipped(reason) => {
                    tracing::warn!(url, %reason, "episode skipped");
                }
            }

            let elapsed = started.elapsed();
            let mut progress = Progress {
                processed,
                total,
                elapsed,
                remaining: Duration::ZERO,
            };
            progress.remaining = estimate_remaining(elapsed, progress.fraction());
            self.progress.report(&progress);

            if processed < total {
                self.pause.pause(self.options.throttle.next_delay(&mut rng));
            }
        }

        tracing::info!(
            chapters = builder.chapter_count(),
            skipped = total as usize - builder.chapter_count(),
            "download finished"
        );
        Ok(builder.build()?)
    }
}
