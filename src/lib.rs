//! serialepub: downloads a serialized web novel's episodes and packages them as an EPUB.

pub mod cli;
pub mod config;
pub mod download;
pub mod epub;
pub mod logging;
pub mod model;
pub mod prompt;
pub mod sanitize;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use download::{DownloadError, DownloadOptions, Downloader, Progress, ProgressSink, Throttle};
pub use epub::{EpubBuilder, EpubError};
pub use model::{Chapter, EpisodeLink, FetchOutcome, NovelJob, SkipReason};
pub use sanitize::sanitize;
pub use scraper::{
    collect_episode_links, extract_title, Confirm, DocumentSource, EpisodeFetcher, PoliteClient,
    PoliteClientBuilder, ScraperError,
};
