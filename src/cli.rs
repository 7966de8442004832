//! CLI parsing and orchestration. Parses args, collects episode links, downloads them
//! into an EPUB, and maps errors to exit codes.

use crate::config;
use crate::download::{
    DownloadError, DownloadOptions, Downloader, NoProgress, Progress, ProgressSink, ThreadSleep,
    Throttle, DEFAULT_LANGUAGE, DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS, DEFAULT_SITE_PREFIX,
};
use crate::model::NovelJob;
use crate::prompt::{DeclineAll, TerminalPrompt};
use crate::scraper::{
    canonical_listing_url, collect_episode_links, extract_title, Confirm, PoliteClient,
    ScraperError,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Download(#[from] DownloadError),

    #[error("Cannot write output: {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Validation(String),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Download(DownloadError::NoEpisodes)
            | CliRunError::Download(DownloadError::StartOutOfRange { .. }) => 1,
            CliRunError::Scraper(_) => 2,
            CliRunError::Download(_) | CliRunError::Write { .. } | CliRunError::Validation(_) => 3,
        }
    }
}

/// Run epubcheck on the given EPUB path. Requires epubcheck on PATH.
fn validate_epub(path: &Path) -> Result<(), CliRunError> {
    let output = std::process::Command::new("epubcheck")
        .arg(path)
        .output()
        .map_err(|e| {
            CliRunError::Validation(format!(
                "Could not run epubcheck: {}. Is epubcheck installed and on PATH?",
                e
            ))
        })?;
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let msg = if stderr.is_empty() { stdout } else { stderr };
        Err(CliRunError::Validation(format!(
            "epubcheck reported errors:\n{}",
            msg.trim()
        )))
    }
}

#[derive(Parser, Debug)]
#[command(name = "serialepub")]
#[command(about = "Download a serialized novel's episode list into an EPUB")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, timeout_secs, min_delay_ms, max_delay_ms, site_prefix, language) are read from ./serialepub.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    /// Episode list page of the novel (any query string is ignored).
    pub url: String,

    /// Number of episode list pages to read. Asked interactively when omitted.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: Option<u32>,

    /// Episode to start from, counted from the oldest (1-based). Asked interactively when omitted.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub start: Option<u32>,

    /// Book title. Default: read from the episode list page.
    #[arg(long)]
    pub title: Option<String>,

    /// Output path. Default: ./{title}({start}~{total}).epub
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Skip failing episodes instead of asking to solve a CAPTCHA.
    #[arg(long)]
    pub no_captcha_prompt: bool,

    /// Collect episode links, print the count and output path, and exit without downloading.
    #[arg(long)]
    pub dry_run: bool,

    /// After writing the EPUB, run epubcheck on it (epubcheck must be on PATH).
    #[arg(long)]
    pub validate: bool,

    /// Suppress progress output (warnings and errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Print verbose error chain.
    #[arg(long)]
    pub verbose: bool,
}

/// `{title}({start}~{total}).epub` with characters that are unsafe in file names replaced.
fn output_file_name(title: &str, start: usize, total: usize) -> String {
    let safe: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let safe = if safe.is_empty() { "book".to_string() } else { safe };
    format!("{}({}~{}).epub", safe, start, total)
}

/// Ensure output path parent exists.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

/// indicatif bar fed by the downloader.
struct BarProgress {
    bar: indicatif::ProgressBar,
}

impl BarProgress {
    fn new(total: u64) -> Self {
        let bar = indicatif::ProgressBar::new(total);
        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({percent}%)")
        {
            bar.set_style(
                style
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .progress_chars("█▉▊▋▌▍▎▏ "),
            );
        }
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn report(&mut self, progress: &Progress) {
        self.bar.set_length(u64::from(progress.total));
        self.bar.set_position(u64::from(progress.processed));
        let secs = progress.remaining.as_secs();
        self.bar.set_message(format!(
            "Downloading {:.2}% - remaining {}m {}s",
            progress.fraction() * 100.0,
            secs / 60,
            secs % 60
        ));
    }
}

/// Hides the progress bar while the operator answers a prompt.
struct SuspendingConfirm<C> {
    bar: Option<indicatif::ProgressBar>,
    inner: C,
}

impl<C: Confirm> Confirm for SuspendingConfirm<C> {
    fn confirm(&mut self, message: &str) -> bool {
        match &self.bar {
            Some(bar) => {
                let inner = &mut self.inner;
                bar.suspend(|| inner.confirm(message))
            }
            None => self.inner.confirm(message),
        }
    }
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let config = config.unwrap_or_default();

    let site_prefix = config
        .site_prefix
        .clone()
        .unwrap_or_else(|| DEFAULT_SITE_PREFIX.to_string());
    let listing_url = canonical_listing_url(args.url.trim());
    if !listing_url.starts_with(&site_prefix) {
        return Err(CliRunError::InvalidInput(format!(
            "Expected an episode list URL starting with {}. Got: {}",
            site_prefix, listing_url
        )));
    }

    let mut terminal = TerminalPrompt::stdio();

    let page_count = match args.pages {
        Some(n) => n,
        None => terminal
            .ask_number(
                "Number of episode list pages (1 unless the novel has 1000+ episodes)",
                Some(1),
            )
            .ok_or_else(|| {
                CliRunError::InvalidInput(
                    "Invalid page count or input cancelled.".to_string(),
                )
            })?,
    };

    let effective_output_dir: PathBuf = config
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let timeout_secs = args.timeout.or(config.timeout_secs).unwrap_or(30);
    let user_agent = args.user_agent.clone().or_else(|| config.user_agent.clone());

    let mut builder = PoliteClient::builder().timeout_secs(timeout_secs);
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    let mut client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let title = match &args.title {
        Some(t) if !t.trim().is_empty() => t.trim().to_string(),
        _ => {
            let html = client.get_text(&listing_url)?;
            extract_title(&html)?.ok_or_else(|| ScraperError::MissingTitle {
                url: listing_url.clone(),
            })?
        }
    };

    let links = collect_episode_links(&mut client, &listing_url, page_count)?;
    tracing::info!(title = %title, episodes = links.len(), pages = page_count, "collected episode links");
    if links.is_empty() {
        return Err(DownloadError::NoEpisodes.into());
    }
    let total = links.len();

    let start = match args.start {
        Some(n) => n,
        None => terminal
            .ask_number(&format!("Episode to start from (1 to {})", total), Some(1))
            .ok_or_else(|| {
                CliRunError::InvalidInput(
                    "Invalid episode number or input cancelled.".to_string(),
                )
            })?,
    };
    let start = start as usize;
    if start > total {
        return Err(DownloadError::StartOutOfRange { start, total }.into());
    }

    let output_path = match &args.output {
        Some(p) => p.clone(),
        None => effective_output_dir.join(output_file_name(&title, start, total)),
    };

    if args.dry_run {
        eprintln!("Title: {}", title);
        eprintln!("Episodes: {}", total);
        eprintln!("Output: {}", output_path.display());
        return Ok(());
    }

    validate_output_path(&output_path)?;

    let options = DownloadOptions {
        site_prefix,
        language: config
            .language
            .clone()
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        throttle: Throttle::new(
            config.min_delay_ms.unwrap_or(DEFAULT_MIN_DELAY_MS),
            config.max_delay_ms.unwrap_or(DEFAULT_MAX_DELAY_MS),
        ),
        identifier: Some(listing_url.clone()),
    };
    let job = NovelJob::new(title, links, start);
    tracing::info!(title = %job.title, start, "task queued");

    let mut bar = if args.quiet {
        None
    } else {
        Some(BarProgress::new((total - start + 1) as u64))
    };
    let bar_handle = bar.as_ref().map(|b| b.bar.clone());
    let mut no_progress = NoProgress;
    let progress: &mut dyn ProgressSink = match bar.as_mut() {
        Some(b) => b as &mut dyn ProgressSink,
        None => &mut no_progress,
    };

    let mut prompt_confirm;
    let mut decline_confirm;
    let confirm: &mut dyn Confirm = if args.no_captcha_prompt {
        decline_confirm = DeclineAll;
        &mut decline_confirm
    } else {
        prompt_confirm = SuspendingConfirm {
            bar: bar_handle.clone(),
            inner: terminal,
        };
        &mut prompt_confirm
    };

    let mut pause = ThreadSleep;
    let archive = Downloader::new(&mut client, confirm, progress, &mut pause, options)?.run(&job)?;

    if let Some(bar) = bar_handle {
        bar.disable_steady_tick();
        bar.finish_and_clear();
    }

    std::fs::write(&output_path, archive).map_err(|e| CliRunError::Write {
        path: output_path.clone(),
        source: e,
    })?;
    if args.validate {
        validate_epub(&output_path)?;
    }

    if !args.quiet {
        eprintln!("Wrote {}", output_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_file_name_follows_convention() {
        assert_eq!(output_file_name("My Novel", 3, 120), "My Novel(3~120).epub");
    }

    #[test]
    fn output_file_name_keeps_non_ascii_titles() {
        assert_eq!(
            output_file_name("\u{B0B4} \u{C18C}\u{C124}", 1, 5),
            "\u{B0B4} \u{C18C}\u{C124}(1~5).epub"
        );
    }

    #[test]
    fn output_file_name_replaces_unsafe_characters() {
        assert_eq!(output_file_name("a/b:c?", 1, 2), "a_b_c_(1~2).epub");
        assert_eq!(output_file_name("   ", 1, 2), "book(1~2).epub");
    }

    #[test]
    fn args_parse_pages_and_start() {
        let args = Args::try_parse_from([
            "serialepub",
            "https://booktoki468.com/novel/123?spage=2",
            "--pages",
            "2",
            "--start",
            "5",
            "--no-captcha-prompt",
        ])
        .unwrap();
        assert_eq!(args.pages, Some(2));
        assert_eq!(args.start, Some(5));
        assert!(args.no_captcha_prompt);
        assert!(!args.dry_run);
    }

    #[test]
    fn args_reject_zero_and_non_numeric() {
        assert!(Args::try_parse_from(["serialepub", "u", "--pages", "0"]).is_err());
        assert!(Args::try_parse_from(["serialepub", "u", "--start", "abc"]).is_err());
    }

    #[test]
    fn validate_output_path_parent_exists() {
        let path = std::env::temp_dir().join("serialepub_cli_test_output.epub");
        assert!(validate_output_path(&path).is_ok());
    }

    #[test]
    fn validate_output_path_parent_missing() {
        let path = PathBuf::from("/nonexistent_dir_serialepub_xyz/output.epub");
        let result = validate_output_path(&path);
        assert!(result.is_err());
        if let Err(CliRunError::InvalidInput(msg)) = result {
            assert!(msg.contains("parent directory does not exist"));
        }
    }

    #[test]
    fn cli_run_error_exit_codes() {
        assert_eq!(CliRunError::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(CliRunError::Download(DownloadError::NoEpisodes).exit_code(), 1);
        assert_eq!(
            CliRunError::Download(DownloadError::StartOutOfRange { start: 9, total: 3 })
                .exit_code(),
            1
        );
        assert_eq!(
            CliRunError::Scraper(ScraperError::MissingTitle { url: "x".into() }).exit_code(),
            2
        );
        assert_eq!(
            CliRunError::Download(DownloadError::Epub(crate::epub::EpubError::NoChapters))
                .exit_code(),
            3
        );
        assert_eq!(
            CliRunError::Validation("epubcheck failed".into()).exit_code(),
            3
        );
    }

    #[test]
    fn wrong_site_is_rejected_before_network() {
        let args = Args::try_parse_from([
            "serialepub",
            "https://example.com/novel/1",
            "--pages",
            "1",
            "--start",
            "1",
        ])
        .unwrap();
        assert!(matches!(run(&args), Err(CliRunError::InvalidInput(_))));
    }
}
