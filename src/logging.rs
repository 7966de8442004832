//! Tracing subscriber setup for the CLI: compact stderr output filtered by `RUST_LOG`.

use anyhow::Context as _;

/// Install the stderr subscriber. `RUST_LOG` wins; otherwise `info`, or `warn` when quiet.
pub fn init(quiet: bool) -> anyhow::Result<()> {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
