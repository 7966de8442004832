//! Optional config file loading. Search order: ./serialepub.toml, then
//! $XDG_CONFIG_HOME/serialepub/config.toml (or ~/.config/serialepub/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Default output directory when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Lower bound of the pause between episodes, in milliseconds (default 1000).
    pub min_delay_ms: Option<u64>,
    /// Upper bound (exclusive) of the pause between episodes, in milliseconds (default 1500).
    pub max_delay_ms: Option<u64>,
    /// Listing and episode URLs must start with this (default "https://booktoki").
    pub site_prefix: Option<String>,
    /// `dc:language` of the generated EPUB (default "ko").
    pub language: Option<String>,
}

/// Search order: (1) ./serialepub.toml, (2) $XDG_CONFIG_HOME/serialepub/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("serialepub.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("serialepub").join("config.toml"));
    }
    load_first(&paths)
}

/// First existing file in `paths` wins.
fn load_first(paths: &[PathBuf]) -> Result<Option<Config>, String> {
    for path in paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded config");
            return Ok(Some(config));
        }
    }
    Ok(None)
}
