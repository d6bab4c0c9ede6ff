//! Settings file for Dirdex
//!
//! Settings live in `<config dir>/dirdex/config.toml`. A missing file means
//! defaults; a missing section or key means that section's defaults. The
//! file is also where the last successful refresh is recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::crawler::CrawlConfig;
use crate::error::{Error, Result};
use crate::fetcher::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::models::{FormatFilter, MatchMode};
use crate::store::{write_atomic, INDEX_FILE};

/// Directory name used under the platform config and data dirs
pub const APP_DIR: &str = "dirdex";

/// Settings file name
pub const CONFIG_FILE: &str = "config.toml";

/// Open directory crawled when none is configured
pub const DEFAULT_BASE_URL: &str = "https://the-eye.eu/public/Books/Calibre_Libraries/";

/// Complete settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub crawl: CrawlConfig,
    pub index: IndexSettings,
    pub search: SearchSettings,
    pub state: StateSettings,
}

/// Where and how to reach the remote server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceSettings {
    pub base_url: String,
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexSettings {
    /// Index file location (None = `<data dir>/dirdex/index.json.gz`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Defaults applied to searches that don't specify their own options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchSettings {
    pub mode: MatchMode,
    /// Comma-separated extensions, or "ALL"
    pub formats: String,
    pub max_results: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            mode: MatchMode::All,
            formats: "ALL".to_string(),
            max_results: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StateSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Settings = toml::from_str(&text).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        log::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Write settings to `path`, replacing the previous file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        write_atomic(path, |writer| writer.write_all(text.as_bytes()))
            .map_err(|source| Error::Persist { path: path.to_path_buf(), source })?;

        log::debug!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Validated crawl root, normalised to end with `/`
    pub fn base_url(&self) -> Result<Url> {
        normalize_base_url(&self.source.base_url)
    }

    pub fn index_path(&self) -> PathBuf {
        self.index.path.clone().unwrap_or_else(default_index_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_secs.max(1))
    }

    pub fn format_filter(&self) -> FormatFilter {
        FormatFilter::parse(&self.search.formats)
    }

    pub fn record_refresh(&mut self, at: DateTime<Utc>) {
        self.state.last_update = Some(at);
    }
}

/// Platform location of the settings file, e.g. `~/.config/dirdex/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Platform location of the index file, e.g. `~/.local/share/dirdex/index.json.gz`
pub fn default_index_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(INDEX_FILE)
}

/// Parse a crawl root: absolute http(s) URL, no query or fragment, trailing `/`
pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let invalid = |reason: &str| Error::InvalidUrl { url: raw.to_string(), reason: reason.to_string() };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("only http and https are supported"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }

    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
