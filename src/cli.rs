//! CLI argument parsing and command handlers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{default_config_path, Settings};
use crate::crawler::CrawlProgress;
use crate::error::Error;
use crate::library::Library;
use crate::models::{FormatFilter, MatchMode};
use crate::output;
use crate::server::{self, SearchResponse};

/// Dirdex: index and search open directory listings
#[derive(Parser, Debug)]
#[command(
    name = "dirdex",
    version,
    about = "Crawl an open directory into a local file index and search it",
    long_about = "Dirdex crawls a web server's directory listings into a flat, compressed \
                  index of file URLs, then answers keyword and format queries against that \
                  index without touching the network.\n\n\
                  Run 'dirdex refresh' once to build the index, then 'dirdex search <words>'."
)]
pub struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file (defaults to the platform config dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Index file, overriding the settings file
    #[arg(long, value_name = "PATH", global = true)]
    pub index: Option<PathBuf>,

    /// Directory URL to crawl, overriding the settings file
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl the base URL and rebuild the local index
    ///
    /// This can take minutes on a large server. Press Ctrl+C to cancel;
    /// the previous index is kept untouched.
    Refresh {
        /// Suppress progress and summary output
        #[arg(short, long)]
        quiet: bool,

        /// Output the refresh report as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output (only with --json)
        #[arg(long)]
        pretty: bool,
    },

    /// Search the local index
    ///
    /// Keywords are matched case-insensitively as substrings of the file URL.
    ///
    /// Examples:
    ///   dirdex search mahatma gandhi              # all words must match
    ///   dirdex search tolstoy dostoevsky --any    # either word matches
    ///   dirdex search dune --format epub,mobi     # only these extensions
    Search {
        /// Keywords (joined with spaces)
        #[arg(value_name = "WORDS")]
        query: Vec<String>,

        /// Match URLs containing any keyword
        #[arg(long, conflicts_with = "all")]
        any: bool,

        /// Match URLs containing every keyword
        #[arg(long)]
        all: bool,

        /// Accepted extensions, comma-separated, or ALL
        #[arg(short, long, value_name = "LIST")]
        format: Option<String>,

        /// Maximum number of results (0 = unlimited)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output (only with --json)
        #[arg(long)]
        pretty: bool,

        /// Use plain text output (no colors, one line per hit)
        #[arg(long)]
        plain: bool,
    },

    /// Show index location, size and freshness
    Status {
        /// Output format as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output (only with --json)
        #[arg(long)]
        pretty: bool,
    },

    /// Show the effective settings
    Config {
        /// Output format as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the local index file
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Start a local HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7979")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let log_level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
            .init();

        let (settings, settings_path) = self.load_settings()?;

        match self.command {
            Command::Refresh { quiet, json, pretty } => {
                handle_refresh(settings, settings_path, quiet, json, pretty)
            }
            Command::Search { query, any, all, format, limit, json, pretty, plain } => {
                let mode = if any {
                    Some(MatchMode::Any)
                } else if all {
                    Some(MatchMode::All)
                } else {
                    None
                };
                handle_search(settings, query, mode, format, limit, json, pretty, plain)
            }
            Command::Status { json, pretty } => handle_status(settings, json, pretty),
            Command::Config { json } => handle_config(&settings, settings_path, json),
            Command::Clear { yes } => handle_clear(settings, yes),
            Command::Serve { port, host } => handle_serve(settings, settings_path, port, host),
        }
    }

    /// Settings file plus command-line overrides
    fn load_settings(&self) -> Result<(Settings, Option<PathBuf>)> {
        let path = self.config.clone().or_else(default_config_path);
        let mut settings = match &path {
            Some(p) => Settings::load(p)?,
            None => {
                log::debug!("No config directory available, using default settings");
                Settings::default()
            }
        };

        if let Some(index) = &self.index {
            settings.index.path = Some(index.clone());
        }
        if let Some(url) = &self.base_url {
            settings.source.base_url = url.clone();
        }

        Ok((settings, path))
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn progress_spinner(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Fetching base listing...");
    pb
}

/// Handle the `refresh` subcommand
fn handle_refresh(
    settings: Settings,
    settings_path: Option<PathBuf>,
    quiet: bool,
    json: bool,
    pretty: bool,
) -> Result<()> {
    log::info!("Starting index refresh");

    let library = Library::open(settings, settings_path)?;
    let spinner = progress_spinner(!quiet && !json);
    let cancel = CancellationToken::new();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_ctrl_c.cancel();
            }
        });

        let pb = spinner.clone();
        let on_progress = move |p: CrawlProgress| {
            pb.set_message(format!(
                "{} pages crawled, {} failed, {} queued, {} files found",
                p.pages_done, p.pages_failed, p.pages_pending, p.files_found
            ));
        };
        library.refresh(&cancel, &on_progress).await
    });
    spinner.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(Error::Cancelled) => {
            anyhow::bail!("Refresh cancelled. The previous index was left unchanged.");
        }
        Err(e) => return Err(e).context("Refresh failed"),
    };

    if json {
        return print_json(&report, pretty);
    }
    if quiet {
        return Ok(());
    }

    println!("Refresh complete!");
    println!("  Base URL:       {}", report.base_url);
    println!("  Files indexed:  {}", report.total_files);
    println!("  Pages crawled:  {}", report.pages_visited);
    println!("  Duration:       {:.1}s", report.duration_ms as f64 / 1000.0);
    println!("  Index file:     {}", report.index_path);

    if report.pages_visited == 0 && report.pages_failed > 0 {
        output::warn(&format!(
            "The base listing {} could not be fetched; the index is now empty. Run with -v for details.",
            report.base_url
        ));
    } else if report.pages_failed > 0 {
        output::warn(&format!(
            "{} listing page(s) could not be fetched; files below them are missing. Run with -v for details.",
            report.pages_failed
        ));
    }
    if report.dirs_skipped > 0 {
        output::warn(&format!(
            "{} directories were skipped by the crawl depth/page limits (see [crawl] in the settings file).",
            report.dirs_skipped
        ));
    }

    Ok(())
}

/// Handle the `search` subcommand
#[allow(clippy::too_many_arguments)]
fn handle_search(
    settings: Settings,
    query: Vec<String>,
    mode: Option<MatchMode>,
    format: Option<String>,
    limit: Option<usize>,
    json: bool,
    pretty: bool,
    plain: bool,
) -> Result<()> {
    let mode = mode.unwrap_or(settings.search.mode);
    let formats = format
        .as_deref()
        .map(FormatFilter::parse)
        .unwrap_or_else(|| settings.format_filter());
    let limit = match limit.unwrap_or(settings.search.max_results) {
        0 => None,
        n => Some(n),
    };
    let text = query.join(" ");
    log::info!("Searching for '{}' (mode={}, formats={})", text, mode, formats);

    let library = Library::open(settings, None)?;
    library.load()?;
    let (total, results) = library.search_hits(&text, mode, &formats, limit)?;

    if json {
        return print_json(&SearchResponse { total, results }, pretty);
    }

    if results.is_empty() {
        output::info(&format!("No matches for '{}' (mode: {}, formats: {}).", text, mode, formats));
        return Ok(());
    }

    for hit in &results {
        output::hit(hit, plain);
    }
    if total > results.len() {
        eprintln!("\nShowing {} of {} matches (use -n to change the limit)", results.len(), total);
    }

    Ok(())
}

/// Handle the `status` subcommand
fn handle_status(settings: Settings, json: bool, pretty: bool) -> Result<()> {
    let library = Library::open(settings, None)?;
    match library.load() {
        Ok(_) => {}
        Err(e) if e.is_missing_index() => log::debug!("Status without index: {}", e),
        Err(e) => return Err(e.into()),
    }
    let status = library.status();

    if json {
        return print_json(&status, pretty);
    }

    println!("Dirdex Index Status");
    println!("===================");
    println!("Base URL:       {}", status.base_url);
    println!("Index file:     {}", status.index_path);
    match (status.total_files, status.index_size_bytes) {
        (Some(files), Some(size)) => {
            println!("Files indexed:  {}", files);
            println!("Index size:     {}", format_bytes(size));
        }
        _ if status.on_disk => println!("Files indexed:  (index file unreadable)"),
        _ => println!("Files indexed:  (no index)"),
    }
    println!("Last refresh:   {}", status.last_update.as_deref().unwrap_or("never"));

    if !status.loaded {
        output::info("Run 'dirdex refresh' to build the index.");
    }

    Ok(())
}

/// Handle the `config` subcommand
fn handle_config(settings: &Settings, settings_path: Option<PathBuf>, json: bool) -> Result<()> {
    if json {
        return print_json(settings, true);
    }

    match settings_path {
        Some(path) if path.exists() => println!("# Settings file: {}", path.display()),
        Some(path) => println!("# Settings file: {} (not created yet, showing defaults)", path.display()),
        None => println!("# No settings file location available, showing defaults"),
    }
    println!("# Index file:    {}\n", settings.index_path().display());
    print!("{}", toml::to_string_pretty(settings).context("Failed to render settings")?);

    Ok(())
}

/// Handle the `clear` subcommand
fn handle_clear(settings: Settings, skip_confirm: bool) -> Result<()> {
    let library = Library::open(settings, None)?;

    if !library.store().exists() {
        println!("No index to clear.");
        return Ok(());
    }

    if !skip_confirm {
        println!("This will delete the local index at: {}", library.store().path().display());
        print!("Are you sure? [y/N] ");
        use std::io::{self, Write};
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    library.clear()?;
    println!("Index cleared successfully.");

    Ok(())
}

/// Handle the `serve` subcommand
fn handle_serve(settings: Settings, settings_path: Option<PathBuf>, port: u16, host: String) -> Result<()> {
    let library = Library::open(settings, settings_path)?;
    match library.load() {
        Ok(count) => log::info!("Serving {} indexed files", count),
        Err(e) if e.is_missing_index() => {
            output::warn(&format!("{}\nSearches will fail until POST /refresh completes.", e));
        }
        Err(e) => return Err(e.into()),
    }

    println!("Starting Dirdex HTTP server...");
    println!("  Address: http://{}:{}", host, port);
    println!("\nEndpoints:");
    println!("  GET  /search?q=<words>&mode=all|any&format=<LIST>&limit=<n>");
    println!("  POST /refresh");
    println!("  GET  /status");
    println!("  GET  /health");
    println!("\nPress Ctrl+C to stop.");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(Arc::new(library), &host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_flags() {
        let cli = Cli::try_parse_from(["dirdex", "search", "war", "peace", "--any", "-f", "epub", "-n", "5"]).unwrap();
        match cli.command {
            Command::Search { query, any, all, format, limit, .. } => {
                assert_eq!(query, vec!["war", "peace"]);
                assert!(any);
                assert!(!all);
                assert_eq!(format.as_deref(), Some("epub"));
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_any_and_all_conflict() {
        assert!(Cli::try_parse_from(["dirdex", "search", "x", "--any", "--all"]).is_err());
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::try_parse_from([
            "dirdex",
            "status",
            "--config",
            "/nonexistent/dirdex-test/config.toml",
            "--index",
            "/tmp/i.json.gz",
            "--base-url",
            "http://mirror/books/",
        ])
        .unwrap();
        assert_eq!(cli.index, Some(PathBuf::from("/tmp/i.json.gz")));

        let (settings, _) = cli.load_settings().unwrap();
        assert_eq!(settings.index_path(), PathBuf::from("/tmp/i.json.gz"));
        assert_eq!(settings.source.base_url, "http://mirror/books/");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
    }
}
