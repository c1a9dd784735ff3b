use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use pagedump::config::ConfigFile;
use pagedump::fetch::{
    BrowserOptions, DEFAULT_IDLE_TIME_MS, DEFAULT_MAX_CONNECTIONS, DEFAULT_TIMEOUT_MS,
    FetchRequest, NetworkIdle,
};

#[derive(Parser)]
#[command(
    name = "pagedump",
    version,
    about = "Fetch the fully rendered HTML of a web page via headless Chrome",
    long_about = "pagedump launches a dedicated headless Chrome/Chromium, navigates to the given \
        URL, waits until network activity has settled, and prints the rendered document's root \
        element markup to stdout. The browser is started on a free port with a throwaway profile \
        and is always terminated when pagedump exits, on success and on failure.\n\n\
        Stdout carries exactly one thing: the HTML. Failures are reported as a structured JSON \
        object on stderr and a non-zero exit code.",
    after_long_help = "\
EXAMPLES:
  # Fetch a page after scripts have run and the network is quiet
  pagedump https://example.com/

  # Give a slow single-page app more time
  pagedump --timeout 60000 https://app.example.com/dashboard

  # Tolerate one long-polling connection when judging idleness
  pagedump --max-connections 1 https://example.com/live

  # Use a specific browser binary
  pagedump --chrome-path /usr/bin/chromium https://example.com/

EXIT CODES:
  0  Success
  1  General error (navigation failure, invalid arguments)
  2  Connection error (browser launch or DevTools connection failure)
  3  Target error (no debuggable page in the launched browser)
  4  Timeout error (startup or network idle not reached in time)
  5  Protocol error (CDP failure, in-page evaluation error)

ENVIRONMENT VARIABLES:
  PAGEDUMP_TIMEOUT          Navigation timeout in milliseconds
  PAGEDUMP_IDLE_TIME        Network quiescence window in milliseconds
  PAGEDUMP_MAX_CONNECTIONS  In-flight connections tolerated while idle
  PAGEDUMP_CONFIG           Path to configuration file
  CHROME_PATH               Chrome/Chromium executable override",
    term_width = 100
)]
pub struct Cli {
    /// The URL to fetch
    pub url: String,

    /// Navigation timeout in milliseconds [default: 30000]
    #[arg(long, env = "PAGEDUMP_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Milliseconds the network must stay quiet before the page counts as loaded [default: 500]
    #[arg(long, env = "PAGEDUMP_IDLE_TIME")]
    pub idle_time: Option<u64>,

    /// In-flight connections tolerated during the quiet window [default: 0]
    #[arg(long, env = "PAGEDUMP_MAX_CONNECTIONS")]
    pub max_connections: Option<usize>,

    /// Path to the Chrome/Chromium executable
    #[arg(long)]
    pub chrome_path: Option<PathBuf>,

    /// Additional command-line argument for Chrome (repeatable)
    #[arg(long = "chrome-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub chrome_arg: Vec<String>,

    /// Keep the Chrome sandbox enabled (disabled by default for container use)
    #[arg(long)]
    pub sandbox: bool,

    /// Path to configuration file (overrides default search)
    #[arg(long, env = "PAGEDUMP_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Merge CLI flags over config-file values into the typed fetch inputs.
    ///
    /// Precedence: flag (or its env fallback, via clap) > config file >
    /// built-in default. Boolean toggles can only be enabled, so they are
    /// ORed across sources.
    #[must_use]
    pub fn resolve(&self, file: &ConfigFile) -> (FetchRequest, BrowserOptions) {
        let timeout_ms = self
            .timeout
            .or(file.fetch.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        let idle_time_ms = self
            .idle_time
            .or(file.fetch.idle_time_ms)
            .unwrap_or(DEFAULT_IDLE_TIME_MS);
        let max_connections = self
            .max_connections
            .or(file.fetch.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let request = FetchRequest {
            url: self.url.clone(),
            timeout: Duration::from_millis(timeout_ms),
            idle: NetworkIdle {
                max_connections,
                idle_time: Duration::from_millis(idle_time_ms),
            },
        };

        let mut extra_args = file.launch.extra_args.clone().unwrap_or_default();
        extra_args.extend(self.chrome_arg.iter().cloned());

        let browser = BrowserOptions {
            executable: self
                .chrome_path
                .clone()
                .or_else(|| file.launch.executable.clone()),
            extra_args,
            sandbox: self.sandbox || file.launch.sandbox.unwrap_or(false),
        };

        (request, browser)
    }
}
