use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::cdp::{CdpClient, CdpConfig, CdpError, CdpEvent};
use crate::chrome::{self, LaunchConfig};
use crate::error::AppError;

/// Default navigation wait timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default trailing quiescence window in milliseconds.
pub const DEFAULT_IDLE_TIME_MS: u64 = 500;

/// Default number of in-flight connections tolerated during the idle window.
pub const DEFAULT_MAX_CONNECTIONS: usize = 0;

/// What to fetch and how long to wait for it.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// The URL to navigate to. Treated as an opaque string; Chrome reports
    /// unusable URLs through the navigation result.
    pub url: String,
    /// Overall budget for browser startup, navigation, and the idle wait.
    pub timeout: Duration,
    /// Network-idle thresholds.
    pub idle: NetworkIdle,
}

/// Thresholds for the "network idle" load heuristic: the page counts as
/// loaded once at most `max_connections` requests have been in flight for
/// an uninterrupted `idle_time`. The defaults match the strictest common
/// interpretation (zero connections for 500ms).
#[derive(Debug, Clone, Copy)]
pub struct NetworkIdle {
    pub max_connections: usize,
    pub idle_time: Duration,
}

impl Default for NetworkIdle {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_time: Duration::from_millis(DEFAULT_IDLE_TIME_MS),
        }
    }
}

/// Where and how to launch the browser.
#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    /// Explicit Chrome executable; falls back to `CHROME_PATH` and then
    /// platform well-known locations.
    pub executable: Option<PathBuf>,
    /// Additional Chrome command-line arguments.
    pub extra_args: Vec<String>,
    /// Keep the Chrome sandbox enabled (off by default, matching the
    /// container environments this tool usually runs in).
    pub sandbox: bool,
}

/// Fetch the rendered HTML for one URL.
///
/// Launches a dedicated headless Chrome on a free port, drives a single
/// navigation, and returns the serialized root element of the rendered
/// document. The browser process is owned by a guard inside this function,
/// so it is killed and its temporary profile removed on every exit path.
///
/// # Errors
///
/// Returns `AppError` for any failure: no Chrome executable, launch or
/// startup failure, navigation failure, idle-wait timeout, or extraction
/// failure. The error's exit code classifies the failure.
pub async fn fetch(request: &FetchRequest, browser: &BrowserOptions) -> Result<String, AppError> {
    let executable = chrome::find_chrome_executable(browser.executable.as_deref())?;
    let port = chrome::find_available_port()?;

    let launch = LaunchConfig {
        executable,
        port,
        sandbox: browser.sandbox,
        extra_args: browser.extra_args.clone(),
    };

    // Guard: dropping this kills Chrome and removes its profile, also on
    // the error paths below.
    let _process = chrome::launch_chrome(launch, request.timeout).await?;

    let ws_url = resolve_page_target(port).await?;

    let config = CdpConfig {
        command_timeout: request.timeout,
        ..CdpConfig::default()
    };
    let client = CdpClient::connect(&ws_url, config).await?;

    let result = render_html(&client, request).await;

    // Best-effort socket shutdown; the process guard handles the rest.
    let _ = client.close().await;

    result
}

/// Find the WebSocket debugger URL of the initial page target.
///
/// Headless Chrome starts with a single `about:blank` tab; anything else
/// (no page target, or a target without a debugger URL) is an error.
async fn resolve_page_target(port: u16) -> Result<String, AppError> {
    let targets = chrome::query_targets("127.0.0.1", port).await?;
    targets
        .into_iter()
        .find(|t| t.target_type == "page")
        .and_then(|t| t.ws_debugger_url)
        .ok_or_else(AppError::no_page_target)
}

/// Drive one navigation on an already-connected page target and return the
/// rendered document's root element markup.
///
/// Split out from [`fetch`] so the whole flow is exercisable against a mock
/// CDP server, without a real browser.
///
/// # Errors
///
/// Returns `AppError` on navigation failure, idle-wait timeout, or if the
/// evaluated result is not a string.
pub async fn render_html(client: &CdpClient, request: &FetchRequest) -> Result<String, AppError> {
    client.send_command("Page.enable", None).await?;
    client.send_command("Network.enable", None).await?;

    // Subscribe BEFORE navigating so no request event can be missed.
    let req_rx = client.subscribe("Network.requestWillBeSent").await?;
    let fin_rx = client.subscribe("Network.loadingFinished").await?;
    let fail_rx = client.subscribe("Network.loadingFailed").await?;

    let result = client
        .send_command(
            "Page.navigate",
            Some(serde_json::json!({ "url": request.url })),
        )
        .await?;

    // A failed navigation (DNS, TLS, bad scheme) is reported inline.
    if let Some(error_text) = result["errorText"].as_str() {
        if !error_text.is_empty() {
            return Err(AppError::navigation_failed(error_text));
        }
    }

    wait_for_network_idle(req_rx, fin_rx, fail_rx, request.idle, request.timeout).await?;

    let evaluated = client
        .send_command(
            "Runtime.evaluate",
            Some(serde_json::json!({
                "expression": "document.documentElement.outerHTML",
                "returnByValue": true,
            })),
        )
        .await?;

    extract_outer_html(&evaluated)
}

/// Wait until the network has been quiet for the idle window.
///
/// Quiet means at most `idle.max_connections` requests in flight for an
/// uninterrupted `idle.idle_time`. Bounded overall by `timeout`.
async fn wait_for_network_idle(
    mut req_rx: mpsc::Receiver<CdpEvent>,
    mut fin_rx: mpsc::Receiver<CdpEvent>,
    mut fail_rx: mpsc::Receiver<CdpEvent>,
    idle: NetworkIdle,
    timeout: Duration,
) -> Result<(), AppError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let limit = i64::try_from(idle.max_connections).unwrap_or(i64::MAX);

    let mut in_flight: i64 = 0;
    let idle_timer = tokio::time::sleep(idle.idle_time);
    tokio::pin!(idle_timer);

    loop {
        tokio::select! {
            event = req_rx.recv() => {
                match event {
                    Some(_) => {
                        in_flight += 1;
                        // Activity resets the quiescence window
                        idle_timer.as_mut().reset(tokio::time::Instant::now() + idle.idle_time);
                    }
                    None => return Err(CdpError::ConnectionClosed.into()),
                }
            }
            event = fin_rx.recv() => {
                match event {
                    Some(_) => {
                        in_flight = (in_flight - 1).max(0);
                        if in_flight <= limit {
                            idle_timer.as_mut().reset(tokio::time::Instant::now() + idle.idle_time);
                        }
                    }
                    None => return Err(CdpError::ConnectionClosed.into()),
                }
            }
            event = fail_rx.recv() => {
                match event {
                    Some(_) => {
                        in_flight = (in_flight - 1).max(0);
                        if in_flight <= limit {
                            idle_timer.as_mut().reset(tokio::time::Instant::now() + idle.idle_time);
                        }
                    }
                    None => return Err(CdpError::ConnectionClosed.into()),
                }
            }
            () = &mut idle_timer => {
                if in_flight <= limit {
                    return Ok(());
                }
                // Still busy; keep waiting for the next window
                idle_timer.as_mut().reset(tokio::time::Instant::now() + idle.idle_time);
            }
            () = tokio::time::sleep_until(deadline) => {
                return Err(AppError::navigation_timeout(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ));
            }
        }
    }
}

/// Pull the root element markup out of a `Runtime.evaluate` response.
///
/// An in-page exception or a non-string value is an error; no failure path
/// may produce HTML-ish output.
fn extract_outer_html(evaluated: &serde_json::Value) -> Result<String, AppError> {
    if let Some(details) = evaluated.get("exceptionDetails") {
        let text = details["exception"]["description"]
            .as_str()
            .or_else(|| details["text"].as_str())
            .unwrap_or("in-page exception");
        return Err(AppError::evaluation_failed(text));
    }

    evaluated["result"]["value"]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| AppError::evaluation_failed("result value was not a string"))
}
