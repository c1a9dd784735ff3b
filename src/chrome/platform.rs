use std::path::PathBuf;

use super::ChromeError;

/// Find a Chrome or Chromium executable.
///
/// Checks the explicit override first (the `--chrome-path` flag or a config
/// file entry), then the `CHROME_PATH` environment variable, then
/// platform-specific well-known paths.
///
/// # Errors
///
/// Returns `ChromeError::NotFound` if no executable can be located.
pub fn find_chrome_executable(explicit: Option<&std::path::Path>) -> Result<PathBuf, ChromeError> {
    let env_override = std::env::var("CHROME_PATH").ok().map(PathBuf::from);
    find_chrome_from(explicit, env_override.as_deref())
}

/// The testable core of [`find_chrome_executable`]: accepts the environment
/// override as a parameter instead of reading `CHROME_PATH` directly.
fn find_chrome_from(
    explicit: Option<&std::path::Path>,
    env_override: Option<&std::path::Path>,
) -> Result<PathBuf, ChromeError> {
    if let Some(p) = explicit {
        if p.exists() {
            return Ok(p.to_path_buf());
        }
        return Err(ChromeError::NotFound(format!(
            "{} does not exist",
            p.display()
        )));
    }

    if let Some(p) = env_override {
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }

    for candidate in chrome_candidates() {
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(ChromeError::NotFound(
        "could not find a Chrome or Chromium executable. Use --chrome-path to specify one".into(),
    ))
}

/// Returns all candidate executable paths for the current platform.
fn chrome_candidates() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        macos_candidates()
    }

    #[cfg(target_os = "linux")]
    {
        linux_candidates()
    }

    #[cfg(target_os = "windows")]
    {
        windows_candidates()
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        vec![]
    }
}

#[cfg(target_os = "macos")]
fn macos_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
    ]
}

#[cfg(target_os = "linux")]
fn linux_candidates() -> Vec<PathBuf> {
    let path_dirs: Vec<PathBuf> = std::env::var("PATH")
        .unwrap_or_default()
        .split(':')
        .map(PathBuf::from)
        .collect();

    let names = [
        "google-chrome",
        "google-chrome-stable",
        "chromium-browser",
        "chromium",
    ];

    let mut candidates = Vec::new();
    for name in names {
        for dir in &path_dirs {
            candidates.push(dir.join(name));
        }
    }
    candidates
}

#[cfg(target_os = "windows")]
fn windows_candidates() -> Vec<PathBuf> {
    let program_files = std::env::var("ProgramFiles").unwrap_or_default();
    let program_files_x86 = std::env::var("ProgramFiles(x86)").unwrap_or_default();

    vec![
        PathBuf::from(&program_files).join("Google/Chrome/Application/chrome.exe"),
        PathBuf::from(&program_files_x86).join("Google/Chrome/Application/chrome.exe"),
    ]
}
