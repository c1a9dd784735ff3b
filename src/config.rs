use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Represents the parsed TOML config file. All fields optional; anything
/// unset falls through to the CLI defaults.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub launch: LaunchSection,
    pub fetch: FetchSection,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LaunchSection {
    pub executable: Option<PathBuf>,
    pub extra_args: Option<Vec<String>>,
    pub sandbox: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub timeout_ms: Option<u64>,
    pub idle_time_ms: Option<u64>,
    pub max_connections: Option<usize>,
}

#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading the config file.
    Io(std::io::Error),
    /// Config file is not valid TOML.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config file error: {e}"),
            Self::Parse(e) => write!(f, "invalid config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ConfigError> for crate::error::AppError {
    fn from(e: ConfigError) -> Self {
        use crate::error::ExitCode;
        Self {
            message: e.to_string(),
            code: ExitCode::GeneralError,
        }
    }
}

/// Find the first config file that exists, checking locations in priority order.
///
/// Search order:
/// 1. `explicit_path` (from `--config` flag)
/// 2. `$PAGEDUMP_CONFIG` environment variable
/// 3. `./.pagedump.toml` (project-local)
/// 4. `<config_dir>/pagedump/config.toml` (XDG / platform config dir)
/// 5. `~/.pagedump.toml` (home directory fallback)
#[must_use]
pub fn find_config_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
    find_config_file_with(explicit_path, std::env::var("PAGEDUMP_CONFIG").ok())
}

/// Testable variant of [`find_config_file`] that accepts an explicit env value.
#[must_use]
pub fn find_config_file_with(
    explicit_path: Option<&Path>,
    env_config: Option<String>,
) -> Option<PathBuf> {
    // 1. Explicit --config path
    if let Some(p) = explicit_path {
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }

    // 2. $PAGEDUMP_CONFIG
    if let Some(env_path) = env_config {
        let p = PathBuf::from(env_path);
        if p.exists() {
            return Some(p);
        }
    }

    // 3. Project-local dotfile
    let local = PathBuf::from(".pagedump.toml");
    if local.exists() {
        return Some(local);
    }

    // 4. Platform config dir
    if let Some(config_dir) = dirs::config_dir() {
        let p = config_dir.join("pagedump").join("config.toml");
        if p.exists() {
            return Some(p);
        }
    }

    // 5. Home directory fallback
    if let Some(home) = dirs::home_dir() {
        let p = home.join(".pagedump.toml");
        if p.exists() {
            return Some(p);
        }
    }

    None
}

/// Load the config file found by [`find_config_file`], or defaults if none exists.
///
/// # Errors
///
/// Returns `ConfigError::Io` if a found file cannot be read, or
/// `ConfigError::Parse` if its contents are not valid TOML.
pub fn load_config(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    match find_config_file(explicit_path) {
        Some(path) => load_config_from(&path),
        None => Ok(ConfigFile::default()),
    }
}

/// Parse a config file at a specific path. Testable variant of [`load_config`].
///
/// # Errors
///
/// Returns `ConfigError::Io` on read failure or `ConfigError::Parse` on
/// invalid TOML.
pub fn load_config_from(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
}
