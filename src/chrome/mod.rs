mod endpoint;
mod error;
mod launcher;
mod platform;

pub use endpoint::{BrowserVersion, TargetInfo, query_targets, query_version};
pub use error::ChromeError;
pub use launcher::{ChromeProcess, LaunchConfig, find_available_port, launch_chrome};
pub use platform::find_chrome_executable;
