mod client;
mod error;
mod transport;
mod types;

pub use client::{CdpClient, CdpConfig};
pub use error::CdpError;
pub use types::{CdpEvent, CdpResponse};
