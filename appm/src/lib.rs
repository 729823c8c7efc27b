//! Astro-Physics Point Mapper (APPM) Client
//!
//! Implements the local control interface of the APPM mount-modeling tool:
//! launching or discovering the tool process, the HTTP control API
//! (status / configuration / start / stop / close), and the measurement
//! configuration payload the tool consumes.

mod client;
mod config;
mod error;
mod process;
mod status;

pub use client::*;
pub use config::*;
pub use error::*;
pub use process::*;
pub use status::*;

/// Default port of APPM's local control API
pub const DEFAULT_API_PORT: u16 = 60011;

/// Oldest APPM release whose control API this client understands
pub const MIN_SUPPORTED_VERSION: &str = "1.9.2.0";

/// Interval between readiness probes while waiting for the API to come up
pub const READY_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
