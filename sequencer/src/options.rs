//! Per-run tool options
//!
//! A [`ModelToolOptions`] value is a snapshot taken when the instruction is
//! built. Settings changed in the host afterwards only take effect on the
//! next run; nothing here listens for live changes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use aptools_appm::{MeasurementConfig, DEFAULT_API_PORT, MIN_SUPPORTED_VERSION};

/// Snapshot of the Point Mapper settings for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelToolOptions {
    /// Location of the ApPointMapper executable
    pub exe_path: PathBuf,
    /// Optional `.appm` settings file handed to the tool
    pub settings_path: Option<PathBuf>,
    /// Port of the tool's local control API
    pub api_port: u16,
    /// Oldest tool release this plugin drives
    pub min_version: String,
    /// How long to wait for the control API after launch
    pub ready_timeout_secs: u64,
    /// Cadence of the status poll while a run is active
    pub status_poll_interval_secs: f64,

    /// Right-ascension point spacing of a dec arc, degrees
    pub dec_arc_ra_spacing: i32,
    /// Declination spacing between arcs, degrees
    pub dec_arc_dec_spacing: i32,
    /// Number of declination arcs to sweep
    pub dec_arc_quantity: i32,
    /// Hours of hour angle to model ahead of the target's current position
    pub hour_angle_lead_in: f64,
    /// Tool point-ordering strategy for ordinary targets
    pub point_ordering_strategy: i32,
    /// Tool point-ordering strategy near the celestial poles
    pub polar_point_ordering_strategy: i32,
    /// Pole distance (degrees) at or below which the polar strategy applies
    pub polar_proximity_limit: i32,

    /// Filter to swap in for plate solving, restored after the run
    pub plate_solve_filter: Option<String>,

    /// Measurement parameters used as-is for all-sky runs and as the base
    /// payload that dec-arc geometry overrides
    pub all_sky: MeasurementConfig,
}

impl Default for ModelToolOptions {
    fn default() -> Self {
        Self {
            exe_path: PathBuf::new(),
            settings_path: None,
            api_port: DEFAULT_API_PORT,
            min_version: MIN_SUPPORTED_VERSION.to_string(),
            ready_timeout_secs: 30,
            status_poll_interval_secs: 1.0,
            dec_arc_ra_spacing: 5,
            dec_arc_dec_spacing: 3,
            dec_arc_quantity: 3,
            hour_angle_lead_in: 0.5,
            point_ordering_strategy: 0,
            polar_point_ordering_strategy: 2,
            polar_proximity_limit: 10,
            plate_solve_filter: None,
            all_sky: MeasurementConfig::default(),
        }
    }
}

impl ModelToolOptions {
    pub fn status_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.status_poll_interval_secs.max(0.05))
    }

    pub fn ready_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ready_timeout_secs)
    }
}
