//! Measurement configuration payload
//!
//! The full set of parameters describing one point-measurement run. A
//! configuration is built fresh for every run and never mutated after it has
//! been submitted to the tool.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::AppmError;

/// Parameters for one APPM measurement run.
///
/// Field names serialize in the tool's own PascalCase so the JSON body and
/// the legacy `Key=Value` file share one definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeasurementConfig {
    pub create_west_points: bool,
    pub create_east_points: bool,
    pub point_ordering_strategy: i32,
    pub declination_spacing: i32,
    pub declination_offset: i32,
    pub use_min_altitude: bool,
    pub right_ascension_spacing: i32,
    pub right_ascension_offset: i32,
    pub use_min_declination: bool,
    pub use_max_declination: bool,
    pub min_declination: i32,
    pub max_declination: i32,
    pub use_min_hour_angle_east: bool,
    pub use_max_hour_angle_west: bool,
    pub min_hour_angle_east: f64,
    pub max_hour_angle_west: f64,
    pub use_meridian_limits: bool,
    pub use_horizon_limits: bool,
    pub set_slew_rate: bool,
    pub slew_rate: i32,
    pub point_safety_distance: i32,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            create_west_points: true,
            create_east_points: true,
            point_ordering_strategy: 0,
            declination_spacing: 0,
            declination_offset: 0,
            use_min_altitude: true,
            right_ascension_spacing: 0,
            right_ascension_offset: 0,
            use_min_declination: true,
            use_max_declination: true,
            min_declination: 0,
            max_declination: 0,
            use_min_hour_angle_east: true,
            use_max_hour_angle_west: true,
            min_hour_angle_east: -12.0,
            max_hour_angle_west: 12.0,
            use_meridian_limits: false,
            use_horizon_limits: false,
            set_slew_rate: false,
            slew_rate: 600,
            point_safety_distance: 5,
        }
    }
}

impl MeasurementConfig {
    /// Reject configurations the tool would refuse or misinterpret.
    ///
    /// Checked before submission; a violation here is a caller bug, not a
    /// tool rejection.
    pub fn validate(&self) -> Result<(), AppmError> {
        if self.min_declination > self.max_declination {
            return Err(AppmError::InvalidConfiguration(format!(
                "MinDeclination {} exceeds MaxDeclination {}",
                self.min_declination, self.max_declination
            )));
        }
        if self.min_hour_angle_east > self.max_hour_angle_west {
            return Err(AppmError::InvalidConfiguration(format!(
                "MinHourAngleEast {} exceeds MaxHourAngleWest {}",
                self.min_hour_angle_east, self.max_hour_angle_west
            )));
        }
        if self.declination_spacing < 0 || self.right_ascension_spacing < 0 {
            return Err(AppmError::InvalidConfiguration(format!(
                "negative spacing (dec {}, RA {})",
                self.declination_spacing, self.right_ascension_spacing
            )));
        }
        if self.point_safety_distance < 0 {
            return Err(AppmError::InvalidConfiguration(format!(
                "negative point safety distance {}",
                self.point_safety_distance
            )));
        }
        Ok(())
    }

    /// Write the legacy `-M` measurement file: `# comment` header lines
    /// followed by one `Key=Value` line per field.
    pub fn write_to(&self, mut out: impl Write, comments: &[String]) -> std::io::Result<()> {
        for line in comments {
            writeln!(out, "# {}", line)?;
        }

        writeln!(out, "CreateWestPoints={}", fmt_bool(self.create_west_points))?;
        writeln!(out, "CreateEastPoints={}", fmt_bool(self.create_east_points))?;
        writeln!(out, "PointOrderingStrategy={}", self.point_ordering_strategy)?;
        writeln!(out, "DeclinationSpacing={}", self.declination_spacing)?;
        writeln!(out, "DeclinationOffset={}", self.declination_offset)?;
        writeln!(out, "UseMinAltitude={}", fmt_bool(self.use_min_altitude))?;
        writeln!(out, "RightAscensionSpacing={}", self.right_ascension_spacing)?;
        writeln!(out, "RightAscensionOffset={}", self.right_ascension_offset)?;
        writeln!(out, "UseMinDeclination={}", fmt_bool(self.use_min_declination))?;
        writeln!(out, "UseMaxDeclination={}", fmt_bool(self.use_max_declination))?;
        writeln!(out, "MinDeclination={}", self.min_declination)?;
        writeln!(out, "MaxDeclination={}", self.max_declination)?;
        writeln!(
            out,
            "UseMinHourAngleEast={}",
            fmt_bool(self.use_min_hour_angle_east)
        )?;
        writeln!(
            out,
            "UseMaxHourAngleWest={}",
            fmt_bool(self.use_max_hour_angle_west)
        )?;
        writeln!(out, "MinHourAngleEast={}", self.min_hour_angle_east)?;
        writeln!(out, "MaxHourAngleWest={}", self.max_hour_angle_west)?;
        writeln!(out, "UseMeridianLimits={}", fmt_bool(self.use_meridian_limits))?;
        writeln!(out, "UseHorizonLimits={}", fmt_bool(self.use_horizon_limits))?;
        writeln!(out, "SetSlewRate={}", fmt_bool(self.set_slew_rate))?;
        writeln!(out, "SlewRate={}", self.slew_rate)?;
        writeln!(out, "PointSafetyDistance={}", self.point_safety_distance)?;

        out.flush()
    }

    /// Write the legacy measurement file to `path`
    pub fn write_measurement_file(&self, path: &Path, comments: &[String]) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(std::io::BufWriter::new(file), comments)
    }
}

/// The tool parses .NET-style booleans from the file
fn fmt_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
