//! Typed records exchanged with the APPM control API

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::AppmError;

/// State of the tool's mapping run as reported by the status endpoint.
///
/// APPM reports a handful of transient states while slewing between points;
/// anything this client does not recognize decodes to `Unknown` so a newer
/// tool build cannot break the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MappingRunState {
    Idle,
    Starting,
    Running,
    Pausing,
    Paused,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MappingRunState {
    /// True once the run can no longer make progress
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MappingRunState::Cancelled | MappingRunState::Failed | MappingRunState::Completed
        )
    }
}

impl fmt::Display for MappingRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MappingRunState::Unknown => "Unknown",
            MappingRunState::Idle => "Idle",
            MappingRunState::Starting => "Starting",
            MappingRunState::Running => "Running",
            MappingRunState::Pausing => "Pausing",
            MappingRunState::Paused => "Paused",
            MappingRunState::Cancelling => "Cancelling",
            MappingRunState::Cancelled => "Cancelled",
            MappingRunState::Failed => "Failed",
            MappingRunState::Completed => "Completed",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of the current mapping run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppmStatus {
    #[serde(default)]
    pub mapping_run_state: MappingRunState,
    #[serde(default)]
    pub measurement_points_count: u32,
}

/// Reply of the status endpoint, also used as the readiness handshake.
///
/// `version` is the tool's self-reported release; it gates the run before any
/// configuration is pushed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusResponse {
    pub status: AppmStatus,
    #[serde(default)]
    pub version: Option<String>,
}

/// Reply to a measurement configuration submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigResponse {
    pub success: bool,
    #[serde(default)]
    pub point_count: u32,
    #[serde(default)]
    pub message: Option<String>,
}

/// Reply to the start/stop/close control verbs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Dotted tool version, e.g. `1.9.2.4`.
///
/// Missing trailing components compare as zero, so `1.9` equals `1.9.0.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion(Vec<u32>);

impl ToolVersion {
    pub fn parts(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for ToolVersion {
    type Err = AppmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .split('.')
            .map(|p| {
                p.parse::<u32>()
                    .map_err(|_| AppmError::Parse(serde::de::Error::custom(format!(
                        "invalid version component {:?} in {:?}",
                        p, s
                    ))))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ToolVersion(parts))
    }
}

impl PartialOrd for ToolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ToolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{}", joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_terminal_states() {
        assert!(MappingRunState::Completed.is_terminal());
        assert!(MappingRunState::Failed.is_terminal());
        assert!(MappingRunState::Cancelled.is_terminal());
        assert!(!MappingRunState::Running.is_terminal());
        assert!(!MappingRunState::Idle.is_terminal());
        assert!(!MappingRunState::Unknown.is_terminal());
    }

    #[test]
    fn status_decodes_pascal_case() {
        let json = r#"{"Status":{"MappingRunState":"Running","MeasurementPointsCount":17},"Version":"1.9.2.6"}"#;
        let resp: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status.mapping_run_state, MappingRunState::Running);
        assert_eq!(resp.status.measurement_points_count, 17);
        assert_eq!(resp.version.as_deref(), Some("1.9.2.6"));
    }

    #[test]
    fn unrecognized_run_state_is_unknown() {
        let json = r#"{"MappingRunState":"SlewingToPoint","MeasurementPointsCount":3}"#;
        let status: AppmStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.mapping_run_state, MappingRunState::Unknown);
        assert_eq!(status.measurement_points_count, 3);
    }

    #[test]
    fn status_fields_default_when_absent() {
        let resp: StatusResponse = serde_json::from_str(r#"{"Status":{}}"#).unwrap();
        assert_eq!(resp.status.mapping_run_state, MappingRunState::Unknown);
        assert_eq!(resp.status.measurement_points_count, 0);
        assert!(resp.version.is_none());
    }

    #[test]
    fn version_parse_and_ordering() {
        let v1924: ToolVersion = "1.9.2.4".parse().unwrap();
        let v1926: ToolVersion = "1.9.2.6".parse().unwrap();
        let v19: ToolVersion = "1.9".parse().unwrap();
        let v1900: ToolVersion = "1.9.0.0".parse().unwrap();

        assert!(v1924 < v1926);
        assert!(v19 < v1924);
        assert_eq!(v19.cmp(&v1900), Ordering::Equal);
        assert_eq!(v1926.to_string(), "1.9.2.6");
    }

    #[test]
    fn version_gate_boundary_is_inclusive() {
        let min: ToolVersion = "1.9.2.0".parse().unwrap();
        let found: ToolVersion = "1.9.2.0".parse().unwrap();
        assert!(found >= min);
    }

    #[test]
    fn version_rejects_garbage() {
        assert!("".parse::<ToolVersion>().is_err());
        assert!("1.x.2".parse::<ToolVersion>().is_err());
    }
}
