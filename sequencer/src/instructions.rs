//! Instruction plumbing
//!
//! Result and context types shared by the model-building instructions. The
//! host sequencer owns scheduling; an instruction receives a context with the
//! resolved target, the device mediators and a cancellation flag, and returns
//! an [`InstructionResult`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use aptools_appm::MappingRunState;

use crate::device_ops::{NullDeviceOps, SharedDeviceOps};

/// Outcome of an instruction execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionStatus {
    Success,
    Failure,
    Cancelled,
}

/// Result of an instruction execution
pub struct InstructionResult {
    pub status: InstructionStatus,
    pub message: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl InstructionResult {
    pub fn success() -> Self {
        Self {
            status: InstructionStatus::Success,
            message: None,
            data: None,
        }
    }

    pub fn success_with_message(message: impl Into<String>) -> Self {
        Self {
            status: InstructionStatus::Success,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: InstructionStatus::Failure,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            status: InstructionStatus::Cancelled,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Get the status, logging any failure or cancellation message.
    /// This ensures error messages are not silently discarded.
    pub fn log_and_get_status(self, instruction_name: &str) -> InstructionStatus {
        match self.status {
            InstructionStatus::Failure => {
                if let Some(msg) = &self.message {
                    tracing::error!("{} failed: {}", instruction_name, msg);
                } else {
                    tracing::error!("{} failed (no details)", instruction_name);
                }
            }
            InstructionStatus::Cancelled => {
                if let Some(msg) = &self.message {
                    tracing::warn!("{} cancelled: {}", instruction_name, msg);
                }
            }
            _ => {}
        }
        self.status
    }
}

/// Live progress of a mapping run.
///
/// Written only by the status-poll task; the host reads it for UI binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelProgress {
    pub run_state: MappingRunState,
    pub measured_points: u32,
    pub total_points: u32,
}

/// Context for instruction execution
pub struct InstructionContext {
    /// Target name, as resolved by the host
    pub target_name: Option<String>,
    /// Target RA in hours, current epoch
    pub target_ra: Option<f64>,
    /// Target Dec in degrees, current epoch
    pub target_dec: Option<f64>,
    /// Observer's longitude (degrees, east positive)
    pub longitude: Option<f64>,
    /// Cancellation token
    pub cancellation_token: Arc<AtomicBool>,
    /// Device operations handler
    pub device_ops: SharedDeviceOps,
    /// Run progress, exposed to the host for UI binding
    pub progress: Arc<RwLock<ModelProgress>>,
    /// Progress callback, invoked on every poll tick
    pub progress_callback: Option<Arc<dyn Fn(ModelProgress) + Send + Sync>>,
}

impl InstructionContext {
    pub fn new() -> Self {
        Self {
            target_name: None,
            target_ra: None,
            target_dec: None,
            longitude: None,
            cancellation_token: Arc::new(AtomicBool::new(false)),
            device_ops: Arc::new(NullDeviceOps),
            progress: Arc::new(RwLock::new(ModelProgress::default())),
            progress_callback: None,
        }
    }

    pub fn with_device_ops(mut self, ops: SharedDeviceOps) -> Self {
        self.device_ops = ops;
        self
    }

    pub fn with_target(mut self, name: impl Into<String>, ra_hours: f64, dec_degrees: f64) -> Self {
        self.target_name = Some(name.into());
        self.target_ra = Some(ra_hours);
        self.target_dec = Some(dec_degrees);
        self
    }

    pub fn with_longitude(mut self, longitude: f64) -> Self {
        self.longitude = Some(longitude);
        self
    }

    pub fn check_cancelled(&self) -> Option<InstructionResult> {
        if self.cancellation_token.load(Ordering::Relaxed) {
            Some(InstructionResult::cancelled("Operation cancelled"))
        } else {
            None
        }
    }

    /// Resolves once cancellation is requested; pair with `tokio::select!`
    /// around long waits so they abort promptly.
    pub async fn wait_cancelled(&self) {
        while !self.cancellation_token.load(Ordering::Relaxed) {
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Overwrite the shared progress and notify the callback
    pub async fn publish_progress(&self, update: ModelProgress) {
        *self.progress.write().await = update;
        if let Some(callback) = &self.progress_callback {
            callback(update);
        }
    }
}

impl Default for InstructionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_starts_without_target() {
        let ctx = InstructionContext::new();
        assert!(ctx.target_name.is_none());
        assert!(ctx.target_ra.is_none());
        assert!(ctx.target_dec.is_none());
        assert!(ctx.check_cancelled().is_none());
    }

    #[test]
    fn context_with_target() {
        let ctx = InstructionContext::new().with_target("M31", 0.712, 41.27);
        assert_eq!(ctx.target_name.as_deref(), Some("M31"));
        assert_eq!(ctx.target_ra, Some(0.712));
        assert_eq!(ctx.target_dec, Some(41.27));
    }

    #[test]
    fn check_cancelled_reflects_token() {
        let ctx = InstructionContext::new();
        ctx.cancellation_token.store(true, Ordering::Relaxed);
        let result = ctx.check_cancelled().unwrap();
        assert_eq!(result.status, InstructionStatus::Cancelled);
    }

    #[tokio::test]
    async fn publish_progress_updates_shared_state() {
        let ctx = InstructionContext::new();
        ctx.publish_progress(ModelProgress {
            run_state: MappingRunState::Running,
            measured_points: 4,
            total_points: 40,
        })
        .await;

        let progress = ctx.progress.read().await;
        assert_eq!(progress.run_state, MappingRunState::Running);
        assert_eq!(progress.measured_points, 4);
        assert_eq!(progress.total_points, 40);
    }
}
