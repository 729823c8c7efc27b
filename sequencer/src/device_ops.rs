//! Device Operations Trait
//!
//! The narrow mediator surface the model-building instructions consume. The
//! host application implements this against its own camera, filter wheel and
//! guider handling; the instructions never talk to hardware directly.

use async_trait::async_trait;
use std::sync::Arc;

/// Result type for device operations
pub type DeviceResult<T> = Result<T, String>;

/// Mediator operations needed around a model-building run
#[async_trait]
pub trait DeviceOps: Send + Sync {
    /// Whether a camera is connected; the tool needs one to measure points
    async fn camera_is_connected(&self) -> DeviceResult<bool>;

    /// Whether a filter wheel is connected
    async fn filterwheel_is_connected(&self) -> DeviceResult<bool>;

    /// Name of the currently selected filter
    async fn filterwheel_get_filter(&self) -> DeviceResult<String>;

    /// Change to the named filter and wait for the wheel to settle
    async fn filterwheel_set_filter(&self, name: &str) -> DeviceResult<()>;

    /// Whether a guider is connected
    async fn guider_is_connected(&self) -> DeviceResult<bool>;

    /// Whether the guider is actively guiding
    async fn guider_is_guiding(&self) -> DeviceResult<bool>;

    /// Start guiding
    async fn guider_start(&self) -> DeviceResult<()>;

    /// Stop guiding
    async fn guider_stop(&self) -> DeviceResult<()>;

    /// Send a notification to the user
    async fn send_notification(&self, level: &str, title: &str, message: &str) -> DeviceResult<()>;
}

/// Shared device operations handle
pub type SharedDeviceOps = Arc<dyn DeviceOps>;

/// A null implementation for testing without real devices
pub struct NullDeviceOps;

#[async_trait]
impl DeviceOps for NullDeviceOps {
    async fn camera_is_connected(&self) -> DeviceResult<bool> {
        Ok(true)
    }

    async fn filterwheel_is_connected(&self) -> DeviceResult<bool> {
        Ok(false)
    }

    async fn filterwheel_get_filter(&self) -> DeviceResult<String> {
        Err("No filter wheel connected".to_string())
    }

    async fn filterwheel_set_filter(&self, name: &str) -> DeviceResult<()> {
        tracing::info!("[NULL] Changing filter to {}", name);
        Ok(())
    }

    async fn guider_is_connected(&self) -> DeviceResult<bool> {
        Ok(false)
    }

    async fn guider_is_guiding(&self) -> DeviceResult<bool> {
        Ok(false)
    }

    async fn guider_start(&self) -> DeviceResult<()> {
        tracing::info!("[NULL] Starting guiding");
        Ok(())
    }

    async fn guider_stop(&self) -> DeviceResult<()> {
        tracing::info!("[NULL] Stopping guiding");
        Ok(())
    }

    async fn send_notification(&self, level: &str, title: &str, message: &str) -> DeviceResult<()> {
        tracing::info!("[NULL] Notification [{}] {}: {}", level, title, message);
        Ok(())
    }
}
