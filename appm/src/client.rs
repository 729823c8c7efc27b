//! APPM control API client
//!
//! APPM hosts a small HTTP interface on localhost while it is running. The
//! client covers the five verbs the orchestrator needs: status (doubling as
//! the readiness handshake), configuration submission, start, stop and close.
//! Every request is timeout-bounded, so callers can race a call against their
//! own cancellation signal without risking an unbounded wait.

use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{
    AppmError, CommandResponse, ConfigResponse, MeasurementConfig, StatusResponse,
    READY_POLL_INTERVAL,
};

/// Timeout for a single control-API request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect timeout; the tool is always on localhost so this stays short
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Client for the control API of a locally running APPM instance
#[derive(Debug, Clone)]
pub struct AppmClient {
    http: Client,
    base_url: String,
}

impl AppmClient {
    /// Client for the API on `127.0.0.1:port`
    pub fn new(port: u16) -> Self {
        Self::with_base_url(format!("http://127.0.0.1:{}", port))
    }

    /// Client for an explicit base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/api/{}", self.base_url, name)
    }

    /// Fetch the current run status. One shot; loop cadence is the caller's.
    pub async fn get_status(&self) -> Result<StatusResponse, AppmError> {
        let response = self
            .http
            .get(self.endpoint("Status"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<StatusResponse>().await?)
    }

    /// Poll the status endpoint until the API answers or `timeout` elapses.
    ///
    /// The first successful response is returned as the handshake; a timeout
    /// maps to [`AppmError::Unavailable`].
    pub async fn wait_for_ready(&self, timeout: Duration) -> Result<StatusResponse, AppmError> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.get_status().await {
                Ok(response) => return Ok(response),
                Err(e) => debug!("APPM API not ready yet: {}", e),
            }

            if Instant::now() >= deadline {
                return Err(AppmError::Unavailable {
                    waited_secs: timeout.as_secs(),
                });
            }

            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Submit a measurement configuration.
    ///
    /// A `Success=false` reply is returned to the caller, not raised: the
    /// caller decides between the rejected-configuration and zero-point
    /// outcomes.
    pub async fn set_configuration(
        &self,
        config: &MeasurementConfig,
    ) -> Result<ConfigResponse, AppmError> {
        config.validate()?;

        let response = self
            .http
            .post(self.endpoint("Configuration"))
            .json(config)
            .send()
            .await
            .map_err(|e| AppmError::command_failed("Configuration", e.to_string()))?
            .error_for_status()
            .map_err(|e| AppmError::command_failed("Configuration", e.to_string()))?;

        Ok(response.json::<ConfigResponse>().await?)
    }

    /// Begin the mapping run
    pub async fn start(&self) -> Result<(), AppmError> {
        self.command("Start").await
    }

    /// Stop a mapping run in progress
    pub async fn stop(&self) -> Result<(), AppmError> {
        self.command("Stop").await
    }

    /// Ask the tool to exit
    pub async fn close(&self) -> Result<(), AppmError> {
        self.command("Close").await
    }

    async fn command(&self, name: &str) -> Result<(), AppmError> {
        debug!("APPM command: {}", name);

        let response = self
            .http
            .get(self.endpoint(name))
            .send()
            .await
            .map_err(|e| AppmError::command_failed(name, e.to_string()))?
            .error_for_status()
            .map_err(|e| AppmError::command_failed(name, e.to_string()))?;

        let reply = response
            .json::<CommandResponse>()
            .await
            .map_err(|e| AppmError::command_failed(name, e.to_string()))?;

        if !reply.success {
            return Err(AppmError::command_failed(
                name,
                reply.message.unwrap_or_else(|| "tool reported failure".to_string()),
            ));
        }

        Ok(())
    }
}
