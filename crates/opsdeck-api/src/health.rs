// Backend health probe.

use crate::client::Client;
use crate::error::Error;
use crate::models::HealthResponse;

impl Client {
    /// Probe the backend's health endpoint. Unlike the admin surface,
    /// `/health` is unenveloped and requires no credential.
    pub async fn check_health(&self) -> Result<HealthResponse, Error> {
        self.get_json("/health", None).await
    }
}
