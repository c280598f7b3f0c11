pub mod alerts;
pub mod client;
pub mod readings;

pub use client::{ApiClient, ApiError};

use crate::models::{Alert, AlertStats, Reading};

/// Everything the pollers read from or write to the temperature API.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn latest_reading(&self) -> Result<Option<Reading>, ApiError>;
    async fn recent_alerts(&self) -> Result<Vec<Alert>, ApiError>;
    async fn alert_stats(&self) -> Result<AlertStats, ApiError>;
    async fn reading_history(&self, page: u32, limit: u32) -> Result<Vec<Reading>, ApiError>;
    async fn acknowledge_alert(&self, id: i64) -> Result<Alert, ApiError>;
}

#[async_trait::async_trait]
impl TelemetrySource for ApiClient {
    async fn latest_reading(&self) -> Result<Option<Reading>, ApiError> {
        ApiClient::latest_reading(self).await
    }

    async fn recent_alerts(&self) -> Result<Vec<Alert>, ApiError> {
        ApiClient::recent_alerts(self).await
    }

    async fn alert_stats(&self) -> Result<AlertStats, ApiError> {
        ApiClient::alert_stats(self).await
    }

    async fn reading_history(&self, page: u32, limit: u32) -> Result<Vec<Reading>, ApiError> {
        ApiClient::reading_history(self, page, limit).await
    }

    async fn acknowledge_alert(&self, id: i64) -> Result<Alert, ApiError> {
        ApiClient::acknowledge_alert(self, id).await
    }
}
