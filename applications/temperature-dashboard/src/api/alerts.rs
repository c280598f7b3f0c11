use super::client::{ApiClient, ApiError};
use crate::models::{AcknowledgeResponse, Alert, AlertStats};

impl ApiClient {
    pub async fn recent_alerts(&self) -> Result<Vec<Alert>, ApiError> {
        self.get("/api/alerts").await
    }

    pub async fn alert_stats(&self) -> Result<AlertStats, ApiError> {
        self.get("/api/alerts/stats").await
    }

    /// Mark an alert acknowledged and return the updated record
    pub async fn acknowledge_alert(&self, id: i64) -> Result<Alert, ApiError> {
        let response: AcknowledgeResponse =
            self.put(&format!("/api/alerts/{}/acknowledge", id)).await?;
        Ok(response.alert)
    }
}
