use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::repositories::Reading;

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub message: String,
    pub alert: bool,
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadingListResponse {
    pub data: Vec<Reading>,
}

impl From<crate::services::IngestOutcome> for IngestResponse {
    fn from(outcome: crate::services::IngestOutcome) -> Self {
        Self {
            message: "Data received successfully".to_string(),
            alert: outcome.reading.alert,
            temperature: outcome.reading.temperature,
            timestamp: outcome.reading.timestamp,
        }
    }
}
