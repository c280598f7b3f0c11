use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One temperature sample as served by `/api/data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
    pub alert: bool,
}

impl Reading {
    /// Identity used for alarm tracking. The record id plays no part.
    pub fn same_sample(&self, temperature: f64, timestamp: DateTime<Utc>) -> bool {
        self.temperature == temperature && self.timestamp == timestamp
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingPage {
    pub data: Vec<Reading>,
}
