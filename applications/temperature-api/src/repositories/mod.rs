pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One ingested temperature sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    pub id: i64,
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
    pub alert: bool,
}

/// Persisted record of one alert-worthy reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Alert {
    pub id: i64,
    pub temperature: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
    pub alert: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub temperature: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub total: i64,
    pub unacknowledged: i64,
    pub today: i64,
}

// async_trait keeps the store object safe so handlers can hold an Arc<dyn TelemetryStore>
#[async_trait::async_trait]
pub trait TelemetryStore: Debug + Send + Sync {
    /// Persist a reading and, when given, its companion alert. Both writes
    /// land together or not at all.
    async fn insert_reading(
        &self,
        reading: NewReading,
        alert: Option<NewAlert>,
    ) -> Result<(Reading, Option<Alert>)>;

    /// Most recent reading by timestamp, ties broken by id.
    async fn latest_reading(&self) -> Result<Option<Reading>>;

    /// Readings newest first, skipping `offset` and returning at most `limit`.
    async fn list_readings(&self, offset: i64, limit: i64) -> Result<Vec<Reading>>;

    /// Alerts newest first, at most `limit`.
    async fn recent_alerts(&self, limit: i64) -> Result<Vec<Alert>>;

    /// Counts over every alert; `today` counts timestamps in `[day_start, day_end)`.
    async fn alert_counts(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<AlertCounts>;

    /// Set `acknowledged` on one alert. `None` when the id is unknown.
    async fn acknowledge_alert(&self, id: i64) -> Result<Option<Alert>>;

    /// Whether the backing store answers.
    async fn ping(&self) -> bool;

    fn backend_name(&self) -> &'static str;
}
