use super::{Alert, AlertCounts, NewAlert, NewReading, Reading, TelemetryStore};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::sync::{Arc, Mutex, MutexGuard};

/// Process-local store. Both collections sit behind one mutex, so a reading
/// and its alert become visible together.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore(Arc<Mutex<StoreInner>>);

#[derive(Debug, Default)]
struct StoreInner {
    readings: Vec<Reading>,
    alerts: Vec<Alert>,
    next_reading_id: i64,
    next_alert_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.0
            .lock()
            .map_err(|_| AppError::Internal("Failed to lock the store".to_string()))
    }
}

fn newest_first<T, F>(items: &[T], key: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> (DateTime<Utc>, i64),
{
    let mut sorted = items.to_vec();
    sorted.sort_by_key(|item| Reverse(key(item)));
    sorted
}

#[async_trait::async_trait]
impl TelemetryStore for MemoryStore {
    async fn insert_reading(
        &self,
        reading: NewReading,
        alert: Option<NewAlert>,
    ) -> Result<(Reading, Option<Alert>)> {
        let mut inner = self.inner()?;

        inner.next_reading_id += 1;
        let stored = Reading {
            id: inner.next_reading_id,
            temperature: reading.temperature,
            timestamp: reading.timestamp,
            alert: reading.alert,
        };
        inner.readings.push(stored.clone());

        let stored_alert = alert.map(|alert| {
            inner.next_alert_id += 1;
            let record = Alert {
                id: inner.next_alert_id,
                temperature: alert.temperature,
                message: alert.message,
                timestamp: alert.timestamp,
                acknowledged: false,
            };
            inner.alerts.push(record.clone());
            record
        });

        Ok((stored, stored_alert))
    }

    async fn latest_reading(&self) -> Result<Option<Reading>> {
        let inner = self.inner()?;
        Ok(inner
            .readings
            .iter()
            .max_by_key(|r| (r.timestamp, r.id))
            .cloned())
    }

    async fn list_readings(&self, offset: i64, limit: i64) -> Result<Vec<Reading>> {
        let inner = self.inner()?;
        let offset = usize::try_from(offset).unwrap_or(0);
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(newest_first(&inner.readings, |r| (r.timestamp, r.id))
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn recent_alerts(&self, limit: i64) -> Result<Vec<Alert>> {
        let inner = self.inner()?;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(newest_first(&inner.alerts, |a| (a.timestamp, a.id))
            .into_iter()
            .take(limit)
            .collect())
    }

    async fn alert_counts(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<AlertCounts> {
        let inner = self.inner()?;
        let unacknowledged = inner.alerts.iter().filter(|a| !a.acknowledged).count();
        let today = inner
            .alerts
            .iter()
            .filter(|a| a.timestamp >= day_start && a.timestamp < day_end)
            .count();

        Ok(AlertCounts {
            total: inner.alerts.len() as i64,
            unacknowledged: unacknowledged as i64,
            today: today as i64,
        })
    }

    async fn acknowledge_alert(&self, id: i64) -> Result<Option<Alert>> {
        let mut inner = self.inner()?;
        Ok(inner.alerts.iter_mut().find(|a| a.id == id).map(|alert| {
            alert.acknowledged = true;
            alert.clone()
        }))
    }

    async fn ping(&self) -> bool {
        self.inner().is_ok()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
