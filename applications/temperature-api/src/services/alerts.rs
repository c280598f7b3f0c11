use crate::error::{AppError, Result};
use crate::repositories::{Alert, AlertCounts, TelemetryStore};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AlertService {
    store: Arc<dyn TelemetryStore>,
    recent_limit: i64,
}

impl AlertService {
    pub fn new(store: Arc<dyn TelemetryStore>, recent_limit: i64) -> Self {
        Self {
            store,
            recent_limit,
        }
    }

    pub async fn recent(&self) -> Result<Vec<Alert>> {
        self.store.recent_alerts(self.recent_limit).await
    }

    /// Alert statistics with "today" measured in server local time.
    pub async fn stats(&self) -> Result<AlertCounts> {
        self.stats_at(&Local::now()).await
    }

    /// Fresh counts on every call; `today` covers the calendar day containing `now`.
    pub async fn stats_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<AlertCounts> {
        let (day_start, day_end) = day_bounds(now);
        self.store.alert_counts(day_start, day_end).await
    }

    /// Mark an alert acknowledged. Acknowledging twice returns the same record.
    pub async fn acknowledge(&self, id: &str) -> Result<Alert> {
        let not_found = || AppError::NotFound(format!("Alert {} not found", id));

        let numeric_id: i64 = id.parse().map_err(|_| not_found())?;
        let alert = self
            .store
            .acknowledge_alert(numeric_id)
            .await?
            .ok_or_else(not_found)?;

        info!(alert_id = alert.id, "alert acknowledged");
        Ok(alert)
    }
}

/// `[midnight, next midnight)` of the local calendar day containing `now`, in UTC.
pub fn day_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let today = now.date_naive();
    let start = local_midnight(&tz, today);
    let end = today
        .succ_opt()
        .map(|tomorrow| local_midnight(&tz, tomorrow))
        .unwrap_or_else(|| start + Duration::days(1));
    (start, end)
}

// A DST jump at midnight has no 00:00; take the first local minute that exists.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::default());
    (0..=180)
        .find_map(|minutes| {
            tz.from_local_datetime(&(midnight + Duration::minutes(minutes)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
