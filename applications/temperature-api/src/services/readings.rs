use crate::classifier::ThresholdClassifier;
use crate::error::{AppError, Result};
use crate::repositories::{Alert, NewAlert, NewReading, Reading, TelemetryStore};
use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub reading: Reading,
    pub alert: Option<Alert>,
}

#[derive(Clone)]
pub struct ReadingService {
    store: Arc<dyn TelemetryStore>,
    classifier: ThresholdClassifier,
}

impl ReadingService {
    pub fn new(store: Arc<dyn TelemetryStore>, classifier: ThresholdClassifier) -> Self {
        Self { store, classifier }
    }

    /// Classify and persist one reading. Alert-worthy readings get a companion
    /// alert carrying the same temperature and timestamp.
    pub async fn ingest(
        &self,
        temperature: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<IngestOutcome> {
        if !temperature.is_finite() {
            return Err(AppError::Validation(
                "temperature must be a finite number".to_string(),
            ));
        }

        // TIMESTAMPTZ keeps microseconds; truncate so every read returns the same value
        let timestamp = timestamp.unwrap_or_else(Utc::now).trunc_subsecs(6);
        let is_alert = self.classifier.is_alert(temperature);

        let companion = is_alert.then(|| NewAlert {
            temperature,
            message: self.classifier.alert_message(temperature),
            timestamp,
        });

        let (reading, alert) = self
            .store
            .insert_reading(
                NewReading {
                    temperature,
                    timestamp,
                    alert: is_alert,
                },
                companion,
            )
            .await?;

        match &alert {
            Some(alert) => warn!(
                reading_id = reading.id,
                alert_id = alert.id,
                temperature = %temperature,
                threshold = %self.classifier.threshold(),
                "temperature alert raised"
            ),
            None => debug!(reading_id = reading.id, temperature = %temperature, "reading stored"),
        }

        Ok(IngestOutcome { reading, alert })
    }

    pub async fn latest(&self) -> Result<Reading> {
        self.store
            .latest_reading()
            .await?
            .ok_or_else(|| AppError::NotFound("No data available".to_string()))
    }

    /// One page of readings, newest first. Pages past the end are empty.
    pub async fn history(&self, params: HistoryParams) -> Result<Vec<Reading>> {
        let (page, limit) = validate_history_params(&params)?;
        let offset = (page - 1).saturating_mul(limit);

        self.store.list_readings(offset, limit).await
    }
}

fn validate_history_params(params: &HistoryParams) -> Result<(i64, i64)> {
    let page = params.page.unwrap_or(DEFAULT_PAGE);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    if page < 1 {
        return Err(AppError::Validation("page must be at least 1".to_string()));
    }

    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    Ok((page, limit))
}
