pub mod alerts;
pub mod health;
pub mod readings;

use std::sync::Arc;

use crate::classifier::ThresholdClassifier;
use crate::config::Config;
use crate::repositories::TelemetryStore;
use crate::services::{AlertService, ReadingService};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    pub readings: ReadingService,
    pub alerts: AlertService,
}

impl AppState {
    pub fn new(store: Arc<dyn TelemetryStore>, config: &Config) -> Self {
        let classifier = ThresholdClassifier::new(config.thresholds.ingest_alert);
        Self {
            readings: ReadingService::new(store.clone(), classifier),
            alerts: AlertService::new(store.clone(), config.alerts.recent_limit),
            store,
        }
    }
}
