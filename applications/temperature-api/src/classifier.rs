//! Server-side threshold classification of ingested readings.

/// Classifies temperatures against the ingest threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdClassifier {
    threshold: f64,
}

impl ThresholdClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// A reading is alert-worthy only when strictly above the threshold.
    pub fn is_alert(&self, temperature: f64) -> bool {
        temperature > self.threshold
    }

    /// Human-readable message stored on the alert record.
    pub fn alert_message(&self, temperature: f64) -> String {
        format!(
            "High temperature alert: {}°C exceeds threshold of {}°C",
            temperature, self.threshold
        )
    }
}
