use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".into()
}

fn default_request_timeout() -> u64 {
    10
}

/// Poll intervals, one per independent task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_latest_secs")]
    pub latest_secs: u64,
    #[serde(default = "default_alerts_secs")]
    pub alerts_secs: u64,
    #[serde(default = "default_history_secs")]
    pub history_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            latest_secs: default_latest_secs(),
            alerts_secs: default_alerts_secs(),
            history_secs: default_history_secs(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_latest_secs() -> u64 {
    5
}

fn default_alerts_secs() -> u64 {
    10
}

fn default_history_secs() -> u64 {
    30
}

fn default_history_limit() -> u32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// A server-flagged reading must also exceed this to raise the alarm.
    #[serde(default = "default_confirm_alarm")]
    pub confirm_alarm: f64,
    /// Display-only warning level.
    #[serde(default = "default_display_warn")]
    pub display_warn: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            confirm_alarm: default_confirm_alarm(),
            display_warn: default_display_warn(),
        }
    }
}

fn default_confirm_alarm() -> f64 {
    30.0
}

fn default_display_warn() -> f64 {
    25.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_beeps")]
    pub beeps: u32,
    #[serde(default = "default_beep_interval")]
    pub beep_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            beeps: default_beeps(),
            beep_interval_ms: default_beep_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_beeps() -> u32 {
    3
}

fn default_beep_interval() -> u64 {
    400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

impl PollingConfig {
    pub fn latest_every(&self) -> Duration {
        Duration::from_secs(self.latest_secs)
    }

    pub fn alerts_every(&self) -> Duration {
        Duration::from_secs(self.alerts_secs)
    }

    pub fn history_every(&self) -> Duration {
        Duration::from_secs(self.history_secs)
    }
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let cfg = Self::from_yaml(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let expanded = expand_env_placeholders(raw)?;
        serde_yaml::from_str(&expanded)
            .map_err(|e| DashboardError::Config(format!("invalid config YAML: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(DashboardError::Config("api.base_url is required".into()));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(DashboardError::Config(
                "api.request_timeout_secs must be positive".into(),
            ));
        }
        for (name, secs) in [
            ("polling.latest_secs", self.polling.latest_secs),
            ("polling.alerts_secs", self.polling.alerts_secs),
            ("polling.history_secs", self.polling.history_secs),
        ] {
            if secs == 0 {
                return Err(DashboardError::Config(format!("{} must be positive", name)));
            }
        }
        if !(1..=1000).contains(&self.polling.history_limit) {
            return Err(DashboardError::Config(
                "polling.history_limit must be between 1 and 1000".into(),
            ));
        }
        if !self.thresholds.confirm_alarm.is_finite() || !self.thresholds.display_warn.is_finite() {
            return Err(DashboardError::Config(
                "thresholds must be finite numbers".into(),
            ));
        }
        Ok(())
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
fn expand_env_placeholders(input: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$(?:\(([A-Za-z_][A-Za-z0-9_]*)\)|\{([A-Za-z_][A-Za-z0-9_]*)\})")
        .map_err(|e| DashboardError::Config(e.to_string()))?;

    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for cap in re.captures_iter(input) {
        let Some(whole) = cap.get(0) else { continue };
        let var = cap
            .get(1)
            .or_else(|| cap.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let val = std::env::var(var).map_err(|_| {
            DashboardError::Config(format!("missing environment variable: {}", var))
        })?;
        out.push_str(&input[last..whole.start()]);
        out.push_str(&val);
        last = whole.end();
    }
    out.push_str(&input[last..]);

    Ok(out)
}
