use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::alarm::AlarmSnapshot;
use crate::models::{Alert, AlertStats, Reading};

/// The three independent poll cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PollKind {
    Latest,
    Alerts,
    History,
}

impl fmt::Display for PollKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollKind::Latest => "latest reading",
            PollKind::Alerts => "alerts",
            PollKind::History => "history",
        };
        f.write_str(name)
    }
}

/// Everything the dashboard has derived from its polls.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub latest: Option<Reading>,
    pub alarm: AlarmSnapshot,
    pub alerts: Vec<Alert>,
    pub stats: Option<AlertStats>,
    pub history: Vec<Reading>,
    /// Last failure per poll kind, cleared by that kind's next success.
    pub errors: BTreeMap<PollKind, String>,
    /// Stamp of the alerts fetch whose result is shown.
    pub alerts_stamp: u64,
}

pub type SharedState = Arc<RwLock<DashboardState>>;

impl DashboardState {
    pub fn record_error(&mut self, kind: PollKind, message: impl Into<String>) {
        self.errors.insert(kind, message.into());
    }

    pub fn clear_error(&mut self, kind: PollKind) {
        self.errors.remove(&kind);
    }

    /// The fetched alert that carries the same sample as the tracked alarm.
    pub fn alert_for_alarm(&self) -> Option<&Alert> {
        let alarm = self.alarm.alarm.as_ref()?;
        self.alerts
            .iter()
            .find(|a| a.temperature == alarm.temperature && a.timestamp == alarm.timestamp)
    }
}
