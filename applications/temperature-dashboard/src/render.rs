//! Plain-text view of the dashboard state.

use std::fmt::{self, Write};

use chrono::{DateTime, Local, Utc};

use crate::state::DashboardState;

/// Severity shown on the data card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Critical,
    Alert,
    Warning,
    Normal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::Critical => "CRITICAL",
            Level::Alert => "ALERT",
            Level::Warning => "WARNING",
            Level::Normal => "NORMAL",
        };
        f.write_str(label)
    }
}

/// Level of the latest reading, `None` before any data arrived.
pub fn level(state: &DashboardState, display_warn: f64) -> Option<Level> {
    let latest = state.latest.as_ref()?;
    let level = if state.alarm.is_critical() {
        Level::Critical
    } else if latest.alert {
        Level::Alert
    } else if latest.temperature > display_warn {
        Level::Warning
    } else {
        Level::Normal
    };
    Some(level)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

pub fn history_summary(state: &DashboardState) -> Option<HistorySummary> {
    if state.history.is_empty() {
        return None;
    }
    let temps = state.history.iter().map(|r| r.temperature);
    let min = temps.clone().fold(f64::INFINITY, f64::min);
    let max = temps.clone().fold(f64::NEG_INFINITY, f64::max);
    let mean = temps.sum::<f64>() / state.history.len() as f64;
    Some(HistorySummary {
        count: state.history.len(),
        min,
        max,
        mean,
    })
}

fn local_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn render(state: &DashboardState, display_warn: f64) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_view(&mut out, state, display_warn);
    out
}

fn write_view(out: &mut String, state: &DashboardState, display_warn: f64) -> fmt::Result {
    writeln!(out, "=== Temperature Monitor ===")?;

    for (kind, message) in &state.errors {
        writeln!(out, "! {} unavailable: {}", kind, message)?;
    }

    if state.alarm.is_critical() {
        if let Some(alarm) = &state.alarm.alarm {
            writeln!(
                out,
                "*** CRITICAL: {:.1}°C at {} (type `dismiss` to acknowledge) ***",
                alarm.temperature,
                local_time(&alarm.timestamp)
            )?;
        }
    }

    match (&state.latest, level(state, display_warn)) {
        (Some(latest), Some(level)) => writeln!(
            out,
            "Current: {:.1}°C [{}] at {}",
            latest.temperature,
            level,
            local_time(&latest.timestamp)
        )?,
        _ => writeln!(out, "Current: no data yet")?,
    }

    if let Some(stats) = &state.stats {
        writeln!(
            out,
            "Alerts: {} total, {} unacknowledged, {} today",
            stats.total, stats.unacknowledged, stats.today
        )?;
    }

    if !state.alerts.is_empty() {
        writeln!(out, "Recent alerts:")?;
        for alert in &state.alerts {
            writeln!(
                out,
                "  #{:<5} {}  {:.1}°C  {}",
                alert.id,
                local_time(&alert.timestamp),
                alert.temperature,
                if alert.acknowledged { "acknowledged" } else { "open" }
            )?;
        }
    }

    if let Some(summary) = history_summary(state) {
        writeln!(
            out,
            "History: {} readings, min {:.1}°C, max {:.1}°C, mean {:.1}°C",
            summary.count, summary.min, summary.max, summary.mean
        )?;
    }

    Ok(())
}
