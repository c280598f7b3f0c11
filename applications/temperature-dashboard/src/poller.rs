use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

use crate::alarm::{reconcile, AlarmEvent};
use crate::api::{ApiError, TelemetrySource};
use crate::audio::CuePlayer;
use crate::config::Config;
use crate::models::{Alert, Reading};
use crate::state::{DashboardState, PollKind, SharedState};

#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub latest_every: Duration,
    pub alerts_every: Duration,
    pub history_every: Duration,
    pub history_limit: u32,
    pub confirm_alarm: f64,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            latest_every: config.polling.latest_every(),
            alerts_every: config.polling.alerts_every(),
            history_every: config.polling.history_every(),
            history_limit: config.polling.history_limit,
            confirm_alarm: config.thresholds.confirm_alarm,
        }
    }

    fn every(&self, kind: PollKind) -> Duration {
        match kind {
            PollKind::Latest => self.latest_every,
            PollKind::Alerts => self.alerts_every,
            PollKind::History => self.history_every,
        }
    }
}

/// Runs single poll cycles and folds their results into the shared state.
pub struct Poller {
    source: Arc<dyn TelemetrySource>,
    state: SharedState,
    player: CuePlayer,
    settings: PollSettings,
    changes: watch::Sender<u64>,
    /// Last stamp handed to an alerts fetch.
    alerts_issued: AtomicU64,
}

impl Poller {
    pub fn new(source: Arc<dyn TelemetrySource>, player: CuePlayer, settings: PollSettings) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            source,
            state: SharedState::default(),
            player,
            settings,
            changes,
            alerts_issued: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn player(&self) -> &CuePlayer {
        &self.player
    }

    /// Receives a new revision number after every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub async fn poll(&self, kind: PollKind) {
        match kind {
            PollKind::Latest => self.poll_latest().await,
            PollKind::Alerts => self.poll_alerts().await,
            PollKind::History => self.poll_history().await,
        }
    }

    pub async fn poll_latest(&self) {
        match self.source.latest_reading().await {
            Ok(reading) => self.apply_latest(reading).await,
            Err(e) => self.record_failure(PollKind::Latest, e).await,
        }
    }

    /// Fetch alerts and stats together. A fetch that finishes after a
    /// later-started one has been applied is dropped.
    pub async fn poll_alerts(&self) {
        let stamp = self.alerts_issued.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = tokio::try_join!(self.source.recent_alerts(), self.source.alert_stats());

        let applied = {
            let mut state = self.state.write().await;
            if stamp < state.alerts_stamp {
                false
            } else {
                state.alerts_stamp = stamp;
                match fetched {
                    Ok((alerts, stats)) => {
                        state.alerts = alerts;
                        state.stats = Some(stats);
                        state.clear_error(PollKind::Alerts);
                    }
                    Err(e) => {
                        warn!(poll = %PollKind::Alerts, error = %e, "Poll failed");
                        state.record_error(PollKind::Alerts, e.to_string());
                    }
                }
                true
            }
        };

        if applied {
            self.notify();
        } else {
            debug!(stamp, "Dropped stale alerts fetch");
        }
    }

    pub async fn poll_history(&self) {
        match self
            .source
            .reading_history(1, self.settings.history_limit)
            .await
        {
            Ok(history) => {
                self.update(|state| {
                    state.history = history;
                    state.clear_error(PollKind::History);
                })
                .await
            }
            Err(e) => self.record_failure(PollKind::History, e).await,
        }
    }

    /// Acknowledge one alert on the server, then refresh alerts and stats.
    pub async fn acknowledge(&self, id: i64) -> Result<Alert, ApiError> {
        let alert = self.source.acknowledge_alert(id).await?;
        info!(alert_id = id, "Alert acknowledged");

        self.update(|state| {
            let tracked = state
                .alarm
                .alarm
                .as_ref()
                .is_some_and(|a| a.temperature == alert.temperature && a.timestamp == alert.timestamp);
            if tracked {
                state.alarm.acknowledge();
            }
        })
        .await;

        self.poll_alerts().await;
        Ok(alert)
    }

    /// Acknowledge the tracked alarm locally, and its alert record on the
    /// server when the last alert list holds one for the same sample.
    pub async fn dismiss(&self) -> Result<Option<Alert>, ApiError> {
        let matching = {
            let mut state = self.state.write().await;
            if state.alarm.acknowledge().is_none() {
                return Ok(None);
            }
            state
                .alert_for_alarm()
                .filter(|a| !a.acknowledged)
                .map(|a| a.id)
        };
        self.notify();
        info!("Alarm dismissed");

        match matching {
            Some(id) => self.acknowledge(id).await.map(Some),
            None => Ok(None),
        }
    }

    async fn apply_latest(&self, reading: Option<Reading>) {
        let confirm = self.settings.confirm_alarm;
        self.update(|state| {
            if let Some(fetched) = &reading {
                let reconciled = reconcile(&state.alarm, fetched, confirm);
                match &reconciled.event {
                    Some(AlarmEvent::Raised(alarm)) => {
                        warn!(
                            temperature = alarm.temperature,
                            timestamp = %alarm.timestamp,
                            "High temperature alarm"
                        );
                        self.player.trigger();
                    }
                    Some(AlarmEvent::Cleared) => info!("Temperature back to normal, alarm cleared"),
                    None => {}
                }
                state.alarm = reconciled.snapshot;
            }
            state.latest = reading;
            state.clear_error(PollKind::Latest);
        })
        .await
    }

    async fn record_failure(&self, kind: PollKind, error: ApiError) {
        warn!(poll = %kind, error = %error, "Poll failed");
        self.update(|state| state.record_error(kind, error.to_string()))
            .await
    }

    async fn update(&self, apply: impl FnOnce(&mut DashboardState)) {
        {
            let mut state = self.state.write().await;
            apply(&mut *state);
        }
        self.notify();
    }

    fn notify(&self) {
        self.changes.send_modify(|revision| *revision += 1);
    }
}

/// The three periodic pollers sharing one cancellation token.
pub struct Dashboard {
    poller: Arc<Poller>,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Dashboard {
    pub fn new(source: Arc<dyn TelemetrySource>, player: CuePlayer, settings: PollSettings) -> Self {
        Self {
            poller: Arc::new(Poller::new(source, player, settings)),
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    pub fn start(&self) {
        for kind in [PollKind::Latest, PollKind::Alerts, PollKind::History] {
            let every = self.poller.settings.every(kind);
            self.tracker.spawn(run_periodic(
                self.poller.clone(),
                kind,
                every,
                self.token.clone(),
            ));
        }
        info!("Pollers started");
    }

    /// Cancel every poller and in-flight request, then wait for the tasks.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Pollers stopped");
    }

    pub async fn restart(&mut self) {
        self.shutdown().await;
        self.token = CancellationToken::new();
        self.tracker = TaskTracker::new();
        self.start();
    }
}

async fn run_periodic(poller: Arc<Poller>, kind: PollKind, every: Duration, token: CancellationToken) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            _ = token.cancelled() => {
                debug!(poll = %kind, "In-flight poll cancelled");
                break;
            }
            _ = poller.poll(kind) => {}
        }
    }

    debug!(poll = %kind, "Poller exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockTelemetrySource;
    use crate::audio::MockAudioCue;
    use crate::config::AudioConfig;
    use crate::models::AlertStats;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings() -> PollSettings {
        PollSettings {
            latest_every: Duration::from_secs(5),
            alerts_every: Duration::from_secs(10),
            history_every: Duration::from_secs(30),
            history_limit: 50,
            confirm_alarm: 30.0,
        }
    }

    fn silent_player() -> CuePlayer {
        let mut cue = MockAudioCue::new();
        cue.expect_beep().never();
        CuePlayer::new(Arc::new(cue), &AudioConfig::default())
    }

    fn single_beep_player(times: usize) -> CuePlayer {
        let mut cue = MockAudioCue::new();
        cue.expect_beep().times(times).returning(|| Ok(()));
        let config = AudioConfig {
            enabled: true,
            beeps: 1,
            beep_interval_ms: 10,
        };
        CuePlayer::new(Arc::new(cue), &config)
    }

    fn hot_reading() -> Reading {
        Reading {
            id: 3,
            temperature: 31.0,
            timestamp: Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap(),
            alert: true,
        }
    }

    fn alert_for(reading: &Reading, id: i64, acknowledged: bool) -> Alert {
        Alert {
            id,
            temperature: reading.temperature,
            message: format!("High temperature alert: {}°C exceeds threshold of 28°C", reading.temperature),
            timestamp: reading.timestamp,
            acknowledged,
        }
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_pollers_fire_on_independent_intervals() {
        let (latest, alerts, stats, history) = (counter(), counter(), counter(), counter());
        let mut source = MockTelemetrySource::new();
        let c = latest.clone();
        source.expect_latest_reading().returning(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });
        let c = alerts.clone();
        source.expect_recent_alerts().returning(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        });
        let c = stats.clone();
        source.expect_alert_stats().returning(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(AlertStats::default())
        });
        let c = history.clone();
        source
            .expect_reading_history()
            .withf(|page, limit| *page == 1 && *limit == 50)
            .returning(move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(vec![])
            });

        let dashboard = Dashboard::new(Arc::new(source), silent_player(), settings());
        dashboard.start();
        tokio::time::sleep(Duration::from_secs(11)).await;
        dashboard.shutdown().await;

        assert_eq!(latest.load(Ordering::SeqCst), 3);
        assert_eq!(alerts.load(Ordering::SeqCst), 2);
        assert_eq!(stats.load(Ordering::SeqCst), 2);
        assert_eq!(history.load(Ordering::SeqCst), 1);
    }

    struct StalledSource;

    #[async_trait::async_trait]
    impl TelemetrySource for StalledSource {
        async fn latest_reading(&self) -> Result<Option<Reading>, ApiError> {
            std::future::pending().await
        }
        async fn recent_alerts(&self) -> Result<Vec<Alert>, ApiError> {
            std::future::pending().await
        }
        async fn alert_stats(&self) -> Result<AlertStats, ApiError> {
            std::future::pending().await
        }
        async fn reading_history(&self, _page: u32, _limit: u32) -> Result<Vec<Reading>, ApiError> {
            std::future::pending().await
        }
        async fn acknowledge_alert(&self, _id: i64) -> Result<Alert, ApiError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_in_flight_requests_silently() {
        let dashboard = Dashboard::new(Arc::new(StalledSource), silent_player(), settings());
        dashboard.start();
        tokio::time::sleep(Duration::from_secs(1)).await;

        tokio::time::timeout(Duration::from_secs(1), dashboard.shutdown())
            .await
            .expect("pollers did not stop");

        let state = dashboard.poller().state().read().await;
        assert!(state.errors.is_empty());
        assert!(state.latest.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_polls_again_at_once() {
        let latest = counter();
        let mut source = MockTelemetrySource::new();
        let c = latest.clone();
        source.expect_latest_reading().returning(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });
        source.expect_recent_alerts().returning(|| Ok(vec![]));
        source.expect_alert_stats().returning(|| Ok(AlertStats::default()));
        source.expect_reading_history().returning(|_, _| Ok(vec![]));

        let mut dashboard = Dashboard::new(Arc::new(source), silent_player(), settings());
        dashboard.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(latest.load(Ordering::SeqCst), 1);

        dashboard.restart().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(latest.load(Ordering::SeqCst), 2);

        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_poll_sets_banner_until_next_success() {
        let mut source = MockTelemetrySource::new();
        source
            .expect_latest_reading()
            .times(1)
            .returning(|| Err(ApiError::Network("connection refused".into())));
        source
            .expect_latest_reading()
            .times(1)
            .returning(|| Ok(None));

        let poller = Poller::new(Arc::new(source), silent_player(), settings());
        let mut changes = poller.subscribe();

        poller.poll_latest().await;
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();
        {
            let state = poller.state().read().await;
            let banner = state.errors.get(&PollKind::Latest).unwrap();
            assert!(banner.contains("connection refused"));
        }

        poller.poll_latest().await;
        assert!(changes.has_changed().unwrap());
        assert!(poller.state().read().await.errors.is_empty());
    }

    #[tokio::test]
    async fn test_alert_poll_failure_keeps_previous_lists() {
        let reading = hot_reading();
        let alert = alert_for(&reading, 1, false);
        let mut source = MockTelemetrySource::new();
        let first = alert.clone();
        source
            .expect_recent_alerts()
            .times(1)
            .returning(move || Ok(vec![first.clone()]));
        source
            .expect_recent_alerts()
            .returning(|| Ok(vec![]));
        source
            .expect_alert_stats()
            .times(1)
            .returning(|| Ok(AlertStats { total: 1, unacknowledged: 1, today: 1 }));
        source.expect_alert_stats().returning(|| {
            Err(ApiError::Http {
                status: 500,
                message: "Internal server error".into(),
            })
        });

        let poller = Poller::new(Arc::new(source), silent_player(), settings());
        poller.poll_alerts().await;
        poller.poll_alerts().await;

        let state = poller.state().read().await;
        assert_eq!(state.alerts, vec![alert]);
        assert_eq!(state.stats.unwrap().total, 1);
        assert!(state.errors.contains_key(&PollKind::Alerts));
    }

    /// The first alerts fetch waits on `gate` and returns `stale`; every
    /// later one returns `fresh` at once.
    struct GatedSource {
        gate: std::sync::Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
        fetches: AtomicUsize,
        stale: Alert,
        fresh: Alert,
    }

    #[async_trait::async_trait]
    impl TelemetrySource for GatedSource {
        async fn latest_reading(&self) -> Result<Option<Reading>, ApiError> {
            Ok(None)
        }
        async fn recent_alerts(&self) -> Result<Vec<Alert>, ApiError> {
            if self.fetches.fetch_add(1, Ordering::SeqCst) > 0 {
                return Ok(vec![self.fresh.clone()]);
            }
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(vec![self.stale.clone()])
        }
        async fn alert_stats(&self) -> Result<AlertStats, ApiError> {
            Ok(AlertStats::default())
        }
        async fn reading_history(&self, _page: u32, _limit: u32) -> Result<Vec<Reading>, ApiError> {
            Ok(vec![])
        }
        async fn acknowledge_alert(&self, _id: i64) -> Result<Alert, ApiError> {
            Ok(self.fresh.clone())
        }
    }

    #[tokio::test]
    async fn test_slow_alerts_fetch_does_not_undo_acknowledge() {
        let reading = hot_reading();
        let (release, gate) = tokio::sync::oneshot::channel();
        let source = GatedSource {
            gate: std::sync::Mutex::new(Some(gate)),
            fetches: AtomicUsize::new(0),
            stale: alert_for(&reading, 7, false),
            fresh: alert_for(&reading, 7, true),
        };
        let poller = Arc::new(Poller::new(Arc::new(source), silent_player(), settings()));

        // Periodic fetch starts before the acknowledge and stalls
        let periodic = tokio::spawn({
            let poller = poller.clone();
            async move { poller.poll_alerts().await }
        });
        while poller.alerts_issued.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        poller.acknowledge(7).await.unwrap();
        assert_eq!(poller.state().read().await.alerts, vec![alert_for(&reading, 7, true)]);

        release.send(()).unwrap();
        periodic.await.unwrap();

        let state = poller.state().read().await;
        assert_eq!(state.alerts, vec![alert_for(&reading, 7, true)]);
        assert_eq!(state.alerts_stamp, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_latest_plays_cue_once() {
        let reading = hot_reading();
        let mut source = MockTelemetrySource::new();
        source
            .expect_latest_reading()
            .times(3)
            .returning(move || Ok(Some(reading.clone())));

        let poller = Poller::new(Arc::new(source), single_beep_player(1), settings());
        for _ in 0..3 {
            poller.poll_latest().await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        assert!(poller.state().read().await.alarm.is_critical());
        assert!(!poller.player().is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_flag_below_confirm_is_not_critical() {
        let mut source = MockTelemetrySource::new();
        source.expect_latest_reading().returning(|| {
            Ok(Some(Reading {
                id: 2,
                temperature: 29.5,
                timestamp: Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap(),
                alert: true,
            }))
        });

        let poller = Poller::new(Arc::new(source), single_beep_player(0), settings());
        poller.poll_latest().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let state = poller.state().read().await;
        assert!(state.latest.as_ref().unwrap().alert);
        assert!(!state.alarm.is_critical());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_acknowledges_matching_alert() {
        let reading = hot_reading();
        let unacked = alert_for(&reading, 7, false);
        let acked = alert_for(&reading, 7, true);

        let mut source = MockTelemetrySource::new();
        let r = reading.clone();
        source
            .expect_latest_reading()
            .returning(move || Ok(Some(r.clone())));
        let first = unacked.clone();
        source
            .expect_recent_alerts()
            .times(1)
            .returning(move || Ok(vec![first.clone()]));
        let after = acked.clone();
        source
            .expect_recent_alerts()
            .returning(move || Ok(vec![after.clone()]));
        source
            .expect_alert_stats()
            .returning(|| Ok(AlertStats { total: 1, unacknowledged: 0, today: 1 }));
        let returned = acked.clone();
        source
            .expect_acknowledge_alert()
            .withf(|id| *id == 7)
            .times(1)
            .returning(move |_| Ok(returned.clone()));

        let poller = Poller::new(Arc::new(source), single_beep_player(1), settings());
        poller.poll_latest().await;
        poller.poll_alerts().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let dismissed = poller.dismiss().await.unwrap();
        assert_eq!(dismissed, Some(acked.clone()));

        // Re-polling the same reading neither re-raises nor beeps again
        poller.poll_latest().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let state = poller.state().read().await;
        assert!(!state.alarm.is_critical());
        assert!(state.alarm.alarm.as_ref().unwrap().acknowledged);
        assert_eq!(state.alerts, vec![acked]);
    }

    #[tokio::test]
    async fn test_dismiss_without_alarm_is_noop() {
        let mut source = MockTelemetrySource::new();
        source.expect_acknowledge_alert().never();

        let poller = Poller::new(Arc::new(source), silent_player(), settings());
        assert_eq!(poller.dismiss().await.unwrap(), None);
    }
}
