use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AudioConfig;

/// One audible beep.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AudioCue: Send + Sync {
    async fn beep(&self) -> std::io::Result<()>;
}

/// Rings the terminal bell on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

#[async_trait::async_trait]
impl AudioCue for TerminalBell {
    async fn beep(&self) -> std::io::Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(b"\x07").await?;
        stdout.flush().await
    }
}

/// Plays a short beep sequence per alarm. Sequences never overlap.
#[derive(Clone)]
pub struct CuePlayer {
    cue: Arc<dyn AudioCue>,
    playing: Arc<AtomicBool>,
    enabled: bool,
    beeps: u32,
    interval: Duration,
}

/// Clears the playing flag when playback ends, panics included.
struct PlayingGuard(Arc<AtomicBool>);

impl Drop for PlayingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CuePlayer {
    pub fn new(cue: Arc<dyn AudioCue>, config: &AudioConfig) -> Self {
        Self {
            cue,
            playing: Arc::new(AtomicBool::new(false)),
            enabled: config.enabled,
            beeps: config.beeps,
            interval: Duration::from_millis(config.beep_interval_ms),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Start a beep sequence unless one is already playing.
    pub fn trigger(&self) -> Option<JoinHandle<()>> {
        if !self.enabled || self.beeps == 0 {
            return None;
        }
        if self
            .playing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("audio cue already playing, skipping");
            return None;
        }

        let guard = PlayingGuard(self.playing.clone());
        let cue = self.cue.clone();
        let beeps = self.beeps;
        let interval = self.interval;

        Some(tokio::spawn(async move {
            let _guard = guard;
            for i in 0..beeps {
                if i > 0 {
                    tokio::time::sleep(interval).await;
                }
                if let Err(e) = cue.beep().await {
                    warn!(error = %e, "audio cue failed");
                    break;
                }
            }
        }))
    }
}
