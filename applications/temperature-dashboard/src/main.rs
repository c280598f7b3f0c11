use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use temperature_dashboard::{
    api::ApiClient,
    audio::{CuePlayer, TerminalBell},
    commands::{self, Command, HELP},
    render::render,
    Config, Dashboard, DashboardError, PollSettings, Poller,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cfg_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".into());
    let cfg = Config::load(&cfg_path)?;

    // stdout belongs to the dashboard view
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    info!(api = %cfg.api.base_url, "Starting temperature-dashboard");

    let client = ApiClient::new(
        cfg.api.base_url.as_str(),
        Duration::from_secs(cfg.api.request_timeout_secs),
    )
    .map_err(|e| DashboardError::Client(e.to_string()))?;
    let player = CuePlayer::new(Arc::new(TerminalBell), &cfg.audio);
    let mut dashboard = Dashboard::new(Arc::new(client), player, PollSettings::from_config(&cfg));

    let view = tokio::spawn(render_loop(
        dashboard.poller().clone(),
        cfg.thresholds.display_warn,
    ));
    dashboard.start();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => tokio::select! {
                        _ = &mut shutdown => break,
                        _ = commands::execute(&mut dashboard, command) => {}
                    },
                    Err(e) => warn!("{} ({})", e, HELP),
                },
                Ok(None) => {
                    info!("stdin closed, commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin, commands disabled");
                    stdin_open = false;
                }
            },
        }
    }

    dashboard.shutdown().await;
    view.abort();
    info!("Dashboard shutdown complete");
    Ok(())
}

/// Redraw whenever the pollers change the state.
async fn render_loop(poller: Arc<Poller>, display_warn: f64) {
    let mut changes = poller.subscribe();
    while changes.changed().await.is_ok() {
        let view = {
            let state = poller.state().read().await;
            render(&state, display_warn)
        };
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "\x1b[2J\x1b[H{}{}", view, HELP);
        let _ = stdout.flush();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
