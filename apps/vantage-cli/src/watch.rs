//! `vantage watch`: follows the self-play and training dashboards. While it
//! runs, stdin takes `p`/`n`/`l` to browse the followed game, `g <n>` to
//! open a finished game and `w <id>` to follow another worker.

use std::{io::BufRead, str::FromStr, sync::Arc, thread, time::Duration};

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use vantage_network::{spawn_poller, DashboardClient, PollGate};
use vantage_ops::EventLog;
use vantage_telemetry::dashboard::{
    actor_summary, live_summary, training_summary, worker_rows, DashboardTracker,
};
use vantage_types::{
    config::VantageConfig,
    events::{EventPayload, SessionEvent},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum WatchCommand {
    Prev,
    Next,
    Live,
    Game(usize),
    Worker(String),
}

impl FromStr for WatchCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("p" | "prev"), None) => Ok(Self::Prev),
            (Some("n" | "next"), None) => Ok(Self::Next),
            (Some("l" | "live"), None) => Ok(Self::Live),
            (Some("g" | "game"), Some(index)) => index
                .parse()
                .map(Self::Game)
                .map_err(|_| format!("bad game index '{index}'")),
            (Some("w" | "worker"), Some(id)) => Ok(Self::Worker(id.to_string())),
            _ => Err(format!(
                "unknown command '{}' (p, n, l, g <n>, w <id>)",
                line.trim()
            )),
        }
    }
}

pub async fn watch(config: &VantageConfig, once: bool) -> Result<()> {
    let client = DashboardClient::new(&config.dashboard)?;
    let log = EventLog::from_config(&config.ops);
    let tracker = Arc::new(Mutex::new(DashboardTracker::new(
        config.dashboard.active_worker.clone(),
    )));

    if once {
        poll_dashboard(&client, &log, &tracker).await;
        return Ok(());
    }

    let period = Duration::from_millis(config.dashboard.poll_interval_ms);
    let poll_tracker = Arc::clone(&tracker);
    let mut poller = spawn_poller(period, PollGate::new(), move || {
        let client = client.clone();
        let log = log.clone();
        let tracker = Arc::clone(&poll_tracker);
        async move { poll_dashboard(&client, &log, &tracker).await }
    });

    let mut commands = spawn_stdin_reader();
    loop {
        tokio::select! {
            joined = &mut poller => {
                joined?;
                return Ok(());
            }
            command = commands.recv() => match command {
                Some(command) => apply(&tracker, command).await,
                None => {
                    poller.await?;
                    return Ok(());
                }
            },
        }
    }
}

fn spawn_stdin_reader() -> mpsc::Receiver<WatchCommand> {
    let (tx, rx) = mpsc::channel(16);
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<WatchCommand>() {
                Ok(command) => {
                    if tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                Err(err) => warn!("{err}"),
            }
        }
    });
    rx
}

async fn apply(tracker: &Mutex<DashboardTracker>, command: WatchCommand) {
    let mut tracker = tracker.lock().await;
    match command {
        WatchCommand::Prev => {
            tracker.cursor_mut().prev();
        }
        WatchCommand::Next => {
            tracker.cursor_mut().next();
        }
        WatchCommand::Live => tracker.cursor_mut().go_live(),
        WatchCommand::Game(index) => match tracker.open_game(index) {
            Some(game) => info!(
                id = %game.id,
                result = %game.result,
                moves = game.moves,
                "opened game"
            ),
            None => warn!(index, "no such game in the gallery"),
        },
        WatchCommand::Worker(id) => tracker.select(id),
    }
    let cursor = tracker.cursor();
    info!(
        index = cursor.index(),
        live = cursor.is_live(),
        fen = cursor.current().unwrap_or("-"),
        "position"
    );
}

async fn poll_dashboard(
    client: &DashboardClient,
    log: &EventLog,
    tracker: &Mutex<DashboardTracker>,
) {
    match client.actor_status().await {
        Ok(status) => {
            {
                let mut tracker = tracker.lock().await;
                let sampled = tracker.observe(&status);
                for row in worker_rows(&status, tracker.worker()) {
                    info!(
                        worker = %row.id,
                        status = %row.status,
                        moves = row.move_count,
                        depth = %row.depth,
                        win_rate = ?row.win_rate,
                        active = row.active,
                        "worker"
                    );
                }
                if sampled {
                    info!("{}", live_summary(&tracker));
                    if let Some(phases) = tracker.series().phase_times() {
                        info!(
                            opening = phases.recent.opening,
                            midgame = phases.recent.midgame,
                            endgame = phases.recent.endgame,
                            "recent phase seconds"
                        );
                    }
                }
                let openings = tracker.openings();
                if !openings.is_empty() {
                    info!(?openings, "top openings");
                }
            }
            record(log, actor_summary(&status)).await;
        }
        Err(err) => warn!(%err, "actor status unavailable"),
    }
    match client.training_stats().await {
        Ok(stats) => record(log, training_summary(&stats)).await,
        Err(err) => warn!(%err, "training stats unavailable"),
    }
}

async fn record(log: &EventLog, summary: String) {
    info!("{summary}");
    log.record(SessionEvent::new(EventPayload::Dashboard { summary }))
        .await;
}
