mod ui;
mod watch;

use std::{env, sync::Arc, thread, time::Duration};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;
use vantage_network::{EventBus, HttpGateway, InMemoryBackend, SyncGateway};
use vantage_ops::{init_tracing, EventLog};
use vantage_rules::ShakmatyRules;
use vantage_session::{reconcile_fen, Session, SessionRunner};
use vantage_telemetry::{history_rows, EngineStatsPanel, HistoryRow, TelemetryProjector};
use vantage_types::{config::VantageConfig, game::GameSnapshot, telemetry::TelemetrySeries};

use crate::ui::{ChannelRenderer, UiMessage};

const PLAY_LOG_FILE: &str = "logs/vantage.log";

#[derive(Debug, Parser)]
#[command(name = "vantage", version, about = "Chess research client")]
struct Cli {
    /// Config file; falls back to $VANTAGE_CONFIG, then configs/dev.toml.
    #[arg(short, long, global = true)]
    config: Option<String>,
    /// Talk to the built-in backend instead of the HTTP one.
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive board in the terminal (default).
    Play,
    /// Print the current game state and its telemetry as JSON.
    State,
    /// Follow the self-play dashboard endpoints.
    Watch {
        /// Poll once and exit.
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone());
    let command = cli.command.unwrap_or(Command::Play);

    // stderr belongs to the terminal UI while playing.
    let mut ops = config.ops.clone();
    if matches!(command, Command::Play) && ops.log_file.is_none() {
        ops.log_file = Some(PLAY_LOG_FILE.into());
    }
    init_tracing(&ops)?;

    match command {
        Command::Play if cli.offline => play(InMemoryBackend::new(), &config).await,
        Command::Play => play(HttpGateway::new(&config.backend)?, &config).await,
        Command::State if cli.offline => print_state(&InMemoryBackend::new(), &config).await,
        Command::State => print_state(&HttpGateway::new(&config.backend)?, &config).await,
        Command::Watch { once } => watch::watch(&config, once).await,
    }
}

async fn play<G: SyncGateway + 'static>(gateway: G, config: &VantageConfig) -> Result<()> {
    let summary = format!(
        "{} | engine {:?}",
        gateway.endpoint(),
        config.session.engine_side
    );
    let session = Session::new(
        Arc::new(ShakmatyRules::new()),
        config.session.clone(),
        &config.telemetry,
    );

    let (ui_tx, ui_rx) = std::sync::mpsc::channel::<UiMessage>();
    let (input_tx, input_rx) = mpsc::channel(64);
    let bus = EventBus::new(config.ops.event_log_capacity);
    let log = EventLog::from_config(&config.ops);

    let mut events = bus.subscribe();
    let event_tx = ui_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if event_tx.send(UiMessage::Event(event)).is_err() {
                break;
            }
        }
    });

    let ui_handle = thread::spawn(move || ui::run(ui_rx, input_tx, summary));

    let mut runner = SessionRunner::new(
        session,
        gateway,
        ChannelRenderer::new(ui_tx.clone()),
        bus,
        log,
    );
    if config.session.refresh_interval_ms > 0 {
        runner = runner.with_refresh(Duration::from_millis(config.session.refresh_interval_ms));
    }
    let outcome = runner.run(input_rx).await;
    let _ = ui_tx.send(UiMessage::Shutdown);

    ui_handle
        .join()
        .map_err(|_| anyhow!("terminal ui thread panicked"))??;
    let session = outcome?;
    info!(
        plies = session.timeline().len(),
        view = session.timeline().view(),
        "play session closed"
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct StateReport<'a> {
    snapshot: &'a GameSnapshot,
    history: Vec<HistoryRow>,
    series: TelemetrySeries,
    stats: EngineStatsPanel,
}

async fn print_state<G: SyncGateway>(gateway: &G, config: &VantageConfig) -> Result<()> {
    let mut snapshot = gateway.get_state().await?;
    reconcile_fen(&ShakmatyRules::new(), &mut snapshot)?;
    let projector = TelemetryProjector::new(config.session.engine_side);
    let report = StateReport {
        snapshot: &snapshot,
        history: history_rows(&snapshot),
        series: projector.project(&snapshot),
        stats: EngineStatsPanel::from_stats(snapshot.engine_stats.as_ref()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn load_config(explicit: Option<String>) -> VantageConfig {
    let from_env = env::var("VANTAGE_CONFIG").ok();
    let path = explicit
        .or(from_env)
        .unwrap_or_else(|| "configs/dev.toml".into());
    match VantageConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!("Invalid config in '{path}': {err}. Falling back to internal defaults.");
                default_config()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!("Failed to load config from '{path}': {err}. Falling back to internal defaults.");
            default_config()
        }
    }
}

fn default_config() -> VantageConfig {
    let config = VantageConfig::default();
    debug_assert!(config.validate().is_ok());
    config
}
