//! Operational helpers: logging setup and the in-memory event log.

use std::{
    collections::VecDeque,
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Arc,
};

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vantage_types::{config::OpsConfig, events::SessionEvent, Result, VantageError};

/// Installs the global subscriber. An unparsable level falls back to
/// `info`; with `log_file` set, output goes to that file without colours.
pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| VantageError::Ops(format!("failed to create log filter: {err}")))?;

    let result = match &config.log_file {
        Some(path) => {
            let path = ensure_parent_dir(path)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| {
                    VantageError::Ops(format!("failed to open log file {}: {err}", path.display()))
                })?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
        None => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    result.map_err(|err| VantageError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

fn ensure_parent_dir(path: &str) -> Result<PathBuf> {
    let path = PathBuf::from(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            VantageError::Ops(format!("failed to create log dir {}: {err}", parent.display()))
        })?;
    }
    Ok(path)
}

/// Bounded record of recent session events; the oldest entries are
/// evicted first.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    events: Arc<Mutex<VecDeque<SessionEvent>>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn from_config(config: &OpsConfig) -> Self {
        Self::new(config.event_log_capacity)
    }

    pub async fn record(&self, event: SessionEvent) {
        let mut events = self.events.lock().await;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Up to `limit` events, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<SessionEvent> {
        self.events
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn snapshot(&self) -> Vec<SessionEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }

    pub async fn log_summary(&self) {
        let events = self.events.lock().await;
        info!(
            recorded = events.len(),
            capacity = self.capacity,
            "event log summary"
        );
    }
}
