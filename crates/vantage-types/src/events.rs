use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::UciMove;

/// Coarse event categories, used for filtering on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Lifecycle,
    Sync,
    Selection,
    Navigation,
    Dashboard,
}

/// Immutable envelope for everything the session reports outward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Started {
        backend: String,
    },
    SnapshotApplied {
        seq: u64,
        view: u32,
        len: u32,
    },
    MoveSubmitted {
        seq: u64,
        uci: UciMove,
    },
    MoveRejected {
        uci: UciMove,
        reason: String,
    },
    EngineRequested {
        seq: u64,
    },
    GotoQueued {
        view: u32,
    },
    Resync {
        seq: u64,
    },
    StaleResponse {
        seq: u64,
        last_applied: u64,
    },
    PollSkipped,
    RequestFailed {
        seq: u64,
        error: String,
    },
    Dashboard {
        summary: String,
    },
    Stopped,
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Started { .. } | EventPayload::Stopped => EventKind::Lifecycle,
            EventPayload::MoveSubmitted { .. }
            | EventPayload::MoveRejected { .. }
            | EventPayload::EngineRequested { .. } => EventKind::Selection,
            EventPayload::GotoQueued { .. } => EventKind::Navigation,
            EventPayload::Dashboard { .. } => EventKind::Dashboard,
            EventPayload::SnapshotApplied { .. }
            | EventPayload::Resync { .. }
            | EventPayload::StaleResponse { .. }
            | EventPayload::PollSkipped
            | EventPayload::RequestFailed { .. } => EventKind::Sync,
        }
    }

    /// One-line rendering for logs and the on-screen event list.
    pub fn summary(&self) -> String {
        match self {
            EventPayload::Started { backend } => format!("session started against {backend}"),
            EventPayload::SnapshotApplied { seq, view, len } => {
                format!("#{seq} applied: view {view}/{len}")
            }
            EventPayload::MoveSubmitted { seq, uci } => format!("#{seq} move {uci} sent"),
            EventPayload::MoveRejected { uci, reason } => format!("move {uci} rejected: {reason}"),
            EventPayload::EngineRequested { seq } => format!("#{seq} engine reply requested"),
            EventPayload::GotoQueued { view } => format!("goto {view} queued"),
            EventPayload::Resync { seq } => format!("#{seq} resync from /state"),
            EventPayload::StaleResponse { seq, last_applied } => {
                format!("#{seq} dropped as stale (applied #{last_applied})")
            }
            EventPayload::PollSkipped => "poll skipped, request outstanding".to_string(),
            EventPayload::RequestFailed { seq, error } => format!("#{seq} failed: {error}"),
            EventPayload::Dashboard { summary } => summary.clone(),
            EventPayload::Stopped => "session stopped".to_string(),
        }
    }
}

impl SessionEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: payload.kind(),
            timestamp: Utc::now(),
            payload,
        }
    }
}
