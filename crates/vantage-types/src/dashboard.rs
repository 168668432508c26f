//! Payloads of the self-play actor dashboard (`/api/status`) and the
//! training dashboard (`/api/data`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkerStats {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub move_count: u32,
    /// A number while searching, `"-"` between games.
    #[serde(default)]
    pub last_depth: Option<serde_json::Value>,
    #[serde(default)]
    pub fen: Option<String>,
    #[serde(default)]
    pub turn: Option<String>,
    /// Value head output in `[-1, 1]` from the side to move.
    #[serde(default)]
    pub value: Option<f32>,
    #[serde(default)]
    pub total_games: Option<u64>,
    #[serde(default)]
    pub total_samples: Option<u64>,
    /// Positions of the game in progress, oldest first.
    #[serde(default)]
    pub history_fens: Vec<String>,
    /// Policy entropy at the root of the last search.
    #[serde(default)]
    pub entropy: Option<f32>,
    #[serde(default)]
    pub inference_ms: Option<f32>,
    #[serde(default)]
    pub phase_times: Option<PhaseTimes>,
    /// First-move counts over finished games, keyed by UCI.
    #[serde(default)]
    pub openings: BTreeMap<String, u64>,
    /// Finished games, newest first.
    #[serde(default)]
    pub recent_gallery: Vec<GalleryGame>,
}

/// Seconds spent per game phase.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseSplit {
    #[serde(default)]
    pub opening: f32,
    #[serde(default)]
    pub midgame: f32,
    #[serde(default)]
    pub endgame: f32,
}

/// Phase timings since the worker started and over its recent games.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseTimes {
    #[serde(default)]
    pub global: PhaseSplit,
    #[serde(default)]
    pub recent: PhaseSplit,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GalleryGame {
    pub id: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub moves: u32,
    /// FEN after every ply, starting position first.
    #[serde(default)]
    pub history: Vec<String>,
}

impl WorkerStats {
    /// Depth when the worker reported a number, `None` for placeholders.
    pub fn depth(&self) -> Option<u32> {
        self.last_depth
            .as_ref()
            .and_then(|v| v.as_u64())
            .and_then(|d| u32::try_from(d).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActorStatus {
    #[serde(default)]
    pub buffer_count: u64,
    #[serde(default)]
    pub workers: BTreeMap<String, WorkerStats>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainingStats {
    #[serde(default)]
    pub iterations: Vec<u64>,
    #[serde(default)]
    pub p_loss: Vec<Option<f32>>,
    #[serde(default)]
    pub v_loss: Vec<Option<f32>>,
    #[serde(default)]
    pub lr: Vec<Option<f64>>,
    #[serde(default)]
    pub buffer_size: Option<u64>,
    /// Unix seconds of the last trainer update.
    #[serde(default)]
    pub last_update: Option<f64>,
}
