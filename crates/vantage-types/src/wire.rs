//! JSON shapes exchanged with the backend and their normalization into
//! [`GameSnapshot`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    board::Square,
    game::{EngineStats, GameSnapshot, LastMove, Ply, TopLine, UciMove},
    Result, VantageError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub uci: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GotoRequest {
    pub view: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireLastMove {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireTopLine {
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub q: f32,
    #[serde(default)]
    pub visits: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireEngineStats {
    #[serde(default)]
    pub win_prob: f32,
    #[serde(default)]
    pub simulations: u64,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub top_lines: Vec<WireTopLine>,
    #[serde(default)]
    pub heatmap: BTreeMap<String, f32>,
}

/// Body of `/state`, `/move`, `/goto` and `/engine_move`.
///
/// Everything except `fen` is optional on the wire; a rejected move is
/// `{"ok": false}` with no position at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateResponse {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub fen: Option<String>,
    #[serde(default)]
    pub turn: Option<String>,
    #[serde(default)]
    pub view: u32,
    #[serde(default)]
    pub len: Option<u32>,
    #[serde(default)]
    pub moves_san: Vec<String>,
    #[serde(default)]
    pub moves_uci: Vec<String>,
    /// Seconds spent per ply.
    #[serde(default)]
    pub move_times: Vec<f64>,
    /// Index 0 is the initial position; index `i` follows ply `i`.
    #[serde(default)]
    pub history_evals: Vec<f32>,
    #[serde(default)]
    pub history_depths: Vec<u32>,
    #[serde(default)]
    pub last_move: Option<WireLastMove>,
    #[serde(default)]
    pub engine_stats: Option<WireEngineStats>,
}

impl StateResponse {
    pub fn is_rejection(&self) -> bool {
        self.ok == Some(false)
    }

    /// Builds the canonical snapshot. Absent optional fields become empty;
    /// a missing FEN or an out-of-range view is a protocol error.
    pub fn into_snapshot(self) -> Result<GameSnapshot> {
        let fen = self
            .fen
            .filter(|fen| !fen.trim().is_empty())
            .ok_or_else(|| VantageError::Protocol("response carries no fen".into()))?;

        let last_move = match self.last_move {
            Some(wire) => Some(LastMove {
                from: wire.from.parse()?,
                to: wire.to.parse()?,
            }),
            None => None,
        };

        let plies: Vec<Ply> = self
            .moves_san
            .into_iter()
            .enumerate()
            .map(|(offset, san)| {
                let index = offset as u32 + 1;
                let uci = self
                    .moves_uci
                    .get(offset)
                    .and_then(|raw| raw.parse::<UciMove>().ok())
                    .or_else(|| {
                        // Only the ply under the cursor is recoverable from last_move.
                        last_move
                            .filter(|_| index == self.view)
                            .map(|lm| UciMove::new(lm.from, lm.to))
                    });
                let seconds = self.move_times.get(offset).copied().unwrap_or(0.0);
                Ply {
                    index,
                    san,
                    uci,
                    time_spent_ms: (seconds.max(0.0) * 1000.0).round() as u64,
                    eval_score: self.history_evals.get(offset + 1).copied(),
                    search_depth: self.history_depths.get(offset + 1).copied(),
                }
            })
            .collect();

        let engine_stats = self.engine_stats.map(WireEngineStats::into_stats);

        let snapshot = GameSnapshot {
            fen,
            view: self.view,
            plies,
            last_move,
            engine_stats,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl WireEngineStats {
    pub fn into_stats(self) -> EngineStats {
        let heatmap = self
            .heatmap
            .into_iter()
            .filter_map(|(square, intensity)| {
                let square = square.parse::<Square>().ok()?;
                Some((square, intensity.clamp(0.0, 1.0)))
            })
            .collect();
        EngineStats {
            win_prob: self.win_prob.clamp(0.0, 100.0),
            simulations: self.simulations,
            depth: self.depth,
            top_lines: self
                .top_lines
                .into_iter()
                .map(|line| TopLine {
                    line: line.line,
                    q: line.q,
                    visits: line.visits,
                })
                .collect(),
            heatmap,
        }
    }
}

impl From<&GameSnapshot> for StateResponse {
    fn from(snapshot: &GameSnapshot) -> Self {
        let mut history_evals = vec![0.5];
        let mut history_depths = vec![0];
        for ply in &snapshot.plies {
            history_evals.push(ply.eval_score.unwrap_or(0.0));
            history_depths.push(ply.search_depth.unwrap_or(0));
        }
        StateResponse {
            ok: Some(true),
            error: None,
            fen: Some(snapshot.fen.clone()),
            turn: snapshot.fen.split_whitespace().nth(1).map(str::to_string),
            view: snapshot.view,
            len: Some(snapshot.len()),
            moves_san: snapshot.plies.iter().map(|p| p.san.clone()).collect(),
            // Positional list: emitted only when every ply knows its UCI.
            moves_uci: snapshot
                .plies
                .iter()
                .map(|p| p.uci.map(|u| u.to_string()))
                .collect::<Option<Vec<_>>>()
                .unwrap_or_default(),
            move_times: snapshot
                .plies
                .iter()
                .map(|p| p.time_spent_ms as f64 / 1000.0)
                .collect(),
            history_evals,
            history_depths,
            last_move: snapshot.last_move.map(|lm| WireLastMove {
                from: lm.from.to_string(),
                to: lm.to.to_string(),
            }),
            engine_stats: snapshot.engine_stats.as_ref().map(|stats| WireEngineStats {
                win_prob: stats.win_prob,
                simulations: stats.simulations,
                depth: stats.depth,
                top_lines: stats
                    .top_lines
                    .iter()
                    .map(|l| WireTopLine {
                        line: l.line.clone(),
                        q: l.q,
                        visits: l.visits,
                    })
                    .collect(),
                heatmap: stats
                    .heatmap
                    .iter()
                    .map(|(sq, v)| (sq.to_string(), *v))
                    .collect(),
            }),
        }
    }
}

/// Parses a backend body, mapping JSON errors to protocol errors.
pub fn parse_state(body: &str) -> Result<StateResponse> {
    serde_json::from_str(body)
        .map_err(|err| VantageError::Protocol(format!("unreadable state body: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const AFTER_E4_E5: &str = r#"{
        "fen": "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2",
        "turn": "w",
        "moves_san": ["e4", "e5"],
        "move_times": [1.25, 0.5],
        "history_evals": [0.5, 0.48, 0.61],
        "history_depths": [0, 0, 7],
        "last_move": {"from": "e7", "to": "e5"},
        "view": 2,
        "engine_stats": {"win_prob": 61.0, "simulations": 800, "depth": 7, "top_lines": []}
    }"#;

    #[test]
    fn normalizes_full_state() {
        let snapshot = parse_state(AFTER_E4_E5).unwrap().into_snapshot().unwrap();
        assert_eq!(snapshot.view, 2);
        assert_eq!(snapshot.plies.len(), 2);
        let engine_ply = &snapshot.plies[1];
        assert_eq!(engine_ply.index, 2);
        assert_eq!(engine_ply.eval_score, Some(0.61));
        assert_eq!(engine_ply.search_depth, Some(7));
        assert_eq!(engine_ply.time_spent_ms, 500);
        assert_eq!(engine_ply.uci.map(|u| u.to_string()).as_deref(), Some("e7e5"));
        assert_eq!(snapshot.plies[0].time_spent_ms, 1250);
        assert!(snapshot.plies[0].uci.is_none());
        let stats = snapshot.engine_stats.expect("stats");
        assert_eq!(stats.simulations, 800);
        assert!(stats.heatmap.is_empty());
    }

    #[test]
    fn tolerates_partial_body() {
        let body = r#"{"fen": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", "view": 0}"#;
        let snapshot = parse_state(body).unwrap().into_snapshot().unwrap();
        assert!(snapshot.plies.is_empty());
        assert!(snapshot.engine_stats.is_none());
        assert!(snapshot.last_move.is_none());
    }

    #[test]
    fn rejection_body_is_detected() {
        let response = parse_state(r#"{"ok": false}"#).unwrap();
        assert!(response.is_rejection());
        assert!(response.into_snapshot().is_err());
    }

    #[test]
    fn view_past_history_is_protocol_error() {
        let body = r#"{"fen": "8/8/8/8/8/8/8/8 w - - 0 1", "view": 3, "moves_san": ["e4"]}"#;
        let err = parse_state(body).unwrap().into_snapshot().unwrap_err();
        assert!(matches!(err, VantageError::Protocol(_)));
    }

    #[test]
    fn heatmap_keys_are_parsed_and_clamped() {
        let stats = WireEngineStats {
            heatmap: [("e4".to_string(), 1.7), ("zz".to_string(), 0.3), ("d5".to_string(), 0.25)]
                .into_iter()
                .collect(),
            ..Default::default()
        }
        .into_stats();
        assert_eq!(stats.heatmap.len(), 2);
        assert_eq!(stats.heatmap[&"e4".parse::<Square>().unwrap()], 1.0);
    }

    #[test]
    fn snapshot_survives_wire_round_trip() {
        let snapshot = parse_state(AFTER_E4_E5).unwrap().into_snapshot().unwrap();
        let again = StateResponse::from(&snapshot).into_snapshot().unwrap();
        assert_eq!(again.plies.len(), snapshot.plies.len());
        assert_eq!(again.view, snapshot.view);
        assert_eq!(again.plies[1].eval_score, snapshot.plies[1].eval_score);
    }
}
