//! Reference backend living in process memory.
//!
//! Mirrors the HTTP backend's semantics (truncate on mid-history moves,
//! clamped goto, per-ply timing and evaluation) with a greedy one-ply
//! engine. Used for offline play and as the server behind integration tests.

use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use vantage_rules::{RulesAdapter, ShakmatyRules};
use vantage_types::{
    board::{Color, PieceKind, Placement, Square, INITIAL_FEN},
    game::UciMove,
    wire::{StateResponse, WireEngineStats, WireLastMove, WireTopLine},
    Result, VantageError,
};

use crate::gateway::{MoveOutcome, SyncGateway};

const FIRST_MOVE_SECONDS: f64 = 0.5;
const MIN_MOVE_SECONDS: f64 = 0.1;
const TOP_LINES: usize = 3;

/// HTTP-shaped reply: status code plus JSON body.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub status: u16,
    pub body: StateResponse,
}

impl BackendReply {
    fn ok(body: StateResponse) -> Self {
        Self { status: 200, body }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: 400,
            body: StateResponse {
                ok: Some(false),
                error: Some(reason.into()),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
struct RecordedPly {
    san: String,
    uci: UciMove,
    seconds: f64,
    eval: f32,
    depth: u32,
}

/// Game record and clocks, all mutation goes through `&mut self`.
#[derive(Debug)]
pub struct BackendState {
    rules: ShakmatyRules,
    /// `positions[i]` is the FEN after `i` plies.
    positions: Vec<String>,
    plies: Vec<RecordedPly>,
    view: usize,
    last_move_at: Option<Instant>,
    last_stats: WireEngineStats,
}

impl Default for BackendState {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendState {
    pub fn new() -> Self {
        Self {
            rules: ShakmatyRules::new(),
            positions: vec![INITIAL_FEN.to_string()],
            plies: Vec::new(),
            view: 0,
            last_move_at: None,
            last_stats: WireEngineStats {
                win_prob: 50.0,
                ..Default::default()
            },
        }
    }

    pub fn state(&self) -> StateResponse {
        let fen = self.positions[self.view].clone();
        let mut history_evals = vec![0.5];
        let mut history_depths = vec![0];
        history_evals.extend(self.plies.iter().map(|p| p.eval));
        history_depths.extend(self.plies.iter().map(|p| p.depth));
        StateResponse {
            ok: None,
            error: None,
            turn: fen.split_whitespace().nth(1).map(str::to_string),
            fen: Some(fen),
            view: self.view as u32,
            len: Some(self.plies.len() as u32),
            moves_san: self.plies.iter().map(|p| p.san.clone()).collect(),
            moves_uci: self.plies.iter().map(|p| p.uci.to_string()).collect(),
            move_times: self.plies.iter().map(|p| p.seconds).collect(),
            history_evals,
            history_depths,
            last_move: self
                .view
                .checked_sub(1)
                .and_then(|i| self.plies.get(i))
                .map(|p| WireLastMove {
                    from: p.uci.from.to_string(),
                    to: p.uci.to.to_string(),
                }),
            engine_stats: Some(self.last_stats.clone()),
        }
    }

    pub fn submit(&mut self, uci: &str) -> BackendReply {
        let mv: UciMove = match uci.parse() {
            Ok(mv) => mv,
            Err(_) => return BackendReply::rejected(format!("unreadable move '{uci}'")),
        };
        let eval = self.last_stats.win_prob / 100.0;
        let depth = self.last_stats.depth;
        self.play(mv, eval, depth)
    }

    pub fn goto(&mut self, view: i64) -> StateResponse {
        self.view = view.clamp(0, self.plies.len() as i64) as usize;
        debug!(view = self.view, "goto");
        let mut body = self.state();
        body.ok = Some(true);
        body
    }

    pub fn engine_move(&mut self) -> BackendReply {
        let fen = self.positions[self.view].clone();
        let candidates = match self.rank_candidates(&fen) {
            Ok(candidates) if !candidates.is_empty() => candidates,
            Ok(_) => return BackendReply::rejected("game is over"),
            Err(err) => return BackendReply::rejected(err.to_string()),
        };

        let (best, best_q) = candidates[0];
        let stats = WireEngineStats {
            win_prob: round_tenth((best_q + 1.0) / 2.0 * 100.0),
            simulations: candidates.len() as u64,
            depth: 1,
            top_lines: candidates
                .iter()
                .take(TOP_LINES)
                .map(|(mv, q)| WireTopLine {
                    line: mv.to_string(),
                    q: *q,
                    visits: 1,
                })
                .collect(),
            heatmap: destination_heatmap(candidates.iter().map(|(mv, _)| mv.to)),
        };
        info!(%best, win_prob = stats.win_prob, "engine chose move");
        let eval = stats.win_prob / 100.0;
        let depth = stats.depth;
        self.last_stats = stats;
        self.play(best, eval, depth)
    }

    fn play(&mut self, mv: UciMove, eval: f32, depth: u32) -> BackendReply {
        let base = self.positions[self.view].clone();
        let mv = self.normalize_promotion(&base, mv);
        let applied = match self.rules.apply(&base, &mv) {
            Ok(applied) => applied,
            Err(_) => return BackendReply::rejected(format!("illegal move {mv}")),
        };

        let now = Instant::now();
        let seconds = match self.last_move_at {
            Some(previous) => now
                .saturating_duration_since(previous)
                .as_secs_f64()
                .max(MIN_MOVE_SECONDS),
            None => FIRST_MOVE_SECONDS,
        };
        self.last_move_at = Some(now);

        self.plies.truncate(self.view);
        self.positions.truncate(self.view + 1);
        self.plies.push(RecordedPly {
            san: applied.san,
            uci: mv,
            seconds,
            eval,
            depth,
        });
        self.positions.push(applied.fen);
        self.view = self.plies.len();
        debug!(%mv, len = self.plies.len(), "move recorded");

        let mut body = self.state();
        body.ok = Some(true);
        BackendReply::ok(body)
    }

    /// `e7e8` without a suffix is read as a queen promotion.
    fn normalize_promotion(&self, fen: &str, mv: UciMove) -> UciMove {
        match (mv.promotion, self.rules.is_promotion(fen, mv.from, mv.to)) {
            (None, Ok(true)) => mv.with_promotion(PieceKind::Queen),
            _ => mv,
        }
    }

    /// Legal moves ordered best first by material after the move, from the
    /// mover's point of view, ties broken by UCI order.
    fn rank_candidates(&self, fen: &str) -> Result<Vec<(UciMove, f32)>> {
        if self.rules.is_game_over(fen)? {
            return Ok(Vec::new());
        }
        let mover = self.rules.side_to_move(fen)?;
        let mut ranked = Vec::new();
        for from in Square::all() {
            for to in self.rules.legal_destinations(fen, from)? {
                let mut mv = UciMove::new(from, to);
                if self.rules.is_promotion(fen, from, to)? {
                    mv = mv.with_promotion(PieceKind::Queen);
                }
                let after = self.rules.apply(fen, &mv)?;
                let q = material_q(&after.fen, mover)?;
                ranked.push((mv, q));
            }
        }
        ranked.sort_by(|(a_mv, a_q), (b_mv, b_q)| {
            b_q.total_cmp(a_q)
                .then_with(|| a_mv.to_string().cmp(&b_mv.to_string()))
        });
        Ok(ranked)
    }

    pub fn len(&self) -> usize {
        self.plies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plies.is_empty()
    }
}

fn piece_value(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => 1,
        PieceKind::Knight | PieceKind::Bishop => 3,
        PieceKind::Rook => 5,
        PieceKind::Queen => 9,
        PieceKind::King => 0,
    }
}

/// Material balance squashed into `[-1, 1]`.
fn material_q(fen: &str, side: Color) -> Result<f32> {
    let placement = Placement::from_fen(fen)?;
    let balance: i32 = Square::all()
        .filter_map(|sq| placement.piece_at(sq))
        .map(|piece| {
            let value = piece_value(piece.kind);
            if piece.owner == side {
                value
            } else {
                -value
            }
        })
        .sum();
    Ok((balance as f32 / 10.0).tanh())
}

fn destination_heatmap(targets: impl Iterator<Item = Square>) -> BTreeMap<String, f32> {
    let mut counts: BTreeMap<Square, u32> = BTreeMap::new();
    for target in targets {
        *counts.entry(target).or_default() += 1;
    }
    let peak = counts.values().copied().max().unwrap_or(1) as f32;
    counts
        .into_iter()
        .map(|(sq, count)| (sq.to_string(), count as f32 / peak))
        .collect()
}

fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Shared handle implementing [`SyncGateway`] without any I/O.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
    latency: Option<Duration>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artificial delay to every call, to exercise in-flight states.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn shared_state(&self) -> Arc<Mutex<BackendState>> {
        Arc::clone(&self.state)
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl SyncGateway for InMemoryBackend {
    async fn get_state(&self) -> Result<vantage_types::game::GameSnapshot> {
        self.pause().await;
        let body = self.state.lock().await.state();
        body.into_snapshot()
    }

    async fn submit_move(&self, mv: &UciMove) -> Result<MoveOutcome> {
        self.pause().await;
        let reply = self.state.lock().await.submit(&mv.to_string());
        if reply.status != 200 || reply.body.is_rejection() {
            return Ok(MoveOutcome::Rejected(
                reply.body.error.unwrap_or_else(|| format!("backend refused {mv}")),
            ));
        }
        Ok(MoveOutcome::Accepted(reply.body.into_snapshot()?))
    }

    async fn goto(&self, view: u32) -> Result<vantage_types::game::GameSnapshot> {
        self.pause().await;
        let body = self.state.lock().await.goto(i64::from(view));
        body.into_snapshot()
    }

    async fn engine_move(&self) -> Result<vantage_types::game::GameSnapshot> {
        self.pause().await;
        let reply = self.state.lock().await.engine_move();
        if reply.status != 200 {
            return Err(VantageError::Rejected(
                reply.body.error.unwrap_or_else(|| "game is over".into()),
            ));
        }
        reply.body.into_snapshot()
    }

    fn endpoint(&self) -> String {
        "in-memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(state: &mut BackendState, uci: &str) -> BackendReply {
        let reply = state.submit(uci);
        assert_eq!(reply.status, 200, "{uci} should be accepted");
        reply
    }

    #[test]
    fn move_at_tip_appends() {
        let mut state = BackendState::new();
        let reply = play(&mut state, "e2e4");
        assert_eq!(reply.body.ok, Some(true));
        assert_eq!(reply.body.view, 1);
        assert_eq!(reply.body.moves_san, vec!["e4"]);
        assert_eq!(reply.body.move_times, vec![FIRST_MOVE_SECONDS]);
        assert_eq!(reply.body.history_evals, vec![0.5, 0.5]);
        let last = reply.body.last_move.expect("last move");
        assert_eq!((last.from.as_str(), last.to.as_str()), ("e2", "e4"));
    }

    #[test]
    fn move_mid_history_truncates() {
        let mut state = BackendState::new();
        play(&mut state, "e2e4");
        play(&mut state, "e7e5");
        play(&mut state, "g1f3");
        state.goto(1);
        let reply = play(&mut state, "c7c5");
        assert_eq!(reply.body.moves_san, vec!["e4", "c5"]);
        assert_eq!(reply.body.view, 2);
        assert_eq!(reply.body.move_times.len(), 2);
        assert_eq!(reply.body.history_evals.len(), 3);
    }

    #[test]
    fn goto_clamps_and_reports_position_at_view() {
        let mut state = BackendState::new();
        play(&mut state, "e2e4");
        let body = state.goto(-3);
        assert_eq!(body.view, 0);
        assert_eq!(body.fen.as_deref(), Some(INITIAL_FEN));
        assert!(body.last_move.is_none());
        let body = state.goto(40);
        assert_eq!(body.view, 1);
        assert_eq!(body.moves_san.len(), 1);
    }

    #[test]
    fn illegal_and_garbage_moves_are_rejected() {
        let mut state = BackendState::new();
        assert_eq!(state.submit("e2e5").status, 400);
        let reply = state.submit("nonsense");
        assert_eq!(reply.status, 400);
        assert!(reply.body.is_rejection());
        assert!(state.is_empty());
    }

    #[test]
    fn bare_promotion_defaults_to_queen() {
        let mut state = BackendState::new();
        for uci in ["a2a4", "b7b5", "a4b5", "a7a6", "b5a6", "c8b7", "a6b7", "e7e6"] {
            play(&mut state, uci);
        }
        let reply = play(&mut state, "b7a8");
        assert_eq!(reply.body.moves_uci.last().map(String::as_str), Some("b7a8q"));
        assert!(reply.body.moves_san.last().is_some_and(|san| san.contains("=Q")));
    }

    #[test]
    fn engine_prefers_captures_and_reports_stats() {
        let mut state = BackendState::new();
        play(&mut state, "e2e4");
        play(&mut state, "d7d5");
        let reply = state.engine_move();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body.moves_uci.last().map(String::as_str), Some("e4d5"));
        let stats = reply.body.engine_stats.expect("stats");
        assert!(stats.win_prob > 50.0);
        assert_eq!(stats.depth, 1);
        assert!(!stats.heatmap.is_empty());
        assert!(stats.heatmap.values().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(reply.body.history_depths.last(), Some(&1));
    }

    #[test]
    fn engine_refuses_finished_game() {
        let mut state = BackendState::new();
        for uci in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            play(&mut state, uci);
        }
        let reply = state.engine_move();
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body.ok, Some(false));
    }

    #[tokio::test]
    async fn gateway_maps_rejection_to_outcome() {
        let backend = InMemoryBackend::new();
        let outcome = backend
            .submit_move(&"e2e5".parse().unwrap())
            .await
            .unwrap();
        assert!(matches!(outcome, MoveOutcome::Rejected(_)));
        let snapshot = backend.get_state().await.unwrap();
        assert!(snapshot.is_empty());
    }
}
