use tracing::warn;
use vantage_rules::RulesAdapter;
use vantage_types::{
    board::INITIAL_FEN,
    game::{GameSnapshot, LastMove, Ply},
    Result, VantageError,
};

/// Makes `snapshot.fen` the position reached by replaying the first `view`
/// plies from the initial position. Returns whether the reported FEN had to
/// be replaced. Snapshots without plies keep their FEN, so setup positions
/// pass through.
///
/// Only board, side to move and castling rights are compared; clocks and
/// en passant notation may legitimately differ between backends.
pub fn reconcile_fen(rules: &dyn RulesAdapter, snapshot: &mut GameSnapshot) -> Result<bool> {
    if snapshot.plies.is_empty() {
        return Ok(false);
    }
    snapshot.validate()?;
    let sans: Vec<String> = snapshot.plies[..snapshot.view as usize]
        .iter()
        .map(|ply| ply.san.clone())
        .collect();
    let replayed = rules.replay_san(INITIAL_FEN, &sans).map_err(|err| {
        VantageError::Protocol(format!("ply history does not replay: {err}"))
    })?;
    if position_key(&replayed) == position_key(&snapshot.fen) {
        return Ok(false);
    }
    warn!(
        view = snapshot.view,
        reported = %snapshot.fen,
        %replayed,
        "reported FEN disagrees with the viewed ply, using the replayed position"
    );
    snapshot.fen = replayed;
    Ok(true)
}

fn position_key(fen: &str) -> Vec<&str> {
    fen.split_whitespace().take(3).collect()
}

/// What a confirmed snapshot changed compared to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimelineChange {
    pub plies_changed: bool,
    pub view_changed: bool,
    pub stats_changed: bool,
}

/// Server-confirmed ply sequence and view cursor. Only ever replaced by
/// snapshots the backend returned; nothing here is speculative.
#[derive(Debug, Clone, Default)]
pub struct ReplayTimeline {
    snapshot: GameSnapshot,
}

impl ReplayTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces plies and view wholesale. Snapshots with `view > len` are
    /// refused and leave the timeline untouched.
    pub fn load(&mut self, snapshot: GameSnapshot) -> Result<TimelineChange> {
        snapshot.validate()?;
        let change = TimelineChange {
            plies_changed: snapshot.plies != self.snapshot.plies,
            view_changed: snapshot.view != self.snapshot.view,
            stats_changed: snapshot.engine_stats != self.snapshot.engine_stats,
        };
        self.snapshot = snapshot;
        Ok(change)
    }

    /// Applies the answer to a goto. The ply sequence is expected to be
    /// unchanged; if the backend says otherwise it still wins.
    pub fn seek_confirmed(&mut self, snapshot: GameSnapshot) -> Result<TimelineChange> {
        let change = self.load(snapshot)?;
        if change.plies_changed {
            warn!("goto response carried a different ply sequence");
        }
        Ok(change)
    }

    /// Applies the answer to a move. Mid-history moves arrive already
    /// truncated by the backend.
    pub fn append_confirmed(&mut self, snapshot: GameSnapshot) -> Result<TimelineChange> {
        self.load(snapshot)
    }

    pub fn snapshot(&self) -> &GameSnapshot {
        &self.snapshot
    }

    pub fn fen(&self) -> &str {
        &self.snapshot.fen
    }

    pub fn view(&self) -> u32 {
        self.snapshot.view
    }

    pub fn len(&self) -> u32 {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn plies(&self) -> &[Ply] {
        &self.snapshot.plies
    }

    pub fn is_at_tip(&self) -> bool {
        self.snapshot.is_at_tip()
    }

    /// The move that led to the viewed position: the backend's `last_move`
    /// when sent, otherwise the viewed ply's own UCI.
    pub fn last_move(&self) -> Option<LastMove> {
        self.snapshot.last_move.or_else(|| {
            self.snapshot
                .ply(self.snapshot.view)
                .and_then(|ply| ply.uci)
                .map(|uci| LastMove {
                    from: uci.from,
                    to: uci.to,
                })
        })
    }

    /// `view + delta`, clamped into `0..=len`.
    pub fn step_target(&self, delta: i32) -> u32 {
        self.step_from(self.view(), delta)
    }

    /// `base + delta`, clamped into `0..=len`. Used to step from a view that
    /// is requested but not yet confirmed.
    pub fn step_from(&self, base: u32, delta: i32) -> u32 {
        let target = i64::from(base) + i64::from(delta);
        target.clamp(0, i64::from(self.len())) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_rules::ShakmatyRules;
    use vantage_types::game::UciMove;

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    fn san_snapshot(fen: &str, view: u32, sans: &[&str]) -> GameSnapshot {
        GameSnapshot {
            fen: fen.to_string(),
            view,
            plies: sans
                .iter()
                .enumerate()
                .map(|(i, san)| Ply {
                    index: i as u32 + 1,
                    san: san.to_string(),
                    uci: None,
                    time_spent_ms: 0,
                    eval_score: None,
                    search_depth: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn ply(index: u32, uci: &str) -> Ply {
        Ply {
            index,
            san: uci.to_string(),
            uci: Some(uci.parse::<UciMove>().unwrap()),
            time_spent_ms: 500,
            eval_score: None,
            search_depth: None,
        }
    }

    fn snapshot(view: u32, moves: &[&str]) -> GameSnapshot {
        GameSnapshot {
            view,
            plies: moves
                .iter()
                .enumerate()
                .map(|(i, m)| ply(i as u32 + 1, m))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn load_replaces_wholesale_and_reports_change() {
        let mut timeline = ReplayTimeline::new();
        let change = timeline.load(snapshot(2, &["e2e4", "e7e5"])).unwrap();
        assert!(change.plies_changed && change.view_changed);
        assert_eq!(timeline.len(), 2);

        let change = timeline.seek_confirmed(snapshot(1, &["e2e4", "e7e5"])).unwrap();
        assert!(!change.plies_changed);
        assert!(change.view_changed);
        assert_eq!(timeline.view(), 1);
    }

    #[test]
    fn invalid_snapshot_leaves_timeline_untouched() {
        let mut timeline = ReplayTimeline::new();
        timeline.load(snapshot(1, &["e2e4"])).unwrap();
        assert!(timeline.load(snapshot(3, &["d2d4"])).is_err());
        assert_eq!(timeline.view(), 1);
        assert_eq!(timeline.plies()[0].san, "e2e4");
    }

    #[test]
    fn last_move_falls_back_to_viewed_ply() {
        let mut timeline = ReplayTimeline::new();
        assert!(timeline.last_move().is_none());
        timeline.load(snapshot(1, &["e2e4", "e7e5"])).unwrap();
        let last = timeline.last_move().expect("last move");
        assert_eq!(last.to.to_string(), "e4");
    }

    #[test]
    fn step_target_clamps() {
        let mut timeline = ReplayTimeline::new();
        timeline.append_confirmed(snapshot(1, &["e2e4", "e7e5"])).unwrap();
        assert_eq!(timeline.step_target(-5), 0);
        assert_eq!(timeline.step_target(1), 2);
        assert_eq!(timeline.step_target(9), 2);
    }

    #[test]
    fn step_from_uses_given_base() {
        let mut timeline = ReplayTimeline::new();
        timeline.load(snapshot(2, &["e2e4", "e7e5"])).unwrap();
        assert_eq!(timeline.step_from(1, -1), 0);
        assert_eq!(timeline.step_from(0, -1), 0);
        assert_eq!(timeline.step_from(1, 4), 2);
    }

    #[test]
    fn tip_fen_reported_mid_history_is_replaced() {
        let rules = ShakmatyRules::new();
        let mut body = san_snapshot(AFTER_E4, 0, &["e4"]);
        assert!(reconcile_fen(&rules, &mut body).unwrap());
        assert_eq!(body.fen, INITIAL_FEN);

        let mut consistent = san_snapshot(AFTER_E4, 1, &["e4"]);
        assert!(!reconcile_fen(&rules, &mut consistent).unwrap());
        assert_eq!(consistent.fen, AFTER_E4);
    }

    #[test]
    fn unreplayable_history_is_a_protocol_error() {
        let rules = ShakmatyRules::new();
        let mut body = san_snapshot(INITIAL_FEN, 1, &["Nf6"]);
        assert!(matches!(
            reconcile_fen(&rules, &mut body),
            Err(VantageError::Protocol(_))
        ));

        let mut setup = san_snapshot("8/4P3/8/8/8/8/k7/4K3 w - - 0 1", 0, &[]);
        assert!(!reconcile_fen(&rules, &mut setup).unwrap());
    }
}
