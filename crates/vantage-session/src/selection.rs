use tracing::debug;
use vantage_rules::RulesAdapter;
use vantage_types::{
    board::{PieceKind, Square},
    game::{LastMove, UciMove},
    Result,
};

/// Interaction phase of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    PieceSelected(Square),
    /// A move was committed and the backend has not answered yet.
    AwaitingServer { from: Square, to: Square },
    /// The automatic engine reply is outstanding.
    AwaitingEngine,
}

impl SelectionState {
    pub fn is_awaiting(&self) -> bool {
        matches!(
            self,
            SelectionState::AwaitingServer { .. } | SelectionState::AwaitingEngine
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SelectionState::Idle => "idle",
            SelectionState::PieceSelected(_) => "piece selected",
            SelectionState::AwaitingServer { .. } => "waiting for backend",
            SelectionState::AwaitingEngine => "engine thinking",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Input arrived while a request is in flight.
    Ignored,
    Unchanged,
    Selected(Square),
    Deselected,
    Commit(UciMove),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlights {
    pub last_move: Option<LastMove>,
    pub selected: Option<Square>,
    pub destinations: Vec<Square>,
}

#[derive(Debug, Clone)]
pub struct SelectionMachine {
    state: SelectionState,
}

impl Default for SelectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self {
            state: SelectionState::Idle,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state.is_awaiting()
    }

    /// Feeds one board click against the position in `fen`.
    pub fn click(
        &mut self,
        rules: &dyn RulesAdapter,
        fen: &str,
        square: Square,
    ) -> Result<ClickOutcome> {
        let outcome = match self.state {
            SelectionState::AwaitingServer { .. } | SelectionState::AwaitingEngine => {
                ClickOutcome::Ignored
            }
            SelectionState::Idle => {
                if self.is_own_piece(rules, fen, square)? {
                    self.state = SelectionState::PieceSelected(square);
                    ClickOutcome::Selected(square)
                } else {
                    ClickOutcome::Unchanged
                }
            }
            SelectionState::PieceSelected(from) if from == square => {
                self.state = SelectionState::Idle;
                ClickOutcome::Deselected
            }
            SelectionState::PieceSelected(from) => {
                if self.is_own_piece(rules, fen, square)? {
                    self.state = SelectionState::PieceSelected(square);
                    ClickOutcome::Selected(square)
                } else if rules.is_legal(fen, &UciMove::new(from, square))? {
                    let mut mv = UciMove::new(from, square);
                    if rules.is_promotion(fen, from, square)? {
                        mv = mv.with_promotion(PieceKind::Queen);
                    }
                    self.state = SelectionState::AwaitingServer { from, to: square };
                    ClickOutcome::Commit(mv)
                } else {
                    ClickOutcome::Unchanged
                }
            }
        };
        debug!(%square, ?outcome, state = self.state.label(), "board click");
        Ok(outcome)
    }

    pub fn await_engine(&mut self) {
        self.state = SelectionState::AwaitingEngine;
    }

    /// Back to `Idle`, dropping any selection.
    pub fn reset(&mut self) {
        self.state = SelectionState::Idle;
    }

    /// Recomputed on every call; destinations are never cached.
    pub fn highlights(
        &self,
        rules: &dyn RulesAdapter,
        fen: &str,
        last_move: Option<LastMove>,
    ) -> Result<Highlights> {
        let (selected, destinations) = match self.state {
            SelectionState::PieceSelected(square) => {
                (Some(square), rules.legal_destinations(fen, square)?)
            }
            SelectionState::AwaitingServer { from, .. } => (Some(from), Vec::new()),
            _ => (None, Vec::new()),
        };
        Ok(Highlights {
            last_move,
            selected,
            destinations,
        })
    }

    fn is_own_piece(&self, rules: &dyn RulesAdapter, fen: &str, square: Square) -> Result<bool> {
        let side = rules.side_to_move(fen)?;
        Ok(rules
            .piece_at(fen, square)?
            .is_some_and(|piece| piece.owner == side))
    }
}
