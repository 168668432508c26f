//! Move legality capability used for local, optimistic feedback.
//!
//! The backend stays authoritative; everything here only drives highlights
//! and the preview shown while a move is in flight.

use shakmaty::{
    fen::Fen, san::SanPlus, uci::UciMove as ShakUci, CastlingMode, Chess, EnPassantMode,
    Position, Role,
};
use tracing::debug;
use vantage_types::{
    board::{Color, Piece, PieceKind, Square},
    game::UciMove,
    Result, VantageError,
};

/// Position after a locally applied move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub fen: String,
    pub san: String,
}

pub trait RulesAdapter: Send + Sync {
    fn piece_at(&self, fen: &str, square: Square) -> Result<Option<Piece>>;
    fn side_to_move(&self, fen: &str) -> Result<Color>;
    /// Legal targets for the piece on `from`, in UCI notation (castling
    /// lands on the king's destination square).
    fn legal_destinations(&self, fen: &str, from: Square) -> Result<Vec<Square>>;
    fn apply(&self, fen: &str, mv: &UciMove) -> Result<AppliedMove>;
    /// Whether `from -> to` is a pawn move onto the last rank.
    fn is_promotion(&self, fen: &str, from: Square, to: Square) -> Result<bool>;
    fn is_game_over(&self, fen: &str) -> Result<bool>;
    /// Plays SAN moves from `start_fen`, returning the resulting FEN.
    fn replay_san(&self, start_fen: &str, sans: &[String]) -> Result<String>;

    fn is_legal(&self, fen: &str, mv: &UciMove) -> Result<bool> {
        Ok(self.legal_destinations(fen, mv.from)?.contains(&mv.to))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ShakmatyRules;

impl ShakmatyRules {
    pub fn new() -> Self {
        Self
    }

    fn position(&self, fen: &str) -> Result<Chess> {
        let parsed: Fen = fen
            .parse()
            .map_err(|err| rules_error(format!("invalid FEN '{fen}': {err}")))?;
        parsed
            .into_position(CastlingMode::Standard)
            .map_err(|err| rules_error(format!("illegal position '{fen}': {err}")))
    }

    fn to_shakmaty_move(&self, pos: &Chess, mv: &UciMove) -> Result<shakmaty::Move> {
        let uci: ShakUci = mv
            .to_string()
            .parse()
            .map_err(|err| rules_error(format!("unreadable move {mv}: {err}")))?;
        uci.to_move(pos)
            .map_err(|_| rules_error(format!("illegal move {mv}")))
    }
}

impl RulesAdapter for ShakmatyRules {
    fn piece_at(&self, fen: &str, square: Square) -> Result<Option<Piece>> {
        let pos = self.position(fen)?;
        Ok(pos.board().piece_at(to_shakmaty_square(square)).map(|p| Piece {
            owner: from_shakmaty_color(p.color),
            kind: from_shakmaty_role(p.role),
        }))
    }

    fn side_to_move(&self, fen: &str) -> Result<Color> {
        Ok(from_shakmaty_color(self.position(fen)?.turn()))
    }

    fn legal_destinations(&self, fen: &str, from: Square) -> Result<Vec<Square>> {
        let pos = self.position(fen)?;
        let origin = to_shakmaty_square(from);
        let mut targets: Vec<Square> = pos
            .legal_moves()
            .into_iter()
            .filter(|m| m.from() == Some(origin))
            .filter_map(|m| match m.to_uci(CastlingMode::Standard) {
                ShakUci::Normal { to, .. } => Some(from_shakmaty_square(to)),
                _ => None,
            })
            .collect();
        // Promotions yield one entry per piece kind.
        targets.sort();
        targets.dedup();
        Ok(targets)
    }

    fn apply(&self, fen: &str, mv: &UciMove) -> Result<AppliedMove> {
        let mut pos = self.position(fen)?;
        let m = self.to_shakmaty_move(&pos, mv)?;
        let san = SanPlus::from_move_and_play_unchecked(&mut pos, m);
        let fen = Fen::from_position(&pos, EnPassantMode::Legal).to_string();
        debug!(%mv, %san, "applied move locally");
        Ok(AppliedMove {
            fen,
            san: san.to_string(),
        })
    }

    fn is_promotion(&self, fen: &str, from: Square, to: Square) -> Result<bool> {
        Ok(match self.piece_at(fen, from)? {
            Some(piece) if piece.kind == PieceKind::Pawn => to.is_last_rank_for(piece.owner),
            _ => false,
        })
    }

    fn is_game_over(&self, fen: &str) -> Result<bool> {
        Ok(self.position(fen)?.is_game_over())
    }

    fn replay_san(&self, start_fen: &str, sans: &[String]) -> Result<String> {
        let mut pos = self.position(start_fen)?;
        for (offset, text) in sans.iter().enumerate() {
            let san: SanPlus = text
                .parse()
                .map_err(|err| rules_error(format!("ply {}: bad SAN '{text}': {err}", offset + 1)))?;
            let m = san
                .san
                .to_move(&pos)
                .map_err(|err| rules_error(format!("ply {}: '{text}' {err}", offset + 1)))?;
            pos.play_unchecked(m);
        }
        Ok(Fen::from_position(&pos, EnPassantMode::Legal).to_string())
    }
}

fn to_shakmaty_square(square: Square) -> shakmaty::Square {
    shakmaty::Square::from_coords(
        shakmaty::File::new(u32::from(square.file)),
        shakmaty::Rank::new(u32::from(square.rank)),
    )
}

fn from_shakmaty_square(square: shakmaty::Square) -> Square {
    Square {
        file: square.file().to_u32() as u8,
        rank: square.rank().to_u32() as u8,
    }
}

fn from_shakmaty_color(color: shakmaty::Color) -> Color {
    match color {
        shakmaty::Color::White => Color::White,
        shakmaty::Color::Black => Color::Black,
    }
}

fn from_shakmaty_role(role: Role) -> PieceKind {
    match role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    }
}

pub fn rules_error(message: impl Into<String>) -> VantageError {
    VantageError::Rules(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_types::board::INITIAL_FEN;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn knight_destinations_from_start() {
        let rules = ShakmatyRules::new();
        let targets = rules.legal_destinations(INITIAL_FEN, sq("g1")).unwrap();
        assert_eq!(targets, vec![sq("f3"), sq("h3")]);
        assert!(rules.legal_destinations(INITIAL_FEN, sq("e8")).unwrap().is_empty());
    }

    #[test]
    fn apply_produces_fen_and_san() {
        let rules = ShakmatyRules::new();
        let applied = rules
            .apply(INITIAL_FEN, &UciMove::new(sq("e2"), sq("e4")))
            .unwrap();
        assert_eq!(applied.san, "e4");
        assert!(applied.fen.starts_with("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b"));
        assert_eq!(rules.side_to_move(&applied.fen).unwrap(), Color::Black);
    }

    #[test]
    fn illegal_move_is_rules_error() {
        let rules = ShakmatyRules::new();
        let err = rules
            .apply(INITIAL_FEN, &UciMove::new(sq("e2"), sq("e5")))
            .unwrap_err();
        assert!(matches!(err, VantageError::Rules(_)));
    }

    #[test]
    fn castling_targets_king_destination() {
        let rules = ShakmatyRules::new();
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        let targets = rules.legal_destinations(fen, sq("e1")).unwrap();
        assert!(targets.contains(&sq("g1")));
        assert!(targets.contains(&sq("c1")));
        assert!(!targets.contains(&sq("h1")));
        let castled = rules.apply(fen, &UciMove::new(sq("e1"), sq("g1"))).unwrap();
        assert_eq!(castled.san, "O-O");
    }

    #[test]
    fn promotion_detection_and_queen_promotion() {
        let rules = ShakmatyRules::new();
        let fen = "8/4P3/8/8/8/8/k7/4K3 w - - 0 1";
        assert!(rules.is_promotion(fen, sq("e7"), sq("e8")).unwrap());
        assert!(!rules.is_promotion(fen, sq("e1"), sq("e2")).unwrap());
        assert_eq!(rules.legal_destinations(fen, sq("e7")).unwrap(), vec![sq("e8")]);
        let promoted = rules
            .apply(fen, &UciMove::new(sq("e7"), sq("e8")).with_promotion(PieceKind::Queen))
            .unwrap();
        assert_eq!(promoted.san, "e8=Q");
    }

    #[test]
    fn replay_matches_incremental_application() {
        let rules = ShakmatyRules::new();
        let sans = vec!["e4".to_string(), "e5".to_string(), "Nf3".to_string()];
        let replayed = rules.replay_san(INITIAL_FEN, &sans).unwrap();
        let mut fen = INITIAL_FEN.to_string();
        for mv in ["e2e4", "e7e5", "g1f3"] {
            fen = rules.apply(&fen, &mv.parse().unwrap()).unwrap().fen;
        }
        assert_eq!(replayed, fen);
        assert!(rules.replay_san(INITIAL_FEN, &["e5".to_string()]).is_err());
    }

    #[test]
    fn detects_finished_game() {
        let rules = ShakmatyRules::new();
        let mate = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        assert!(rules.is_game_over(mate).unwrap());
        assert!(!rules.is_game_over(INITIAL_FEN).unwrap());
        assert!(rules.side_to_move("not a fen").is_err());
    }
}
