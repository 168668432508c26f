use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    board::{side_to_move, Color, PieceKind, Square, INITIAL_FEN},
    Result, VantageError,
};

/// Move in UCI notation: `from` + `to` + optional promotion letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UciMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl UciMove {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, kind: PieceKind) -> Self {
        self.promotion = Some(kind);
        self
    }
}

impl fmt::Display for UciMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.letter())?;
        }
        Ok(())
    }
}

impl FromStr for UciMove {
    type Err = VantageError;

    fn from_str(s: &str) -> Result<Self> {
        if !(4..=5).contains(&s.len()) || !s.is_ascii() {
            return Err(VantageError::Protocol(format!("invalid UCI move '{s}'")));
        }
        let from = s[0..2].parse()?;
        let to = s[2..4].parse()?;
        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => match PieceKind::from_letter(c) {
                Some(kind) if !matches!(kind, PieceKind::Pawn | PieceKind::King) => Some(kind),
                _ => {
                    return Err(VantageError::Protocol(format!(
                        "invalid promotion in UCI move '{s}'"
                    )))
                }
            },
        };
        Ok(Self {
            from,
            to,
            promotion,
        })
    }
}

impl TryFrom<String> for UciMove {
    type Error = VantageError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<UciMove> for String {
    fn from(value: UciMove) -> Self {
        value.to_string()
    }
}

/// One half-move of the timeline. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ply {
    pub index: u32,
    pub san: String,
    pub uci: Option<UciMove>,
    pub time_spent_ms: u64,
    /// Backend evaluation after this ply, as a win fraction in `[0, 1]`.
    pub eval_score: Option<f32>,
    pub search_depth: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMove {
    pub from: Square,
    pub to: Square,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopLine {
    pub line: String,
    pub q: f32,
    pub visits: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub win_prob: f32,
    pub simulations: u64,
    pub depth: u32,
    pub top_lines: Vec<TopLine>,
    pub heatmap: BTreeMap<Square, f32>,
}

/// Canonical, server-confirmed game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub fen: String,
    pub view: u32,
    pub plies: Vec<Ply>,
    pub last_move: Option<LastMove>,
    pub engine_stats: Option<EngineStats>,
}

impl GameSnapshot {
    pub fn len(&self) -> u32 {
        self.plies.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.plies.is_empty()
    }

    pub fn is_at_tip(&self) -> bool {
        self.view == self.len()
    }

    pub fn side_to_move(&self) -> Result<Color> {
        side_to_move(&self.fen)
    }

    /// Checks `0 <= view <= plies.len()` and 1-based contiguous ply indices.
    pub fn validate(&self) -> Result<()> {
        if self.view > self.len() {
            return Err(VantageError::Protocol(format!(
                "view {} exceeds recorded plies {}",
                self.view,
                self.len()
            )));
        }
        for (offset, ply) in self.plies.iter().enumerate() {
            if ply.index != offset as u32 + 1 {
                return Err(VantageError::Protocol(format!(
                    "ply at position {} carries index {}",
                    offset + 1,
                    ply.index
                )));
            }
        }
        if self.fen.split_whitespace().count() < 2 {
            return Err(VantageError::Protocol(format!("malformed FEN '{}'", self.fen)));
        }
        Ok(())
    }

    pub fn ply(&self, index: u32) -> Option<&Ply> {
        index
            .checked_sub(1)
            .and_then(|offset| self.plies.get(offset as usize))
    }
}

impl Default for GameSnapshot {
    fn default() -> Self {
        Self {
            fen: INITIAL_FEN.to_string(),
            view: 0,
            plies: Vec::new(),
            last_move: None,
            engine_stats: None,
        }
    }
}
