use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{VantageError, Result};

/// The two sides of a chess game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Parses the side-to-move field of a FEN (`w` / `b`).
    pub fn from_fen_char(c: char) -> Option<Self> {
        match c {
            'w' => Some(Color::White),
            'b' => Some(Color::Black),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Lowercase letter used by UCI promotion suffixes and FEN.
    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }
}

/// Board coordinate, 0-indexed from a1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square {
    pub file: u8,
    pub rank: u8,
}

impl Square {
    pub const FILES: u8 = 8;
    pub const RANKS: u8 = 8;

    /// Returns `None` when the coordinate is off the board.
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < Self::FILES && rank < Self::RANKS).then_some(Self { file, rank })
    }

    pub fn offset(&self, df: i8, dr: i8) -> Option<Square> {
        let nf = self.file as i16 + df as i16;
        let nr = self.rank as i16 + dr as i16;
        if (0..Self::FILES as i16).contains(&nf) && (0..Self::RANKS as i16).contains(&nr) {
            Square::new(nf as u8, nr as u8)
        } else {
            None
        }
    }

    /// Index in `0..64`, a1 = 0, h8 = 63.
    pub fn index(&self) -> usize {
        self.rank as usize * Self::FILES as usize + self.file as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index >= 64 {
            return None;
        }
        Square::new((index % 8) as u8, (index / 8) as u8)
    }

    /// All 64 squares, a1 first.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).filter_map(Square::from_index)
    }

    pub fn is_last_rank_for(&self, color: Color) -> bool {
        match color {
            Color::White => self.rank == Self::RANKS - 1,
            Color::Black => self.rank == 0,
        }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

impl FromStr for Square {
    type Err = VantageError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(VantageError::Protocol(format!("invalid square '{s}'")));
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(|| VantageError::Protocol(format!("invalid square '{s}'")))
    }
}

impl TryFrom<String> for Square {
    type Error = VantageError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Square> for String {
    fn from(value: Square) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub owner: Color,
    pub kind: PieceKind,
}

impl Piece {
    /// FEN letter: uppercase for White, lowercase for Black.
    pub fn fen_char(&self) -> char {
        let c = self.kind.letter();
        match self.owner {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }
}

/// Piece placement decoded from the first FEN field, used for drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pieces: Vec<Option<Piece>>,
}

impl Placement {
    pub fn empty() -> Self {
        Self {
            pieces: vec![None; 64],
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self> {
        let board = fen
            .split_whitespace()
            .next()
            .ok_or_else(|| VantageError::Protocol("empty FEN".into()))?;
        let ranks: Vec<&str> = board.split('/').collect();
        if ranks.len() != Square::RANKS as usize {
            return Err(VantageError::Protocol(format!(
                "FEN board must have 8 ranks, found {}",
                ranks.len()
            )));
        }

        let mut placement = Self::empty();
        for (row, rank_text) in ranks.iter().enumerate() {
            let rank = Square::RANKS - 1 - row as u8;
            let mut file: u8 = 0;
            for c in rank_text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as u8;
                    continue;
                }
                let kind = PieceKind::from_letter(c)
                    .ok_or_else(|| VantageError::Protocol(format!("unknown FEN piece '{c}'")))?;
                let owner = if c.is_ascii_uppercase() {
                    Color::White
                } else {
                    Color::Black
                };
                let square = Square::new(file, rank).ok_or_else(|| {
                    VantageError::Protocol(format!("FEN rank {} overflows", rank + 1))
                })?;
                placement.pieces[square.index()] = Some(Piece { owner, kind });
                file += 1;
            }
            if file != Square::FILES {
                return Err(VantageError::Protocol(format!(
                    "FEN rank {} has {} files",
                    rank + 1,
                    file
                )));
            }
        }
        Ok(placement)
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.pieces.get(square.index()).copied().flatten()
    }

    pub fn is_empty(&self, square: Square) -> bool {
        self.piece_at(square).is_none()
    }
}

/// Side to move as recorded in the second FEN field.
pub fn side_to_move(fen: &str) -> Result<Color> {
    fen.split_whitespace()
        .nth(1)
        .and_then(|field| field.chars().next())
        .and_then(Color::from_fen_char)
        .ok_or_else(|| VantageError::Protocol(format!("FEN without side to move: '{fen}'")))
}

pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
