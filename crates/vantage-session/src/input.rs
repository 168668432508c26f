use vantage_network::{GatewayCall, GatewayReply};
use vantage_types::{
    board::{Color, Square},
    Result,
};

/// A finished gateway call, tagged with the sequence number it was
/// issued under.
#[derive(Debug)]
pub struct Completion {
    pub seq: u64,
    pub call: GatewayCall,
    pub result: Result<GatewayReply>,
}

#[derive(Debug)]
pub enum SessionInput {
    Boot,
    Click(Square),
    Goto(u32),
    /// Relative navigation, clamped to the recorded plies.
    Step(i32),
    Refresh,
    Completed(Completion),
}

/// Maps rendered cell coordinates back to board squares. Rebuilt by the
/// renderer whenever the board is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLayout {
    pub origin_x: u16,
    pub origin_y: u16,
    pub cell_width: u16,
    pub cell_height: u16,
    pub orientation: Color,
}

impl BoardLayout {
    pub fn new(origin_x: u16, origin_y: u16, cell_width: u16, cell_height: u16, orientation: Color) -> Self {
        Self {
            origin_x,
            origin_y,
            cell_width: cell_width.max(1),
            cell_height: cell_height.max(1),
            orientation,
        }
    }

    pub fn width(&self) -> u16 {
        self.cell_width * u16::from(Square::FILES)
    }

    pub fn height(&self) -> u16 {
        self.cell_height * u16::from(Square::RANKS)
    }

    /// Square under the absolute position `(x, y)`, if it is on the board.
    pub fn square_at(&self, x: u16, y: u16) -> Option<Square> {
        let dx = x.checked_sub(self.origin_x)?;
        let dy = y.checked_sub(self.origin_y)?;
        let column = dx / self.cell_width;
        let row = dy / self.cell_height;
        if column >= u16::from(Square::FILES) || row >= u16::from(Square::RANKS) {
            return None;
        }
        let (column, row) = (column as u8, row as u8);
        match self.orientation {
            Color::White => Square::new(column, Square::RANKS - 1 - row),
            Color::Black => Square::new(Square::FILES - 1 - column, row),
        }
    }

    /// Top-left cell coordinate of `square`.
    pub fn cell_origin(&self, square: Square) -> (u16, u16) {
        let (column, row) = self.grid_position(square);
        (
            self.origin_x + u16::from(column) * self.cell_width,
            self.origin_y + u16::from(row) * self.cell_height,
        )
    }

    /// Column and row of `square` in screen order.
    pub fn grid_position(&self, square: Square) -> (u8, u8) {
        match self.orientation {
            Color::White => (square.file, Square::RANKS - 1 - square.rank),
            Color::Black => (Square::FILES - 1 - square.file, square.rank),
        }
    }
}

/// Keyboard cursor over the board, moving in screen directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardCursor {
    pub square: Square,
}

impl BoardCursor {
    pub fn new(square: Square) -> Self {
        Self { square }
    }

    /// `right`/`up` are screen directions; the board orientation decides
    /// which way that is in files and ranks.
    pub fn shift(&mut self, right: i8, up: i8, orientation: Color) {
        let (df, dr) = match orientation {
            Color::White => (right, up),
            Color::Black => (-right, -up),
        };
        if let Some(next) = self.square.offset(df, dr) {
            self.square = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn white_layout_maps_cells_to_squares() {
        let layout = BoardLayout::new(2, 1, 3, 1, Color::White);
        assert_eq!(layout.square_at(2, 1), Some(sq("a8")));
        assert_eq!(layout.square_at(4, 8), Some(sq("a1")));
        assert_eq!(layout.square_at(25, 8), Some(sq("h1")));
        assert_eq!(layout.square_at(26, 8), None);
        assert_eq!(layout.square_at(1, 1), None);
        assert_eq!(layout.square_at(2, 9), None);
    }

    #[test]
    fn black_layout_is_flipped() {
        let layout = BoardLayout::new(0, 0, 2, 1, Color::Black);
        assert_eq!(layout.square_at(0, 0), Some(sq("h1")));
        assert_eq!(layout.square_at(15, 7), Some(sq("a8")));
        for square in Square::all() {
            let (x, y) = layout.cell_origin(square);
            assert_eq!(layout.square_at(x, y), Some(square));
        }
    }

    #[test]
    fn cursor_stays_on_board() {
        let mut cursor = BoardCursor::new(sq("a1"));
        cursor.shift(-1, 0, Color::White);
        assert_eq!(cursor.square, sq("a1"));
        cursor.shift(1, 1, Color::White);
        assert_eq!(cursor.square, sq("b2"));
        cursor.shift(1, 1, Color::Black);
        assert_eq!(cursor.square, sq("a1"));
    }
}
