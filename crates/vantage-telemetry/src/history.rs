use serde::Serialize;
use vantage_types::game::GameSnapshot;

/// Time bars are scaled against at least half a second.
const MIN_SCALE_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryCell {
    pub ply: u32,
    pub san: String,
    pub time_ms: u64,
    /// Share of the slowest move, in `[0, 1]`.
    pub bar_fraction: f32,
    pub active: bool,
}

/// One line of the move list: move number plus White's and Black's ply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub number: u32,
    pub white: Option<HistoryCell>,
    pub black: Option<HistoryCell>,
}

pub fn history_rows(snapshot: &GameSnapshot) -> Vec<HistoryRow> {
    let scale = snapshot
        .plies
        .iter()
        .map(|p| p.time_spent_ms)
        .max()
        .unwrap_or(0)
        .max(MIN_SCALE_MS);

    let cells: Vec<HistoryCell> = snapshot
        .plies
        .iter()
        .map(|ply| HistoryCell {
            ply: ply.index,
            san: ply.san.clone(),
            time_ms: ply.time_spent_ms,
            bar_fraction: (ply.time_spent_ms as f32 / scale as f32).min(1.0),
            active: snapshot.view == ply.index,
        })
        .collect();

    cells
        .chunks(2)
        .enumerate()
        .map(|(row, pair)| HistoryRow {
            number: row as u32 + 1,
            white: pair.first().cloned(),
            black: pair.get(1).cloned(),
        })
        .collect()
}
