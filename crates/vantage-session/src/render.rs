use vantage_telemetry::{EngineStatsPanel, HeatmapStyle, HistoryRow};
use vantage_types::{
    board::{Color, Placement},
    telemetry::{HeatmapGrid, SeriesStyle, TelemetrySeries},
    Result,
};

use crate::selection::{Highlights, SelectionState};

/// Everything a renderer needs for one redraw. Built by the session and
/// read-only from the renderer's side.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    /// Optimistic preview while a move is in flight, else the confirmed
    /// position at the view.
    pub fen: String,
    pub placement: Placement,
    pub side_to_move: Option<Color>,
    pub orientation: Color,
    pub view: u32,
    pub len: u32,
    pub history: Vec<HistoryRow>,
    pub highlights: Highlights,
    pub selection: SelectionState,
    pub series: TelemetrySeries,
    pub eval_style: SeriesStyle,
    pub depth_style: SeriesStyle,
    pub heatmap: HeatmapGrid,
    pub heatmap_style: HeatmapStyle,
    pub stats: EngineStatsPanel,
    pub queued_goto: Option<u32>,
    pub status: String,
}

impl RenderFrame {
    pub fn is_at_tip(&self) -> bool {
        self.view == self.len
    }
}

/// Draws frames. Implementations never feed anything back into the session
/// except through the input channel.
pub trait Renderer: Send {
    fn render(&mut self, frame: &RenderFrame) -> Result<()>;
}
