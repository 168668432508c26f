//! Chart-ready projections of backend telemetry.

pub mod dashboard;
pub mod heatmap;
pub mod history;
pub mod panel;

use tracing::trace;
use vantage_types::{
    board::Color,
    game::{GameSnapshot, Ply},
    telemetry::{HeatmapGrid, TelemetryPoint, TelemetrySeries},
};

pub use heatmap::HeatmapStyle;
pub use history::{history_rows, HistoryCell, HistoryRow};
pub use panel::{EngineStatsPanel, PvRow};

/// Keeps only the plies the engine played. Stateless; the engine's colour
/// fixes the ply parity (Black plays even plies, White odd ones).
#[derive(Debug, Clone, Copy)]
pub struct TelemetryProjector {
    engine_side: Color,
}

impl TelemetryProjector {
    pub fn new(engine_side: Color) -> Self {
        Self { engine_side }
    }

    pub fn is_engine_ply(&self, index: u32) -> bool {
        match self.engine_side {
            Color::Black => index > 0 && index % 2 == 0,
            Color::White => index % 2 == 1,
        }
    }

    pub fn project(&self, snapshot: &GameSnapshot) -> TelemetrySeries {
        let points: Vec<TelemetryPoint> = snapshot
            .plies
            .iter()
            .filter(|ply| self.is_engine_ply(ply.index))
            .map(|ply| self.point(ply))
            .collect();
        trace!(plies = snapshot.plies.len(), points = points.len(), "projected telemetry");
        TelemetrySeries { points }
    }

    /// 8x8 grid from the snapshot's engine stats; squares without data are
    /// zero, as is the whole grid when no stats were sent.
    pub fn heatmap(&self, snapshot: &GameSnapshot) -> HeatmapGrid {
        let mut grid = HeatmapGrid::zeroed();
        if let Some(stats) = &snapshot.engine_stats {
            for (square, intensity) in &stats.heatmap {
                grid.set(*square, *intensity);
            }
        }
        grid
    }

    fn point(&self, ply: &Ply) -> TelemetryPoint {
        let move_number = (ply.index + 1) / 2;
        TelemetryPoint {
            ply: ply.index,
            label: format!("Move {move_number}"),
            eval_percent: ply.eval_score.unwrap_or(0.0) * 100.0,
            depth: ply.search_depth.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_types::game::EngineStats;

    fn plies(count: u32) -> Vec<Ply> {
        (1..=count)
            .map(|index| Ply {
                index,
                san: format!("m{index}"),
                uci: None,
                time_spent_ms: 100,
                eval_score: Some(index as f32 / 10.0),
                search_depth: Some(index * 2),
            })
            .collect()
    }

    fn snapshot(count: u32) -> GameSnapshot {
        GameSnapshot {
            view: count,
            plies: plies(count),
            ..Default::default()
        }
    }

    #[test]
    fn black_engine_keeps_even_plies() {
        let series = TelemetryProjector::new(Color::Black).project(&snapshot(5));
        assert_eq!(series.labels(), vec!["Move 1", "Move 2"]);
        assert_eq!(series.points[0].ply, 2);
        assert!((series.points[0].eval_percent - 20.0).abs() < 1e-4);
        assert_eq!(series.depth_values(), vec![4.0, 8.0]);
    }

    #[test]
    fn white_engine_keeps_odd_plies() {
        let series = TelemetryProjector::new(Color::White).project(&snapshot(5));
        assert_eq!(series.labels(), vec!["Move 1", "Move 2", "Move 3"]);
        assert_eq!(
            series.points.iter().map(|p| p.ply).collect::<Vec<_>>(),
            vec![1, 3, 5]
        );
    }

    #[test]
    fn missing_values_project_to_zero() {
        let mut snap = snapshot(2);
        snap.plies[1].eval_score = None;
        snap.plies[1].search_depth = None;
        let series = TelemetryProjector::new(Color::Black).project(&snap);
        assert_eq!(series.eval_values(), vec![0.0]);
        assert_eq!(series.depth_values(), vec![0.0]);
        assert!(TelemetryProjector::new(Color::Black)
            .project(&GameSnapshot::default())
            .is_empty());
    }

    #[test]
    fn heatmap_fills_known_squares_only() {
        let projector = TelemetryProjector::new(Color::Black);
        assert_eq!(projector.heatmap(&GameSnapshot::default()).max(), 0.0);

        let mut snap = snapshot(0);
        let mut stats = EngineStats::default();
        stats.heatmap.insert("e5".parse().unwrap(), 0.75);
        snap.engine_stats = Some(stats);
        let grid = projector.heatmap(&snap);
        assert_eq!(grid.get("e5".parse().unwrap()), 0.75);
        assert_eq!(grid.get("e4".parse().unwrap()), 0.0);
    }
}
