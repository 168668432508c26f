use serde::{Deserialize, Serialize};

use crate::board::Square;

/// One engine-move data point on the eval/depth charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    pub ply: u32,
    pub label: String,
    pub eval_percent: f32,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySeries {
    pub points: Vec<TelemetryPoint>,
}

impl TelemetrySeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn eval_values(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.eval_percent).collect()
    }

    pub fn depth_values(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.depth as f32).collect()
    }
}

/// Presentation parameters for a single line chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStyle {
    pub label: String,
    pub color: String,
    pub is_percentage: bool,
}

impl SeriesStyle {
    pub fn win_rate() -> Self {
        Self {
            label: "Win %".into(),
            color: "#312e2b".into(),
            is_percentage: true,
        }
    }

    pub fn depth() -> Self {
        Self {
            label: "Depth".into(),
            color: "#2196f3".into(),
            is_percentage: false,
        }
    }

    /// Parses the `#rrggbb` colour into components.
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.color.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

/// Engine attention per square, intensities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapGrid {
    cells: Vec<f32>,
}

impl HeatmapGrid {
    pub fn zeroed() -> Self {
        Self {
            cells: vec![0.0; 64],
        }
    }

    pub fn get(&self, square: Square) -> f32 {
        self.cells.get(square.index()).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, square: Square, intensity: f32) {
        if let Some(cell) = self.cells.get_mut(square.index()) {
            *cell = intensity.clamp(0.0, 1.0);
        }
    }

    pub fn max(&self) -> f32 {
        self.cells.iter().copied().fold(0.0, f32::max)
    }

    /// Rows from rank 8 down to rank 1, files a..h within a row.
    pub fn rows_top_down(&self) -> Vec<Vec<(Square, f32)>> {
        (0..Square::RANKS)
            .rev()
            .map(|rank| {
                (0..Square::FILES)
                    .filter_map(|file| Square::new(file, rank))
                    .map(|sq| (sq, self.get(sq)))
                    .collect()
            })
            .collect()
    }
}

impl Default for HeatmapGrid {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heatmap_rows_start_at_rank_eight() {
        let mut grid = HeatmapGrid::zeroed();
        grid.set("a8".parse().unwrap(), 0.4);
        grid.set("h1".parse().unwrap(), 2.0);
        let rows = grid.rows_top_down();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0][0].0.to_string(), "a8");
        assert_eq!(rows[0][0].1, 0.4);
        assert_eq!(rows[7][7].1, 1.0);
        assert_eq!(grid.max(), 1.0);
    }

    #[test]
    fn style_presets_parse_colours() {
        assert_eq!(SeriesStyle::win_rate().rgb(), Some((0x31, 0x2e, 0x2b)));
        assert_eq!(SeriesStyle::depth().rgb(), Some((0x21, 0x96, 0xf3)));
        let broken = SeriesStyle {
            color: "blue".into(),
            ..SeriesStyle::depth()
        };
        assert!(broken.rgb().is_none());
    }
}
