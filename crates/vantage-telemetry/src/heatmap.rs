use vantage_types::config::TelemetryConfig;

/// Overlay colour for heatmap cells.
pub const HEAT_RGB: (u8, u8, u8) = (255, 87, 34);

/// Maps raw intensities to overlay opacity. Visit distributions are
/// usually flat, so intensities are amplified and then capped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapStyle {
    pub gain: f32,
    pub max_alpha: f32,
}

impl HeatmapStyle {
    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self {
            gain: config.heatmap_gain,
            max_alpha: config.heatmap_max_alpha,
        }
    }

    pub fn alpha(&self, intensity: f32) -> f32 {
        (intensity.max(0.0) * self.gain).min(self.max_alpha)
    }

    /// Blends the heat colour over `base` at the cell's alpha.
    pub fn blend(&self, base: (u8, u8, u8), intensity: f32) -> (u8, u8, u8) {
        let a = self.alpha(intensity);
        let mix = |under: u8, over: u8| -> u8 {
            (under as f32 * (1.0 - a) + over as f32 * a).round() as u8
        };
        (
            mix(base.0, HEAT_RGB.0),
            mix(base.1, HEAT_RGB.1),
            mix(base.2, HEAT_RGB.2),
        )
    }
}

impl Default for HeatmapStyle {
    fn default() -> Self {
        Self {
            gain: 1.5,
            max_alpha: 0.8,
        }
    }
}
