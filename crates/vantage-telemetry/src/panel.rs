use serde::Serialize;
use vantage_types::game::EngineStats;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PvRow {
    pub line: String,
    /// e.g. `Q: 0.12 | 40s`
    pub detail: String,
}

/// Text for the engine statistics box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatsPanel {
    pub win_rate: String,
    pub simulations: String,
    pub depth: String,
    pub principal_variations: Vec<PvRow>,
}

impl EngineStatsPanel {
    pub fn from_stats(stats: Option<&EngineStats>) -> Self {
        let Some(stats) = stats else {
            return Self::placeholder();
        };
        Self {
            win_rate: format!("{:.1}%", stats.win_prob),
            simulations: stats.simulations.to_string(),
            depth: stats.depth.to_string(),
            principal_variations: stats
                .top_lines
                .iter()
                .map(|line| PvRow {
                    line: line.line.clone(),
                    detail: format!("Q: {:.2} | {}s", line.q, line.visits),
                })
                .collect(),
        }
    }

    fn placeholder() -> Self {
        Self {
            win_rate: "-".into(),
            simulations: "-".into(),
            depth: "-".into(),
            principal_variations: Vec::new(),
        }
    }
}
