//! Projections for the actor and training dashboards.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tracing::debug;
use vantage_types::dashboard::{ActorStatus, GalleryGame, PhaseTimes, TrainingStats, WorkerStats};

/// Samples kept per live chart.
pub const LIVE_WINDOW: usize = 60;
/// Bars shown in the opening chart.
pub const TOP_OPENINGS: usize = 8;

/// Value head output in `[-1, 1]` as a win percentage.
pub fn win_rate_percent(value: f32) -> f32 {
    (value.clamp(-1.0, 1.0) + 1.0) / 2.0 * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerRow {
    pub id: String,
    pub status: String,
    pub move_count: u32,
    pub depth: String,
    pub win_rate: Option<f32>,
    pub total_games: Option<u64>,
    pub total_samples: Option<u64>,
    pub active: bool,
}

impl WorkerRow {
    fn from_stats(id: &str, stats: &WorkerStats, active: bool) -> Self {
        Self {
            id: id.to_string(),
            status: stats.status.clone(),
            move_count: stats.move_count,
            depth: stats
                .depth()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            win_rate: stats.value.map(win_rate_percent),
            total_games: stats.total_games,
            total_samples: stats.total_samples,
            active,
        }
    }
}

/// Worker rows in id order. With no explicit choice the first worker is
/// the active one.
pub fn worker_rows(status: &ActorStatus, active: Option<&str>) -> Vec<WorkerRow> {
    let active = active
        .map(str::to_string)
        .or_else(|| status.workers.keys().next().cloned());
    status
        .workers
        .iter()
        .map(|(id, stats)| WorkerRow::from_stats(id, stats, active.as_deref() == Some(id)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossPoint {
    pub iteration: u64,
    pub policy: f32,
    pub value: f32,
    pub total: f32,
}

/// Iterations with both losses reported; partial entries are skipped.
pub fn loss_series(stats: &TrainingStats) -> Vec<LossPoint> {
    stats
        .iterations
        .iter()
        .enumerate()
        .filter_map(|(i, iteration)| {
            let policy = stats.p_loss.get(i).copied().flatten()?;
            let value = stats.v_loss.get(i).copied().flatten()?;
            Some(LossPoint {
                iteration: *iteration,
                policy,
                value,
                total: policy + value,
            })
        })
        .collect()
}

pub fn training_summary(stats: &TrainingStats) -> String {
    let latest = loss_series(stats).pop();
    let lr = stats.lr.iter().rev().find_map(|lr| *lr);
    match latest {
        Some(point) => format!(
            "iteration {} | loss {:.4} (policy {:.4}, value {:.4}) | lr {} | buffer {}",
            point.iteration,
            point.total,
            point.policy,
            point.value,
            lr.map(|lr| format!("{lr:.0e}")).unwrap_or_else(|| "-".into()),
            stats
                .buffer_size
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".into()),
        ),
        None => "no training iterations yet".to_string(),
    }
}

pub fn actor_summary(status: &ActorStatus) -> String {
    let thinking = status
        .workers
        .values()
        .filter(|w| w.status == "Thinking")
        .count();
    format!(
        "{} workers ({} thinking) | {} buffer files",
        status.workers.len(),
        thinking,
        status.buffer_count
    )
}

/// One point per distinct move of the followed worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiveSample {
    pub move_count: u32,
    pub win_rate: Option<f32>,
    pub depth: Option<u32>,
    pub entropy: Option<f32>,
    pub inference_ms: Option<f32>,
}

/// Rolling chart data for one worker. Polls faster than the worker moves
/// report the same `move_count` again; those add nothing.
#[derive(Debug, Clone)]
pub struct WorkerLiveSeries {
    capacity: usize,
    last_move: Option<u32>,
    samples: VecDeque<LiveSample>,
    phase_times: Option<PhaseTimes>,
}

impl WorkerLiveSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            last_move: None,
            samples: VecDeque::with_capacity(capacity),
            phase_times: None,
        }
    }

    /// Records `stats` unless its move was already sampled. Returns whether
    /// a sample was added.
    pub fn push(&mut self, stats: &WorkerStats) -> bool {
        if self.last_move == Some(stats.move_count) {
            return false;
        }
        self.samples.push_back(LiveSample {
            move_count: stats.move_count,
            win_rate: stats.value.map(win_rate_percent),
            depth: stats.depth(),
            entropy: stats.entropy,
            inference_ms: stats.inference_ms,
        });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        if stats.phase_times.is_some() {
            self.phase_times = stats.phase_times;
        }
        self.last_move = Some(stats.move_count);
        true
    }

    pub fn reset(&mut self) {
        self.last_move = None;
        self.samples.clear();
        self.phase_times = None;
    }

    pub fn samples(&self) -> &VecDeque<LiveSample> {
        &self.samples
    }

    pub fn latest(&self) -> Option<&LiveSample> {
        self.samples.back()
    }

    pub fn phase_times(&self) -> Option<PhaseTimes> {
        self.phase_times
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Position cursor over a worker's game. While live it follows the newest
/// position on every sync; stepping back leaves live mode and stepping onto
/// the last position re-enters it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryCursor {
    fens: Vec<String>,
    index: usize,
    live: bool,
}

impl Default for HistoryCursor {
    fn default() -> Self {
        Self {
            fens: Vec::new(),
            index: 0,
            live: true,
        }
    }
}

impl HistoryCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the worker's current game. Ignored unless live.
    pub fn sync(&mut self, fens: &[String]) {
        if !self.live {
            return;
        }
        self.fens = fens.to_vec();
        self.index = self.fens.len().saturating_sub(1);
    }

    /// Shows a finished game from its final position, outside live mode.
    pub fn load_game(&mut self, history: Vec<String>) {
        self.live = false;
        self.index = history.len().saturating_sub(1);
        self.fens = history;
    }

    pub fn prev(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        self.live = false;
        true
    }

    pub fn next(&mut self) -> bool {
        if self.index + 1 >= self.fens.len() {
            return false;
        }
        self.index += 1;
        if self.index + 1 == self.fens.len() {
            self.live = true;
        }
        true
    }

    pub fn go_live(&mut self) {
        self.live = true;
        self.index = self.fens.len().saturating_sub(1);
    }

    pub fn current(&self) -> Option<&str> {
        self.fens.get(self.index).map(String::as_str)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.fens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fens.is_empty()
    }

    pub fn is_live(&self) -> bool {
        self.live
    }
}

/// Follows one worker across polls. Switching worker starts the charts and
/// the cursor over.
#[derive(Debug, Clone)]
pub struct DashboardTracker {
    preferred: Option<String>,
    worker: Option<String>,
    series: WorkerLiveSeries,
    cursor: HistoryCursor,
    gallery: Vec<GalleryGame>,
    openings: BTreeMap<String, u64>,
}

impl DashboardTracker {
    /// With no preferred worker the first one reported is followed.
    pub fn new(preferred: Option<String>) -> Self {
        Self {
            preferred,
            worker: None,
            series: WorkerLiveSeries::new(LIVE_WINDOW),
            cursor: HistoryCursor::new(),
            gallery: Vec::new(),
            openings: BTreeMap::new(),
        }
    }

    pub fn select(&mut self, worker: impl Into<String>) {
        let worker = worker.into();
        self.preferred = Some(worker.clone());
        self.switch_to(worker);
    }

    /// Feeds one `/api/status` poll. Returns whether a chart sample was
    /// added; nothing is sampled while browsing history.
    pub fn observe(&mut self, status: &ActorStatus) -> bool {
        let Some(id) = self
            .preferred
            .clone()
            .or_else(|| status.workers.keys().next().cloned())
        else {
            return false;
        };
        if self.worker.as_deref() != Some(id.as_str()) {
            self.switch_to(id.clone());
        }
        let Some(stats) = status.workers.get(&id) else {
            debug!(worker = %id, "followed worker missing from status");
            return false;
        };
        if !stats.recent_gallery.is_empty() {
            self.gallery = stats.recent_gallery.clone();
        }
        if !stats.openings.is_empty() {
            self.openings = stats.openings.clone();
        }
        if !stats.history_fens.is_empty() {
            self.cursor.sync(&stats.history_fens);
        }
        self.cursor.is_live() && self.series.push(stats)
    }

    /// Opens the `index`th gallery game (newest first) in the cursor.
    pub fn open_game(&mut self, index: usize) -> Option<&GalleryGame> {
        let game = self.gallery.get(index)?;
        self.cursor.load_game(game.history.clone());
        Some(game)
    }

    fn switch_to(&mut self, worker: String) {
        debug!(%worker, "following worker");
        self.worker = Some(worker);
        self.series.reset();
        self.cursor = HistoryCursor::new();
        self.gallery.clear();
        self.openings.clear();
    }

    pub fn worker(&self) -> Option<&str> {
        self.worker.as_deref()
    }

    pub fn series(&self) -> &WorkerLiveSeries {
        &self.series
    }

    pub fn cursor(&self) -> &HistoryCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut HistoryCursor {
        &mut self.cursor
    }

    pub fn gallery(&self) -> &[GalleryGame] {
        &self.gallery
    }

    pub fn openings(&self) -> Vec<(String, u64)> {
        top_openings(&self.openings, TOP_OPENINGS)
    }
}

/// Most played first moves, highest count first, labels upper-cased.
pub fn top_openings(openings: &BTreeMap<String, u64>, limit: usize) -> Vec<(String, u64)> {
    let mut sorted: Vec<(String, u64)> = openings
        .iter()
        .map(|(mv, count)| (mv.to_uppercase(), *count))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted.truncate(limit);
    sorted
}

pub fn live_summary(tracker: &DashboardTracker) -> String {
    let worker = tracker.worker().unwrap_or("-");
    let cursor = tracker.cursor();
    let mode = if cursor.is_live() { "live" } else { "history" };
    let sample = match tracker.series().latest() {
        Some(sample) => format!(
            "move {} | win {} | depth {} | entropy {} | {} ms",
            sample.move_count,
            sample
                .win_rate
                .map(|w| format!("{w:.1}%"))
                .unwrap_or_else(|| "-".into()),
            sample
                .depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            sample
                .entropy
                .map(|e| format!("{e:.2}"))
                .unwrap_or_else(|| "-".into()),
            sample
                .inference_ms
                .map(|ms| format!("{ms:.1}"))
                .unwrap_or_else(|| "-".into()),
        ),
        None => "no samples".to_string(),
    };
    format!(
        "worker {worker} [{mode} {}/{}] | {sample}",
        cursor.index(),
        cursor.len().saturating_sub(1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(status: &str, value: Option<f32>, depth: serde_json::Value) -> WorkerStats {
        WorkerStats {
            status: status.into(),
            move_count: 10,
            last_depth: Some(depth),
            value,
            ..Default::default()
        }
    }

    #[test]
    fn win_rate_maps_value_range() {
        assert_eq!(win_rate_percent(-1.0), 0.0);
        assert_eq!(win_rate_percent(0.0), 50.0);
        assert_eq!(win_rate_percent(1.0), 100.0);
    }

    #[test]
    fn worker_rows_mark_active_and_placeholders() {
        let mut status = ActorStatus::default();
        status
            .workers
            .insert("0".into(), worker("Thinking", Some(0.5), serde_json::json!(6)));
        status
            .workers
            .insert("1".into(), worker("Saving/Updating", None, serde_json::json!("-")));

        let rows = worker_rows(&status, None);
        assert!(rows[0].active);
        assert_eq!(rows[0].win_rate, Some(75.0));
        assert_eq!(rows[1].depth, "-");

        let rows = worker_rows(&status, Some("1"));
        assert!(!rows[0].active && rows[1].active);
        assert_eq!(actor_summary(&status), "2 workers (1 thinking) | 0 buffer files");
    }

    #[test]
    fn loss_series_skips_partial_iterations() {
        let stats = TrainingStats {
            iterations: vec![0, 1, 2],
            p_loss: vec![Some(2.0), None, Some(1.0)],
            v_loss: vec![Some(0.5), Some(0.4), Some(0.25)],
            lr: vec![Some(0.01), Some(0.01), None],
            buffer_size: Some(100),
            last_update: None,
        };
        let series = loss_series(&stats);
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].iteration, 2);
        assert_eq!(series[1].total, 1.25);
        assert!(training_summary(&stats).starts_with("iteration 2 | loss 1.2500"));
        assert_eq!(
            training_summary(&TrainingStats::default()),
            "no training iterations yet"
        );
    }

    fn moving(move_count: u32, fens: &[&str]) -> WorkerStats {
        WorkerStats {
            status: "Thinking".into(),
            move_count,
            value: Some(0.0),
            entropy: Some(1.5),
            inference_ms: Some(12.0),
            history_fens: fens.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    fn status_of(workers: &[(&str, WorkerStats)]) -> ActorStatus {
        ActorStatus {
            buffer_count: 0,
            workers: workers
                .iter()
                .map(|(id, stats)| (id.to_string(), stats.clone()))
                .collect(),
        }
    }

    #[test]
    fn live_series_samples_each_move_once() {
        let mut series = WorkerLiveSeries::new(3);
        assert!(series.push(&moving(1, &[])));
        assert!(!series.push(&moving(1, &[])));
        assert!(series.push(&moving(2, &[])));
        assert_eq!(series.len(), 2);
        assert_eq!(series.latest().unwrap().win_rate, Some(50.0));

        for n in 3..=5 {
            series.push(&moving(n, &[]));
        }
        assert_eq!(series.len(), 3);
        assert_eq!(series.samples().front().unwrap().move_count, 3);

        series.reset();
        assert!(series.is_empty());
        assert!(series.push(&moving(5, &[])));
    }

    #[test]
    fn cursor_leaves_and_rejoins_live() {
        let fens: Vec<String> = ["a", "b", "c"].iter().map(|f| f.to_string()).collect();
        let mut cursor = HistoryCursor::new();
        cursor.sync(&fens);
        assert_eq!(cursor.current(), Some("c"));
        assert!(!cursor.next());

        assert!(cursor.prev());
        assert!(!cursor.is_live());
        cursor.sync(&["x".to_string()]);
        assert_eq!(cursor.current(), Some("b"));

        assert!(cursor.next());
        assert!(cursor.is_live());
        cursor.prev();
        cursor.prev();
        assert!(!cursor.prev());
        assert_eq!(cursor.index(), 0);
        cursor.go_live();
        assert_eq!(cursor.current(), Some("c"));
    }

    #[test]
    fn tracker_pauses_sampling_while_browsing() {
        let mut tracker = DashboardTracker::new(None);
        assert!(tracker.observe(&status_of(&[("0", moving(1, &["p0", "p1"]))])));
        assert!(!tracker.observe(&status_of(&[("0", moving(1, &["p0", "p1"]))])));

        tracker.cursor_mut().prev();
        assert!(!tracker.observe(&status_of(&[("0", moving(2, &["p0", "p1", "p2"]))])));
        assert_eq!(tracker.cursor().current(), Some("p0"));

        tracker.cursor_mut().go_live();
        assert!(tracker.observe(&status_of(&[("0", moving(3, &["p0", "p1", "p2", "p3"]))])));
        assert_eq!(tracker.cursor().current(), Some("p3"));
        assert_eq!(tracker.series().len(), 2);
    }

    #[test]
    fn switching_worker_starts_over() {
        let mut tracker = DashboardTracker::new(None);
        let status = status_of(&[("0", moving(7, &["a"])), ("1", moving(7, &["b", "c"]))]);
        assert!(tracker.observe(&status));
        assert_eq!(tracker.worker(), Some("0"));

        tracker.select("1");
        assert!(tracker.series().is_empty());
        assert!(tracker.observe(&status));
        assert_eq!(tracker.worker(), Some("1"));
        assert_eq!(tracker.cursor().current(), Some("c"));
    }

    #[test]
    fn gallery_game_opens_outside_live_mode() {
        let mut stats = moving(4, &["a", "b"]);
        stats.recent_gallery = vec![GalleryGame {
            id: "game_3".into(),
            result: "0-1".into(),
            moves: 2,
            history: vec!["s".into(), "t".into(), "u".into()],
        }];
        stats.openings = [("e2e4".to_string(), 3), ("d2d4".to_string(), 9)]
            .into_iter()
            .collect();
        let mut tracker = DashboardTracker::new(Some("0".into()));
        tracker.observe(&status_of(&[("0", stats)]));

        assert_eq!(tracker.open_game(0).map(|g| g.id.as_str()), Some("game_3"));
        assert!(tracker.open_game(5).is_none());
        assert!(!tracker.cursor().is_live());
        assert_eq!(tracker.cursor().current(), Some("u"));
        assert_eq!(tracker.openings()[0], ("D2D4".to_string(), 9));
        assert!(live_summary(&tracker).starts_with("worker 0 [history 2/2]"));
    }
}
