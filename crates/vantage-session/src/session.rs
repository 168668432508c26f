use std::{collections::BTreeMap, mem, sync::Arc};

use tracing::{debug, info, warn};
use vantage_network::{GatewayCall, GatewayReply, MoveOutcome};
use vantage_rules::RulesAdapter;
use vantage_telemetry::{history_rows, EngineStatsPanel, HeatmapStyle, TelemetryProjector};
use vantage_types::{
    board::{Placement, Square},
    config::{SessionConfig, TelemetryConfig},
    events::{EventPayload, SessionEvent},
    game::{GameSnapshot, LastMove, UciMove},
    telemetry::{HeatmapGrid, SeriesStyle, TelemetrySeries},
    Result, VantageError,
};

use crate::{
    input::{Completion, SessionInput},
    render::RenderFrame,
    selection::{ClickOutcome, Highlights, SelectionMachine, SelectionState},
    session_error,
    timeline::{reconcile_fen, ReplayTimeline},
};

/// A gateway call the session wants performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub seq: u64,
    pub call: GatewayCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Issue(Request),
}

/// Locally applied move shown until the backend answers.
#[derive(Debug, Clone)]
struct Preview {
    fen: String,
    last_move: LastMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyKind {
    Load,
    Seek,
    Append,
}

/// Client-side game state: the confirmed timeline, the board interaction
/// state and the telemetry derived from them.
///
/// Purely synchronous. Inputs come in through [`Session::handle`], gateway
/// work goes out as [`Effect`]s and results come back as
/// [`SessionInput::Completed`]. Every request carries a sequence number;
/// a response older than the last one applied is dropped.
pub struct Session {
    rules: Arc<dyn RulesAdapter>,
    config: SessionConfig,
    projector: TelemetryProjector,
    heatmap_style: HeatmapStyle,
    timeline: ReplayTimeline,
    selection: SelectionMachine,
    preview: Option<Preview>,
    queued_goto: Option<u32>,
    pending: BTreeMap<u64, GatewayCall>,
    next_seq: u64,
    last_applied_seq: u64,
    series: TelemetrySeries,
    heatmap: HeatmapGrid,
    notice: Option<String>,
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(
        rules: Arc<dyn RulesAdapter>,
        config: SessionConfig,
        telemetry: &TelemetryConfig,
    ) -> Self {
        Self {
            rules,
            projector: TelemetryProjector::new(config.engine_side),
            config,
            heatmap_style: HeatmapStyle::from_config(telemetry),
            timeline: ReplayTimeline::new(),
            selection: SelectionMachine::new(),
            preview: None,
            queued_goto: None,
            pending: BTreeMap::new(),
            next_seq: 1,
            last_applied_seq: 0,
            series: TelemetrySeries::default(),
            heatmap: HeatmapGrid::zeroed(),
            notice: None,
            events: Vec::new(),
        }
    }

    pub fn handle(&mut self, input: SessionInput) -> Result<Vec<Effect>> {
        match input {
            SessionInput::Boot => Ok(self.boot()),
            SessionInput::Click(square) => self.click(square),
            SessionInput::Goto(view) => Ok(self.goto(view)),
            SessionInput::Step(delta) => {
                let base = self.navigation_target();
                let target = self.timeline.step_from(base, delta);
                if target == base && !self.selection.is_awaiting() {
                    return Ok(Vec::new());
                }
                Ok(self.goto(target))
            }
            SessionInput::Refresh => Ok(self.refresh()),
            SessionInput::Completed(completion) => self.complete(completion),
        }
    }

    pub fn timeline(&self) -> &ReplayTimeline {
        &self.timeline
    }

    pub fn selection_state(&self) -> SelectionState {
        self.selection.state()
    }

    pub fn series(&self) -> &TelemetrySeries {
        &self.series
    }

    pub fn queued_goto(&self) -> Option<u32> {
        self.queued_goto
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Events produced since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        mem::take(&mut self.events)
    }

    /// Position shown on the board: the preview while a move is in flight,
    /// otherwise the confirmed position at the view.
    pub fn display_fen(&self) -> &str {
        self.preview
            .as_ref()
            .map(|p| p.fen.as_str())
            .unwrap_or_else(|| self.timeline.fen())
    }

    pub fn frame(&self) -> RenderFrame {
        let fen = self.display_fen().to_string();
        let last_move = match &self.preview {
            Some(preview) => Some(preview.last_move),
            None => self.timeline.last_move(),
        };
        let highlights = self
            .selection
            .highlights(self.rules.as_ref(), &fen, last_move)
            .unwrap_or_else(|err| {
                warn!(%err, "highlight computation failed");
                Highlights {
                    last_move,
                    ..Default::default()
                }
            });
        let placement = Placement::from_fen(&fen).unwrap_or_else(|err| {
            warn!(%err, "unable to draw position");
            Placement::empty()
        });
        let snapshot = self.timeline.snapshot();
        RenderFrame {
            side_to_move: self.rules.side_to_move(&fen).ok(),
            fen,
            placement,
            orientation: self.config.engine_side.opponent(),
            view: snapshot.view,
            len: snapshot.len(),
            history: history_rows(snapshot),
            highlights,
            selection: self.selection.state(),
            series: self.series.clone(),
            eval_style: SeriesStyle::win_rate(),
            depth_style: SeriesStyle::depth(),
            heatmap: self.heatmap.clone(),
            heatmap_style: self.heatmap_style,
            stats: EngineStatsPanel::from_stats(snapshot.engine_stats.as_ref()),
            queued_goto: self.queued_goto,
            status: self.status_line(),
        }
    }

    fn status_line(&self) -> String {
        if let Some(notice) = &self.notice {
            return notice.clone();
        }
        match self.selection.state() {
            SelectionState::AwaitingServer { from, to } => format!("sending {from}{to}..."),
            SelectionState::AwaitingEngine => "engine thinking...".to_string(),
            SelectionState::PieceSelected(square) => format!("{square} selected"),
            SelectionState::Idle if !self.timeline.is_at_tip() => format!(
                "viewing ply {} of {}",
                self.timeline.view(),
                self.timeline.len()
            ),
            SelectionState::Idle => "your move".to_string(),
        }
    }

    fn boot(&mut self) -> Vec<Effect> {
        info!(engine_side = ?self.config.engine_side, "session booting");
        vec![self.issue(GatewayCall::GetState)]
    }

    fn click(&mut self, square: Square) -> Result<Vec<Effect>> {
        // The board is about to change under the user.
        if self.goto_in_flight() {
            debug!(%square, "click ignored while navigating");
            return Ok(Vec::new());
        }
        let fen = self.display_fen().to_string();
        match self.selection.click(self.rules.as_ref(), &fen, square)? {
            ClickOutcome::Commit(mv) => {
                self.notice = None;
                self.preview = match self.rules.apply(&fen, &mv) {
                    Ok(applied) => Some(Preview {
                        fen: applied.fen,
                        last_move: LastMove {
                            from: mv.from,
                            to: mv.to,
                        },
                    }),
                    Err(err) => {
                        warn!(%mv, %err, "preview unavailable");
                        None
                    }
                };
                let effect = self.issue(GatewayCall::SubmitMove(mv));
                if let Effect::Issue(request) = effect {
                    self.emit(EventPayload::MoveSubmitted {
                        seq: request.seq,
                        uci: mv,
                    });
                }
                Ok(vec![effect])
            }
            ClickOutcome::Ignored
            | ClickOutcome::Unchanged
            | ClickOutcome::Selected(_)
            | ClickOutcome::Deselected => Ok(Vec::new()),
        }
    }

    fn goto(&mut self, view: u32) -> Vec<Effect> {
        if self.selection.is_awaiting() {
            self.queued_goto = Some(view);
            self.emit(EventPayload::GotoQueued { view });
            return Vec::new();
        }
        self.selection.reset();
        self.preview = None;
        vec![self.issue(GatewayCall::Goto(view))]
    }

    fn refresh(&mut self) -> Vec<Effect> {
        if !self.pending.is_empty() {
            self.emit(EventPayload::PollSkipped);
            return Vec::new();
        }
        vec![self.issue(GatewayCall::GetState)]
    }

    fn complete(&mut self, completion: Completion) -> Result<Vec<Effect>> {
        let Completion { seq, call, result } = completion;
        if self.pending.remove(&seq).is_none() {
            return Err(session_error(format!("no outstanding request #{seq} ({call})")));
        }
        let stale = seq < self.last_applied_seq;

        let mut effects = Vec::new();
        match (call, result) {
            (GatewayCall::SubmitMove(_), Ok(GatewayReply::Move(MoveOutcome::Accepted(snapshot)))) => {
                self.selection.reset();
                self.preview = None;
                if self.apply(seq, snapshot, ApplyKind::Append, stale)? {
                    effects.extend(self.maybe_request_engine());
                }
            }
            (GatewayCall::SubmitMove(mv), Ok(GatewayReply::Move(MoveOutcome::Rejected(reason)))) => {
                info!(%mv, %reason, "move rejected, resynchronizing");
                self.notice = Some(format!("move {mv} rejected: {reason}"));
                self.emit(EventPayload::MoveRejected { uci: mv, reason });
                effects.push(self.recover_from_failed_mutation());
            }
            (GatewayCall::EngineMove, Ok(GatewayReply::Snapshot(snapshot))) => {
                self.selection.reset();
                self.apply(seq, snapshot, ApplyKind::Append, stale)?;
            }
            (GatewayCall::GetState, Ok(GatewayReply::Snapshot(snapshot))) => {
                self.apply(seq, snapshot, ApplyKind::Load, stale)?;
            }
            (GatewayCall::Goto(_), Ok(GatewayReply::Snapshot(snapshot))) => {
                self.apply(seq, snapshot, ApplyKind::Seek, stale)?;
            }
            (call, Ok(reply)) => {
                let err = VantageError::Protocol(format!("{call} answered with {reply:?}"));
                effects.extend(self.fail(seq, call, err));
            }
            (call, Err(err)) => {
                effects.extend(self.fail(seq, call, err));
            }
        }

        // Navigation parked while a move was in flight goes out now.
        if !self.selection.is_awaiting() {
            if let Some(view) = self.queued_goto.take() {
                self.selection.reset();
                self.preview = None;
                effects.push(self.issue(GatewayCall::Goto(view)));
            }
        }
        Ok(effects)
    }

    fn fail(&mut self, seq: u64, call: GatewayCall, err: VantageError) -> Option<Effect> {
        warn!(seq, %call, %err, "request failed");
        self.notice = Some(format!("{call} failed: {err}"));
        self.emit(EventPayload::RequestFailed {
            seq,
            error: err.to_string(),
        });
        call.is_mutating().then(|| self.recover_from_failed_mutation())
    }

    /// Drops the optimistic state and asks for `/state`.
    fn recover_from_failed_mutation(&mut self) -> Effect {
        self.selection.reset();
        self.preview = None;
        let effect = self.issue(GatewayCall::GetState);
        if let Effect::Issue(request) = effect {
            self.emit(EventPayload::Resync { seq: request.seq });
        }
        effect
    }

    fn maybe_request_engine(&mut self) -> Option<Effect> {
        if !self.config.auto_engine_reply || !self.timeline.is_at_tip() {
            return None;
        }
        let fen = self.timeline.fen().to_string();
        let engine_to_move = self
            .rules
            .side_to_move(&fen)
            .is_ok_and(|side| side == self.config.engine_side);
        let finished = self.rules.is_game_over(&fen).unwrap_or(true);
        if !engine_to_move || finished {
            return None;
        }
        self.selection.await_engine();
        let effect = self.issue(GatewayCall::EngineMove);
        if let Effect::Issue(request) = effect {
            self.emit(EventPayload::EngineRequested { seq: request.seq });
        }
        Some(effect)
    }

    /// Returns whether the snapshot made it into the timeline.
    fn apply(
        &mut self,
        seq: u64,
        mut snapshot: GameSnapshot,
        kind: ApplyKind,
        stale: bool,
    ) -> Result<bool> {
        if stale {
            debug!(seq, last_applied = self.last_applied_seq, "dropping stale response");
            self.emit(EventPayload::StaleResponse {
                seq,
                last_applied: self.last_applied_seq,
            });
            return Ok(false);
        }
        reconcile_fen(self.rules.as_ref(), &mut snapshot)?;
        let change = match kind {
            ApplyKind::Load => self.timeline.load(snapshot)?,
            ApplyKind::Seek => self.timeline.seek_confirmed(snapshot)?,
            ApplyKind::Append => self.timeline.append_confirmed(snapshot)?,
        };
        self.last_applied_seq = seq;
        self.notice = None;
        if change.plies_changed {
            self.series = self.projector.project(self.timeline.snapshot());
        }
        if change.stats_changed {
            self.heatmap = self.projector.heatmap(self.timeline.snapshot());
        }
        self.emit(EventPayload::SnapshotApplied {
            seq,
            view: self.timeline.view(),
            len: self.timeline.len(),
        });
        Ok(true)
    }

    fn issue(&mut self, call: GatewayCall) -> Effect {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(seq, call);
        debug!(seq, %call, "issuing request");
        Effect::Issue(Request { seq, call })
    }

    fn emit(&mut self, payload: EventPayload) {
        self.events.push(SessionEvent::new(payload));
    }

    fn goto_in_flight(&self) -> bool {
        self.pending
            .values()
            .any(|call| matches!(call, GatewayCall::Goto(_)))
    }

    /// The view navigation is heading to: a parked goto, else the newest
    /// goto in flight, else the confirmed view.
    fn navigation_target(&self) -> u32 {
        self.queued_goto
            .or_else(|| {
                self.pending.values().rev().find_map(|call| match call {
                    GatewayCall::Goto(view) => Some(*view),
                    _ => None,
                })
            })
            .unwrap_or_else(|| self.timeline.view())
    }

    /// The move currently waiting on the backend, if any.
    pub fn pending_move(&self) -> Option<UciMove> {
        self.pending.values().find_map(|call| match call {
            GatewayCall::SubmitMove(mv) => Some(*mv),
            _ => None,
        })
    }
}
