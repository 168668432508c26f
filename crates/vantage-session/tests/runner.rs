use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{sync::mpsc, time::timeout};
use vantage_network::{EventBus, InMemoryBackend, SyncGateway};
use vantage_ops::EventLog;
use vantage_rules::ShakmatyRules;
use vantage_session::{RenderFrame, Renderer, Session, SessionInput, SessionRunner};
use vantage_types::{
    board::{Color, Square, INITIAL_FEN},
    config::{SessionConfig, VantageConfig},
    events::EventPayload,
    Result,
};

const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
const AFTER_D4: &str = "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq - 0 1";

struct RecordingRenderer {
    frames: mpsc::UnboundedSender<RenderFrame>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, frame: &RenderFrame) -> Result<()> {
        let _ = self.frames.send(frame.clone());
        Ok(())
    }
}

fn sq(name: &str) -> Square {
    name.parse().unwrap()
}

fn session(auto_engine_reply: bool) -> Session {
    Session::new(
        Arc::new(ShakmatyRules::new()),
        SessionConfig {
            engine_side: Color::Black,
            auto_engine_reply,
            refresh_interval_ms: 0,
        },
        &VantageConfig::default().telemetry,
    )
}

async fn wait_for(
    frames: &mut mpsc::UnboundedReceiver<RenderFrame>,
    what: &str,
    accept: impl Fn(&RenderFrame) -> bool,
) -> RenderFrame {
    let found = timeout(Duration::from_secs(5), async {
        while let Some(frame) = frames.recv().await {
            if accept(&frame) {
                return Some(frame);
            }
        }
        None
    })
    .await;
    match found {
        Ok(Some(frame)) => frame,
        _ => panic!("no frame with {what}"),
    }
}

fn settled(frame: &RenderFrame) -> bool {
    !frame.selection.is_awaiting()
}

#[tokio::test]
async fn move_rewind_and_branch() {
    let backend = InMemoryBackend::new();
    let state = backend.clone();
    let (frame_tx, mut frames) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::channel(16);
    let runner = SessionRunner::new(
        session(false),
        backend,
        RecordingRenderer { frames: frame_tx },
        EventBus::new(64),
        EventLog::new(64),
    );
    let handle = tokio::spawn(runner.run(input_rx));

    input_tx.send(SessionInput::Click(sq("e2"))).await.unwrap();
    input_tx.send(SessionInput::Click(sq("e4"))).await.unwrap();
    let frame = wait_for(&mut frames, "e4 confirmed", |f| {
        settled(f) && f.len == 1 && f.view == 1
    })
    .await;
    assert_eq!(frame.fen, AFTER_E4);
    assert_eq!(frame.history.len(), 1);
    assert_eq!(frame.history[0].white.as_ref().map(|c| c.san.as_str()), Some("e4"));

    input_tx.send(SessionInput::Goto(0)).await.unwrap();
    let frame = wait_for(&mut frames, "rewound to start", |f| {
        settled(f) && f.view == 0
    })
    .await;
    assert_eq!(frame.fen, INITIAL_FEN);
    assert_eq!(frame.len, 1);

    input_tx.send(SessionInput::Click(sq("d2"))).await.unwrap();
    input_tx.send(SessionInput::Click(sq("d4"))).await.unwrap();
    let frame = wait_for(&mut frames, "d4 replaced e4", |f| {
        settled(f) && f.view == 1 && f.fen == AFTER_D4
    })
    .await;
    assert_eq!(frame.len, 1);

    let remote = state.get_state().await.unwrap();
    assert_eq!(remote.plies.len(), 1);
    assert_eq!(remote.plies[0].san, "d4");

    drop(input_tx);
    let session = handle.await.unwrap().unwrap();
    assert_eq!(session.timeline().len(), 1);
    assert_eq!(session.timeline().fen(), AFTER_D4);
}

#[tokio::test]
async fn events_reach_bus_and_log() {
    let bus = EventBus::new(64);
    let log = EventLog::new(64);
    let mut events = bus.subscribe();
    let (frame_tx, mut frames) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::channel(16);
    let runner = SessionRunner::new(
        session(true),
        InMemoryBackend::new(),
        RecordingRenderer { frames: frame_tx },
        bus,
        log.clone(),
    );
    let handle = tokio::spawn(runner.run(input_rx));

    input_tx.send(SessionInput::Click(sq("e2"))).await.unwrap();
    input_tx.send(SessionInput::Click(sq("e4"))).await.unwrap();
    let frame = wait_for(&mut frames, "engine reply", |f| settled(f) && f.len == 2).await;
    assert_eq!(frame.series.len(), 1);
    assert_eq!(frame.side_to_move, Some(Color::White));

    drop(input_tx);
    handle.await.unwrap().unwrap();

    let first = timeout(Duration::from_secs(1), events.next())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first.payload, EventPayload::Started { .. }));

    let recorded = log.snapshot().await;
    assert!(recorded
        .iter()
        .any(|e| matches!(e.payload, EventPayload::EngineRequested { .. })));
    assert_eq!(recorded.last().map(|e| e.payload.clone()), Some(EventPayload::Stopped));
}

#[tokio::test(start_paused = true)]
async fn refresh_polls_backend_state() {
    let backend = InMemoryBackend::new();
    let shared = backend.shared_state();
    let (frame_tx, mut frames) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::channel(16);
    let runner = SessionRunner::new(
        session(false),
        backend,
        RecordingRenderer { frames: frame_tx },
        EventBus::new(64),
        EventLog::new(64),
    )
    .with_refresh(Duration::from_millis(500));
    let handle = tokio::spawn(runner.run(input_rx));

    wait_for(&mut frames, "boot", |f| f.len == 0 && settled(f)).await;
    let reply = shared.lock().await.submit("g1f3");
    assert_eq!(reply.status, 200);

    let frame = wait_for(&mut frames, "polled move", |f| f.len == 1).await;
    assert_eq!(frame.view, 1);

    drop(input_tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn clicks_during_slow_rewind_keep_history() {
    let backend = InMemoryBackend::new().with_latency(Duration::from_millis(200));
    let remote = backend.clone();
    {
        let shared = backend.shared_state();
        let mut state = shared.lock().await;
        assert_eq!(state.submit("e2e4").status, 200);
        assert_eq!(state.submit("e7e5").status, 200);
    }
    let (frame_tx, mut frames) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::channel(16);
    let runner = SessionRunner::new(
        session(false),
        backend,
        RecordingRenderer { frames: frame_tx },
        EventBus::new(64),
        EventLog::new(64),
    );
    let handle = tokio::spawn(runner.run(input_rx));
    wait_for(&mut frames, "boot", |f| f.len == 2 && f.view == 2).await;

    input_tx.send(SessionInput::Goto(0)).await.unwrap();
    input_tx.send(SessionInput::Click(sq("g1"))).await.unwrap();
    input_tx.send(SessionInput::Click(sq("f3"))).await.unwrap();
    let frame = wait_for(&mut frames, "rewound", |f| settled(f) && f.view == 0).await;
    assert_eq!(frame.len, 2);
    assert_eq!(frame.fen, INITIAL_FEN);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let state = remote.get_state().await.unwrap();
    let sans: Vec<&str> = state.plies.iter().map(|p| p.san.as_str()).collect();
    assert_eq!(sans, ["e4", "e5"]);
    assert_eq!(state.view, 0);

    drop(input_tx);
    let session = handle.await.unwrap().unwrap();
    assert_eq!(session.timeline().len(), 2);
    assert!(session.pending_move().is_none());
}
