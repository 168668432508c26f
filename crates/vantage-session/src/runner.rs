use std::{future, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{info, warn};
use vantage_network::{dispatch, EventBus, SyncGateway};
use vantage_ops::EventLog;
use vantage_types::{
    events::{EventPayload, SessionEvent},
    Result,
};

use crate::{
    input::{Completion, SessionInput},
    render::Renderer,
    session::{Effect, Request, Session},
};

/// Drives a [`Session`] against a gateway: user input and request
/// completions are fed in one at a time, gateway calls run on spawned
/// tasks and every step ends with a redraw.
pub struct SessionRunner<G, R>
where
    G: SyncGateway + 'static,
    R: Renderer,
{
    session: Session,
    gateway: Arc<G>,
    renderer: R,
    bus: EventBus,
    log: EventLog,
    refresh: Option<Duration>,
}

impl<G, R> SessionRunner<G, R>
where
    G: SyncGateway + 'static,
    R: Renderer,
{
    pub fn new(session: Session, gateway: G, renderer: R, bus: EventBus, log: EventLog) -> Self {
        Self {
            session,
            gateway: Arc::new(gateway),
            renderer,
            bus,
            log,
            refresh: None,
        }
    }

    /// Polls `/state` every `period` while nothing else is outstanding.
    pub fn with_refresh(mut self, period: Duration) -> Self {
        self.refresh = Some(period);
        self
    }

    /// Runs until the input channel closes and returns the final session.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<SessionInput>) -> Result<Session> {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let mut ticker = self.refresh.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        self.publish(SessionEvent::new(EventPayload::Started {
            backend: self.gateway.endpoint(),
        }))
        .await;
        info!(backend = %self.gateway.endpoint(), "session started");
        self.step(SessionInput::Boot, &done_tx).await?;

        loop {
            let input = tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
                Some(completion) = done_rx.recv() => SessionInput::Completed(completion),
                _ = next_tick(&mut ticker) => SessionInput::Refresh,
            };
            self.step(input, &done_tx).await?;
        }

        self.publish(SessionEvent::new(EventPayload::Stopped)).await;
        self.log.log_summary().await;
        info!("session stopped");
        Ok(self.session)
    }

    async fn step(
        &mut self,
        input: SessionInput,
        done: &mpsc::UnboundedSender<Completion>,
    ) -> Result<()> {
        match self.session.handle(input) {
            Ok(effects) => {
                for Effect::Issue(request) in effects {
                    self.spawn_request(request, done.clone());
                }
            }
            Err(err) => warn!(%err, "input not applied"),
        }
        for event in self.session.drain_events() {
            self.publish(event).await;
        }
        self.renderer.render(&self.session.frame())
    }

    fn spawn_request(&self, request: Request, done: mpsc::UnboundedSender<Completion>) {
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            let result = dispatch(gateway.as_ref(), request.call).await;
            let completion = Completion {
                seq: request.seq,
                call: request.call,
                result,
            };
            if done.send(completion).is_err() {
                warn!(seq = request.seq, "session gone before request finished");
            }
        });
    }

    async fn publish(&self, event: SessionEvent) {
        self.log.record(event.clone()).await;
        self.bus.publish(event);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => future::pending::<()>().await,
    }
}
