use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::trace;

/// Admits at most one poll at a time; overlapping ticks are dropped rather
/// than queued.
#[derive(Debug, Clone, Default)]
pub struct PollGate {
    busy: Arc<AtomicBool>,
}

/// Held for the duration of one poll; releases the gate on drop.
#[derive(Debug)]
pub struct PollTicket {
    busy: Arc<AtomicBool>,
}

impl PollGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self) -> Option<PollTicket> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PollTicket {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for PollTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Runs `poll` every `period` on its own task, skipping ticks while the
/// previous poll is still running.
pub fn spawn_poller<F, Fut>(period: Duration, gate: PollGate, mut poll: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(ticket) = gate.try_begin() else {
                trace!("poll skipped, previous still running");
                continue;
            };
            let fut = poll();
            tokio::spawn(async move {
                fut.await;
                drop(ticket);
            });
        }
    })
}
