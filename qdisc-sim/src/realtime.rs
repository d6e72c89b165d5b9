use std::{
    collections::BinaryHeap,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use qdisc_common::{Callback, Clock, Scheduler};
use tokio::{
    runtime::{Handle, TryCurrentError},
    sync::mpsc,
    time::{sleep_until, Instant},
};

use crate::event::Event;

/// A [`Scheduler`] backed by the tokio timer.
///
/// All callbacks are executed, one at a time and in deadline order, by a single driver
/// task. Callbacks with equal deadlines run in the order they were scheduled. When the
/// scheduler is dropped, the driver runs the callbacks that are still pending at their
/// deadlines and then exits.
///
/// Time is measured from the creation of the scheduler, using [`tokio::time::Instant`], so
/// it follows the paused clock in `#[tokio::test(start_paused = true)]` tests. Deadlines are
/// subject to the tokio timer resolution of one millisecond.
#[derive(Debug)]
pub struct TokioScheduler {
    start: Instant,
    seq: AtomicU64,
    to_driver: mpsc::UnboundedSender<Event<Instant>>,
}

impl TokioScheduler {
    /// Creates a scheduler whose driver task runs on the given runtime.
    pub fn new(handle: &Handle) -> Self {
        let (to_driver, from_scheduler) = mpsc::unbounded_channel();
        handle.spawn(drive(from_scheduler));

        Self { start: Instant::now(), seq: AtomicU64::new(0), to_driver }
    }

    /// Creates a scheduler on the runtime of the current context.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(&Handle::try_current()?))
    }
}

impl Clock for TokioScheduler {
    #[inline]
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, callback: Callback) {
        let at = Instant::now() + delay;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);

        if self.to_driver.send(Event { at, seq, callback }).is_err() {
            tracing::error!(?delay, "Scheduler driver is gone, dropping callback");
        }
    }
}

/// The driver task: owns the timer heap and fires callbacks as their deadlines pass.
async fn drive(mut from_scheduler: mpsc::UnboundedReceiver<Event<Instant>>) {
    let mut events = BinaryHeap::new();
    let mut open = true;

    loop {
        let next = events.peek().map(|event: &Event<Instant>| event.at);

        if !open && next.is_none() {
            break;
        }

        tokio::select! {
            biased;

            msg = from_scheduler.recv(), if open => match msg {
                Some(event) => events.push(event),
                None => {
                    tracing::debug!(pending = events.len(), "Scheduler dropped, draining");
                    open = false;
                }
            },
            _ = sleep_until(next.unwrap_or_else(Instant::now)), if next.is_some() => {
                let now = Instant::now();
                while events.peek().is_some_and(|event| event.at <= now) {
                    if let Some(event) = events.pop() {
                        (event.callback)();
                    }
                }
            }
        }
    }
}
