use std::{collections::BinaryHeap, time::Duration};

use parking_lot::Mutex;
use qdisc_common::{Callback, Clock, Scheduler};

use crate::event::Event;

#[derive(Default)]
struct State {
    now: Duration,
    seq: u64,
    events: BinaryHeap<Event<Duration>>,
    executed: u64,
}

/// A single-threaded discrete-event loop with a logical clock.
///
/// Time only moves when events are executed (or when explicitly advanced), so tests can
/// reason about exact sojourn times. Events scheduled for the same instant run in the
/// order they were scheduled, and callbacks may schedule further events.
#[derive(Default)]
pub struct Simulator {
    state: Mutex<State>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Simulator")
            .field("now", &state.now)
            .field("pending", &state.events.len())
            .field("executed", &state.executed)
            .finish()
    }
}

impl Simulator {
    /// Creates a simulator at time zero with no pending events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `callback` at the absolute time `at`. Times in the past are clamped to
    /// the current time.
    pub fn schedule_at(&self, at: Duration, callback: Callback) {
        let mut state = self.state.lock();
        let at = at.max(state.now);
        let seq = state.seq;
        state.seq += 1;
        state.events.push(Event { at, seq, callback });
    }

    /// Number of events not yet executed.
    pub fn pending(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Number of events executed so far.
    pub fn executed(&self) -> u64 {
        self.state.lock().executed
    }

    /// Time of the next pending event, if any.
    pub fn next_event_time(&self) -> Option<Duration> {
        self.state.lock().events.peek().map(|event| event.at)
    }

    /// Executes the next pending event, moving the clock to its deadline. Returns `false`
    /// if there was nothing to execute.
    pub fn step(&self) -> bool {
        self.step_until(Duration::MAX)
    }

    /// Runs events until none are left. Returns the number of events executed.
    pub fn run(&self) -> u64 {
        let before = self.executed();
        while self.step() {}
        self.executed() - before
    }

    /// Runs every event due at or before `deadline`, then moves the clock to `deadline`.
    pub fn run_until(&self, deadline: Duration) -> u64 {
        let before = self.executed();
        while self.step_until(deadline) {}

        let mut state = self.state.lock();
        state.now = state.now.max(deadline);
        state.executed - before
    }

    /// Runs every event due within `duration` from now, then moves the clock forward by
    /// `duration`.
    pub fn advance(&self, duration: Duration) -> u64 {
        let deadline = self.now().saturating_add(duration);
        self.run_until(deadline)
    }

    fn step_until(&self, deadline: Duration) -> bool {
        let event = {
            let mut state = self.state.lock();
            match state.events.peek() {
                Some(event) if event.at <= deadline => {}
                _ => return false,
            }

            let Some(event) = state.events.pop() else { return false };
            state.now = event.at;
            state.executed += 1;
            event
        };

        tracing::trace!(at = ?event.at, seq = event.seq, "executing event");
        // The lock is released here so that the callback can schedule more events.
        (event.callback)();
        true
    }
}

impl Clock for Simulator {
    #[inline]
    fn now(&self) -> Duration {
        self.state.lock().now
    }
}

impl Scheduler for Simulator {
    fn schedule_after(&self, delay: Duration, callback: Callback) {
        let at = self.now().saturating_add(delay);
        self.schedule_at(at, callback);
    }
}
