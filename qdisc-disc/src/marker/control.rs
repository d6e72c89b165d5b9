//! Persistent marking control law.
//!
//! The law has two states. While *inactive*, it watches for the sojourn time to stay at or
//! above the target for a whole interval. Once that happens it becomes *active* and marks
//! right away, then keeps marking at `interval / sqrt(count)` spacing for as long as the
//! sojourn stays above target. Every (state, condition) pair has a defined successor:
//!
//! | state    | ok to mark | deadline passed | next state | mark |
//! |----------|------------|-----------------|------------|------|
//! | inactive | no         | -               | inactive   | no   |
//! | inactive | yes        | -               | active     | yes  |
//! | active   | no         | -               | inactive   | no   |
//! | active   | yes        | no              | active     | no   |
//! | active   | yes        | yes             | active     | yes  |

use std::time::Duration;

use qdisc_common::inv_sqrt_scale;

/// Mutable state of the persistent marking control law.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkingState {
    /// Whether the law is in the active (marking) state.
    marking: bool,
    /// Marks issued since the law last became active.
    mark_count: u32,
    /// When the next mark is due while active.
    mark_next: Duration,
    /// When the sojourn time will have been above target for a full interval, if it is
    /// currently above target at all.
    first_above_time: Option<Duration>,
}

impl MarkingState {
    /// Whether the law is active.
    #[inline]
    pub fn marking(&self) -> bool {
        self.marking
    }

    /// Marks issued since the law last became active.
    #[inline]
    pub fn mark_count(&self) -> u32 {
        self.mark_count
    }

    /// When the next mark is due while active.
    #[inline]
    pub fn mark_next(&self) -> Duration {
        self.mark_next
    }

    /// When the current above-target window closes, if one is open.
    #[inline]
    pub fn first_above_time(&self) -> Option<Duration> {
        self.first_above_time
    }

    /// Returns to the initial, inactive state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether the sojourn time has been above `target` for at least `interval`.
    fn ok_to_mark(
        &mut self,
        sojourn: Duration,
        now: Duration,
        target: Duration,
        interval: Duration,
    ) -> bool {
        if sojourn < target {
            self.first_above_time = None;
            return false;
        }

        match self.first_above_time {
            None => {
                self.first_above_time = Some(now.saturating_add(interval));
                false
            }
            Some(first_above_time) => now >= first_above_time,
        }
    }

    /// Feeds the sojourn time of a departing packet through the law. Returns `true` if the
    /// packet should be marked.
    pub(crate) fn on_dequeue(
        &mut self,
        sojourn: Duration,
        now: Duration,
        target: Duration,
        interval: Duration,
    ) -> bool {
        let ok_to_mark = self.ok_to_mark(sojourn, now, target, interval);

        if !self.marking {
            if ok_to_mark {
                self.marking = true;
                self.mark_count = 1;
                self.mark_next = now.saturating_add(interval);
                tracing::trace!(?sojourn, ?now, "persistent marking on");
            }
            return ok_to_mark;
        }

        if !ok_to_mark {
            self.marking = false;
            tracing::trace!(?sojourn, ?now, count = self.mark_count, "persistent marking off");
            return false;
        }

        if now < self.mark_next {
            return false;
        }

        self.mark_count = self.mark_count.saturating_add(1);
        self.mark_next = now.saturating_add(inv_sqrt_scale(interval, self.mark_count));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Duration = Duration::from_micros(10);
    const INTERVAL: Duration = Duration::from_micros(200);

    fn us(micros: u64) -> Duration {
        Duration::from_micros(micros)
    }

    #[test]
    fn activates_after_one_interval_above_target() {
        let mut state = MarkingState::default();

        assert!(!state.on_dequeue(us(50), us(100), TARGET, INTERVAL));
        assert_eq!(state.first_above_time(), Some(us(300)));

        assert!(!state.on_dequeue(us(50), us(299), TARGET, INTERVAL));
        assert!(!state.marking());

        assert!(state.on_dequeue(us(50), us(300), TARGET, INTERVAL));
        assert!(state.marking());
        assert_eq!(state.mark_count(), 1);
        assert_eq!(state.mark_next(), us(500));
    }

    #[test]
    fn below_target_resets_first_above() {
        let mut state = MarkingState::default();

        state.on_dequeue(us(50), us(0), TARGET, INTERVAL);
        assert!(state.first_above_time().is_some());

        state.on_dequeue(us(5), us(10), TARGET, INTERVAL);
        assert_eq!(state.first_above_time(), None);

        // The window starts over
        state.on_dequeue(us(50), us(20), TARGET, INTERVAL);
        assert_eq!(state.first_above_time(), Some(us(220)));
    }

    #[test]
    fn sojourn_equal_to_target_counts_as_above() {
        let mut state = MarkingState::default();

        state.on_dequeue(TARGET, us(0), TARGET, INTERVAL);
        assert_eq!(state.first_above_time(), Some(INTERVAL));
    }

    #[test]
    fn active_marks_follow_control_law() {
        let mut state = MarkingState::default();
        state.on_dequeue(us(50), us(0), TARGET, INTERVAL);
        assert!(state.on_dequeue(us(50), us(200), TARGET, INTERVAL));

        // Not due yet
        assert!(!state.on_dequeue(us(50), us(399), TARGET, INTERVAL));
        assert!(state.marking());

        assert!(state.on_dequeue(us(50), us(400), TARGET, INTERVAL));
        assert_eq!(state.mark_count(), 2);
        assert_eq!(state.mark_next(), us(400) + INTERVAL.div_f64(2f64.sqrt()));
    }

    #[test]
    fn deactivates_below_target() {
        let mut state = MarkingState::default();
        state.on_dequeue(us(50), us(0), TARGET, INTERVAL);
        state.on_dequeue(us(50), us(200), TARGET, INTERVAL);
        assert!(state.marking());

        assert!(!state.on_dequeue(us(1), us(250), TARGET, INTERVAL));
        assert!(!state.marking());
        assert_eq!(state.first_above_time(), None);

        // Reactivation needs a fresh interval above target and restarts the count
        assert!(!state.on_dequeue(us(50), us(260), TARGET, INTERVAL));
        assert!(state.on_dequeue(us(50), us(460), TARGET, INTERVAL));
        assert_eq!(state.mark_count(), 1);
    }

    #[test]
    fn deadlines_saturate_at_max_interval() {
        let mut state = MarkingState::default();

        assert!(!state.on_dequeue(us(50), us(100), TARGET, Duration::MAX));
        assert_eq!(state.first_above_time(), Some(Duration::MAX));

        // The window never closes
        assert!(!state.on_dequeue(us(50), us(1_000_000), TARGET, Duration::MAX));
        assert!(!state.marking());
    }

    #[test]
    fn mark_deadline_saturates_when_active() {
        let mut state = MarkingState::default();
        let late = Duration::MAX - us(1);

        state.on_dequeue(us(50), us(0), TARGET, late);
        assert!(state.on_dequeue(us(50), late, TARGET, late));
        assert_eq!(state.mark_next(), Duration::MAX);

        assert!(state.on_dequeue(us(50), Duration::MAX, TARGET, late));
        assert_eq!(state.mark_count(), 2);
        assert_eq!(state.mark_next(), Duration::MAX);
    }
}
