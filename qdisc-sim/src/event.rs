use std::cmp::Ordering;

use qdisc_common::Callback;

/// A callback waiting in a timer queue.
///
/// Events order by deadline first and insertion sequence second, reversed, so that a
/// [`BinaryHeap`](std::collections::BinaryHeap) pops the earliest (and, for equal
/// deadlines, the first scheduled) event.
pub(crate) struct Event<T> {
    pub(crate) at: T,
    pub(crate) seq: u64,
    pub(crate) callback: Callback,
}

impl<T: Ord> PartialEq for Event<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Ord> Eq for Event<T> {}

impl<T: Ord> PartialOrd for Event<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for Event<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.at.cmp(&self.at).then_with(|| other.seq.cmp(&self.seq))
    }
}
