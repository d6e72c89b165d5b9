use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics for a queueing discipline. Shared with deferred callbacks, hence atomic.
#[derive(Debug, Default)]
pub struct QdiscStats {
    /// Packets admitted
    enqueued: AtomicUsize,
    /// Packets handed out by dequeue
    dequeued: AtomicUsize,
    /// Bytes handed out by dequeue
    bytes_dequeued: AtomicUsize,
    /// Packets dropped because they matched no class
    dropped_unclassified: AtomicUsize,
    /// Packets dropped by admission control
    dropped_overlimit: AtomicUsize,
    /// Packets that met the instantaneous marking condition
    instant_marks: AtomicUsize,
    /// Packets that met the persistent marking condition
    persistent_marks: AtomicUsize,
    /// Packets whose ECN field was rewritten to CE
    marked: AtomicUsize,
    /// Packets that should have been marked but were not ECT(1)
    mark_failures: AtomicUsize,
    /// Packets moved from a delay class into the output queue
    fetched: AtomicUsize,
    /// Fetches that found their class queue empty
    fetch_failures: AtomicUsize,
}

impl QdiscStats {
    #[inline]
    pub(crate) fn increment_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_dequeued(&self, bytes: usize) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        self.bytes_dequeued.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_dropped_unclassified(&self) {
        self.dropped_unclassified.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_dropped_overlimit(&self) {
        self.dropped_overlimit.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_instant_marks(&self) {
        self.instant_marks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_persistent_marks(&self) {
        self.persistent_marks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_marked(&self) {
        self.marked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_mark_failures(&self) {
        self.mark_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_fetch_failures(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Packets admitted.
    #[inline]
    pub fn enqueued(&self) -> usize {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Packets handed out by dequeue.
    #[inline]
    pub fn dequeued(&self) -> usize {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Bytes handed out by dequeue.
    #[inline]
    pub fn bytes_dequeued(&self) -> usize {
        self.bytes_dequeued.load(Ordering::Relaxed)
    }

    /// Packets dropped because they matched no class.
    #[inline]
    pub fn dropped_unclassified(&self) -> usize {
        self.dropped_unclassified.load(Ordering::Relaxed)
    }

    /// Packets dropped by admission control.
    #[inline]
    pub fn dropped_overlimit(&self) -> usize {
        self.dropped_overlimit.load(Ordering::Relaxed)
    }

    /// Total number of dropped packets.
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped_unclassified() + self.dropped_overlimit()
    }

    /// Packets that met the instantaneous marking condition.
    #[inline]
    pub fn instant_marks(&self) -> usize {
        self.instant_marks.load(Ordering::Relaxed)
    }

    /// Packets that met the persistent marking condition.
    #[inline]
    pub fn persistent_marks(&self) -> usize {
        self.persistent_marks.load(Ordering::Relaxed)
    }

    /// Packets rewritten to CE.
    #[inline]
    pub fn marked(&self) -> usize {
        self.marked.load(Ordering::Relaxed)
    }

    /// Packets that should have been marked but could not be.
    #[inline]
    pub fn mark_failures(&self) -> usize {
        self.mark_failures.load(Ordering::Relaxed)
    }

    /// Packets moved from a delay class into the output queue.
    #[inline]
    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::Relaxed)
    }

    /// Fetches that found their class queue empty.
    #[inline]
    pub fn fetch_failures(&self) -> usize {
        self.fetch_failures.load(Ordering::Relaxed)
    }
}
