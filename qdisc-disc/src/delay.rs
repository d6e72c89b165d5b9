use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use qdisc_common::Scheduler;
use qdisc_packet::{ClassId, Classifier, Packet};
use rustc_hash::FxHashMap;

use crate::{BoundedSubQueue, QdiscError, QdiscStats, QueueDisc, QueueLimit};

struct DelayClass {
    delay: Duration,
    queue: BoundedSubQueue<Packet>,
}

/// State shared between the emulator and its pending fetch callbacks.
struct Shared {
    classes: FxHashMap<ClassId, DelayClass>,
    /// Packets whose delay has elapsed, ready to be dequeued.
    output: BoundedSubQueue<Packet>,
    /// Bumped on flush. Fetches scheduled under an older generation are stale.
    generation: u64,
}

impl Shared {
    /// Moves the oldest packet of class `id` into the output queue.
    fn fetch_to_output(&mut self, id: ClassId, generation: u64, stats: &QdiscStats) {
        if generation != self.generation {
            tracing::trace!(class = id, generation, "stale fetch, ignoring");
            return;
        }

        let Self { classes, output, .. } = self;

        let Some(packet) = classes.get_mut(&id).and_then(|class| class.queue.dequeue()) else {
            tracing::error!(class = id, "Fetch found no packet in class queue");
            stats.increment_fetch_failures();
            return;
        };

        if let Err(packet) = output.enqueue(packet) {
            tracing::trace!(class = id, uid = packet.uid(), "output queue full, dropping");
            stats.increment_dropped_overlimit();
            return;
        }

        stats.increment_fetched();
    }
}

/// Emulates a fixed propagation delay per traffic class.
///
/// An admitted packet waits in its class queue until the class delay has elapsed, after
/// which a callback on the [`Scheduler`] moves it to the shared output queue. Only the
/// output queue is visible to [`dequeue`](QueueDisc::dequeue) and [`peek`](QueueDisc::peek).
///
/// Since the delay of a class is constant and the scheduler fires callbacks in deadline
/// order, packets of one class leave in the order they arrived. Packets of different
/// classes interleave according to their delays.
///
/// Pending callbacks only hold a weak reference to the emulator's state, so they do nothing
/// if the emulator was dropped or [flushed](DelayEmulator::flush) in the meantime.
pub struct DelayEmulator {
    shared: Arc<Mutex<Shared>>,
    scheduler: Arc<dyn Scheduler>,
    classifier: Arc<dyn Classifier>,
    stats: Arc<QdiscStats>,
}

impl std::fmt::Debug for DelayEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("DelayEmulator")
            .field("classes", &shared.classes.len())
            .field("output", &shared.output.len())
            .field("generation", &shared.generation)
            .finish()
    }
}

impl DelayEmulator {
    /// Creates an emulator without classes, whose output queue is bounded by `output`.
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        classifier: Arc<dyn Classifier>,
        output: QueueLimit,
    ) -> Self {
        let shared = Shared {
            classes: FxHashMap::default(),
            output: BoundedSubQueue::new(output),
            generation: 0,
        };

        Self {
            shared: Arc::new(Mutex::new(shared)),
            scheduler,
            classifier,
            stats: Arc::new(QdiscStats::default()),
        }
    }

    /// Registers a class that delays its packets by `delay`, holding at most `limit` of
    /// them in flight.
    pub fn add_class(
        &mut self,
        id: ClassId,
        delay: Duration,
        limit: QueueLimit,
    ) -> Result<(), QdiscError> {
        let mut shared = self.shared.lock();
        if shared.classes.contains_key(&id) {
            return Err(QdiscError::DuplicateClass(id));
        }

        tracing::debug!(class = id, ?delay, ?limit, "added class");
        shared.classes.insert(id, DelayClass { delay, queue: BoundedSubQueue::new(limit) });
        Ok(())
    }

    /// The delay of the given class.
    pub fn delay(&self, id: ClassId) -> Option<Duration> {
        self.shared.lock().classes.get(&id).map(|class| class.delay)
    }

    /// Number of packets whose delay has elapsed.
    pub fn output_len(&self) -> usize {
        self.shared.lock().output.len()
    }

    /// Number of packets still being delayed.
    pub fn in_flight(&self) -> usize {
        self.shared.lock().classes.values().map(|class| class.queue.len()).sum()
    }

    /// Discards every queued packet, delayed or not, and invalidates pending fetches.
    /// Returns the number of packets discarded.
    pub fn flush(&self) -> usize {
        let mut shared = self.shared.lock();
        shared.generation += 1;

        let mut discarded = shared.output.clear();
        for class in shared.classes.values_mut() {
            discarded += class.queue.clear();
        }

        tracing::debug!(discarded, generation = shared.generation, "flushed");
        discarded
    }
}

impl QueueDisc for DelayEmulator {
    fn kind(&self) -> &'static str {
        "delay"
    }

    fn enqueue(&mut self, packet: Packet) -> Result<(), QdiscError> {
        let Some(id) = self.classifier.classify(&packet) else {
            tracing::warn!(uid = packet.uid(), "Packet could not be classified, dropping");
            self.stats.increment_dropped_unclassified();
            return Err(QdiscError::Unclassified);
        };

        let (delay, generation) = {
            let mut shared = self.shared.lock();
            let generation = shared.generation;

            let Some(class) = shared.classes.get_mut(&id) else {
                tracing::warn!(uid = packet.uid(), class = id, "No such class, dropping");
                self.stats.increment_dropped_unclassified();
                return Err(QdiscError::UnknownClass(id));
            };

            if let Err(packet) = class.queue.enqueue(packet) {
                tracing::trace!(class = id, uid = packet.uid(), "class queue full, dropping");
                self.stats.increment_dropped_overlimit();
                return Err(class.queue.limit().exceeded());
            }

            (class.delay, generation)
        };

        self.stats.increment_enqueued();
        tracing::trace!(class = id, ?delay, now = ?self.scheduler.now(), "scheduling fetch");

        let shared = Arc::downgrade(&self.shared);
        let stats = Arc::clone(&self.stats);
        self.scheduler
            .schedule_after(delay, Box::new(move || fetch(shared, id, generation, stats)));

        Ok(())
    }

    fn dequeue(&mut self) -> Option<Packet> {
        let packet = self.shared.lock().output.dequeue()?;
        self.stats.increment_dequeued(packet.len());
        Some(packet)
    }

    fn peek(&self) -> Option<Packet> {
        self.shared.lock().output.peek().cloned()
    }

    fn peek_len(&self) -> Option<usize> {
        self.shared.lock().output.peek().map(Packet::len)
    }

    /// Number of packets held, including those still being delayed.
    fn len(&self) -> usize {
        let shared = self.shared.lock();
        let delayed: usize = shared.classes.values().map(|class| class.queue.len()).sum();
        shared.output.len() + delayed
    }

    fn byte_len(&self) -> usize {
        let shared = self.shared.lock();
        let delayed: usize = shared.classes.values().map(|class| class.queue.byte_len()).sum();
        shared.output.byte_len() + delayed
    }

    /// Delayed packets are invisible to `peek`.
    fn schedulable(&self) -> bool {
        false
    }

    fn check_config(&self) -> Result<(), QdiscError> {
        let shared = self.shared.lock();
        if shared.classes.is_empty() {
            return Err(QdiscError::InvalidConfig("no classes configured".to_string()));
        }

        shared.output.limit().validate()?;
        for class in shared.classes.values() {
            class.queue.limit().validate()?;
        }

        Ok(())
    }

    fn initialize_params(&mut self) {
        let shared = self.shared.lock();
        for (id, class) in shared.classes.iter() {
            tracing::debug!(class = id, delay = ?class.delay, "class initialized");
        }
    }

    fn stats(&self) -> &QdiscStats {
        &self.stats
    }
}

/// Body of a scheduled fetch. No-op if the emulator is gone.
fn fetch(shared: Weak<Mutex<Shared>>, id: ClassId, generation: u64, stats: Arc<QdiscStats>) {
    let Some(shared) = shared.upgrade() else {
        tracing::trace!(class = id, "emulator dropped, ignoring fetch");
        return;
    };

    shared.lock().fetch_to_output(id, generation, &stats);
}
