use std::{sync::Arc, time::Duration};

use qdisc_common::Clock;
use qdisc_packet::Packet;

mod control;
pub use control::MarkingState;

use crate::{BoundedSubQueue, QdiscError, QdiscStats, QueueDisc, QueueLimit, Stamped};

/// Default sojourn time above which a single packet is marked.
const DEFAULT_INSTANT_MARKING_THRESHOLD: Duration = Duration::from_micros(150);
/// Default interval of the persistent marking control law.
const DEFAULT_PERSISTENT_MARKING_INTERVAL: Duration = Duration::from_micros(200);
/// Default sojourn target of the persistent marking control law.
const DEFAULT_PERSISTENT_MARKING_TARGET: Duration = Duration::from_micros(10);

/// Options for a [`CongestionMarker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerOptions {
    /// Admission limit of the internal queue.
    pub(crate) limit: QueueLimit,
    /// Packets whose sojourn time exceeds this are marked, regardless of history.
    pub(crate) instant_marking_threshold: Duration,
    /// How long the sojourn time must stay above target before persistent marking starts,
    /// and the base spacing between persistent marks.
    pub(crate) persistent_marking_interval: Duration,
    /// Sojourn time considered acceptable on a sustained basis.
    pub(crate) persistent_marking_target: Duration,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            limit: QueueLimit::default(),
            instant_marking_threshold: DEFAULT_INSTANT_MARKING_THRESHOLD,
            persistent_marking_interval: DEFAULT_PERSISTENT_MARKING_INTERVAL,
            persistent_marking_target: DEFAULT_PERSISTENT_MARKING_TARGET,
        }
    }
}

impl MarkerOptions {
    /// Sets the admission limit of the internal queue.
    pub fn limit(mut self, limit: QueueLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the sojourn time above which any single packet is marked.
    pub fn instant_marking_threshold(mut self, threshold: Duration) -> Self {
        self.instant_marking_threshold = threshold;
        self
    }

    /// Sets the interval of the persistent marking control law.
    pub fn persistent_marking_interval(mut self, interval: Duration) -> Self {
        self.persistent_marking_interval = interval;
        self
    }

    /// Sets the sojourn target of the persistent marking control law.
    pub fn persistent_marking_target(mut self, target: Duration) -> Self {
        self.persistent_marking_target = target;
        self
    }
}

/// Single-queue discipline that signals congestion with ECN marks instead of drops.
///
/// Every admitted packet is stamped with its arrival time. On dequeue, the packet's sojourn
/// time drives two independent marking conditions:
///
/// - **Instantaneous**: the sojourn time exceeds the instantaneous threshold.
/// - **Persistent**: the sojourn time has stayed at or above the persistent target for a
///   whole interval, after which marks are spaced out following a CoDel-style
///   `interval / sqrt(count)` control law (see [`MarkingState`]).
///
/// Marking is best effort. Only ECT(1) packets can be marked; any other packet is forwarded
/// unmarked. Packets are only ever dropped by admission control.
pub struct CongestionMarker {
    queue: BoundedSubQueue<Stamped>,
    options: MarkerOptions,
    state: MarkingState,
    clock: Arc<dyn Clock>,
    stats: QdiscStats,
}

impl std::fmt::Debug for CongestionMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CongestionMarker")
            .field("backlog", &self.queue.len())
            .field("options", &self.options)
            .field("state", &self.state)
            .finish()
    }
}

impl CongestionMarker {
    /// Creates a marker reading sojourn times from `clock`.
    pub fn new(clock: Arc<dyn Clock>, options: MarkerOptions) -> Self {
        Self {
            queue: BoundedSubQueue::new(options.limit),
            options,
            state: MarkingState::default(),
            clock,
            stats: QdiscStats::default(),
        }
    }

    /// The options the marker was created with.
    #[inline]
    pub fn options(&self) -> &MarkerOptions {
        &self.options
    }

    /// State of the persistent marking control law.
    #[inline]
    pub fn marking_state(&self) -> &MarkingState {
        &self.state
    }

    /// Applies a congestion mark, if the packet allows it.
    fn mark(&self, packet: &mut Packet) {
        match packet.mark_ce() {
            Ok(()) => self.stats.increment_marked(),
            Err(e) => {
                self.stats.increment_mark_failures();
                tracing::warn!(uid = packet.uid(), "Cannot mark packet: {e}");
            }
        }
    }
}

impl QueueDisc for CongestionMarker {
    fn kind(&self) -> &'static str {
        "marker"
    }

    fn enqueue(&mut self, packet: Packet) -> Result<(), QdiscError> {
        let now = self.clock.now();

        if let Err(rejected) = self.queue.enqueue(Stamped::new(packet, now)) {
            tracing::trace!(
                uid = rejected.packet().uid(),
                backlog = self.queue.len(),
                bytes = self.queue.byte_len(),
                "queue full, dropping"
            );
            self.stats.increment_dropped_overlimit();
            return Err(self.queue.limit().exceeded());
        }

        self.stats.increment_enqueued();
        Ok(())
    }

    fn dequeue(&mut self) -> Option<Packet> {
        let stamped = self.queue.dequeue()?;

        let now = self.clock.now();
        let sojourn = stamped.sojourn(now);
        let (mut packet, _) = stamped.into_parts();

        let instant = sojourn > self.options.instant_marking_threshold;
        let persistent = self.state.on_dequeue(
            sojourn,
            now,
            self.options.persistent_marking_target,
            self.options.persistent_marking_interval,
        );

        tracing::trace!(
            uid = packet.uid(),
            ?sojourn,
            instant,
            persistent,
            count = self.state.mark_count(),
            backlog = self.queue.len(),
            "dequeue"
        );

        if instant {
            self.stats.increment_instant_marks();
        }
        if persistent {
            self.stats.increment_persistent_marks();
        }
        if instant || persistent {
            self.mark(&mut packet);
        }

        self.stats.increment_dequeued(packet.len());
        Some(packet)
    }

    fn peek(&self) -> Option<Packet> {
        self.queue.peek().map(|stamped| stamped.packet().clone())
    }

    fn peek_len(&self) -> Option<usize> {
        self.queue.peek().map(|stamped| stamped.packet().len())
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn byte_len(&self) -> usize {
        self.queue.byte_len()
    }

    fn check_config(&self) -> Result<(), QdiscError> {
        self.options.limit.validate()?;

        if self.options.persistent_marking_interval.is_zero() {
            return Err(QdiscError::InvalidConfig(
                "persistent marking interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    fn initialize_params(&mut self) {
        self.state.reset();
        tracing::debug!(options = ?self.options, "marker initialized");
    }

    fn stats(&self) -> &QdiscStats {
        &self.stats
    }
}
