#![doc(issue_tracker_base_url = "https://github.com/chainbound/qdisc-rs/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use qdisc_packet::{ClassId, Packet};
use thiserror::Error;

mod delay;
mod dwrr;
mod factory;
mod fifo;
mod marker;
mod queue;
mod stats;

pub use delay::DelayEmulator;
pub use dwrr::{WeightedScheduler, DRR_DEFAULT_QUANTUM};
pub use factory::*;
pub use fifo::Fifo;
pub use marker::{CongestionMarker, MarkerOptions, MarkingState};
pub use queue::{BoundedSubQueue, QueueItem, Stamped};
pub use stats::QdiscStats;

/// Default packet limit of a queue, see [`QueueLimit::default`].
pub const DEFAULT_MAX_PACKETS: usize = 100;

/// Errors returned by queueing disciplines.
#[derive(Debug, Error)]
pub enum QdiscError {
    /// The classifier returned no class for the packet.
    #[error("Packet could not be classified")]
    Unclassified,
    /// The classifier returned a class that is not registered.
    #[error("No class registered for id {0}")]
    UnknownClass(ClassId),
    /// Admission control rejected the packet.
    #[error("Queue full: {mode:?} limit of {limit} reached")]
    CapacityExceeded {
        /// Unit of the limit that was hit.
        mode: QueueMode,
        /// Value of the limit that was hit.
        limit: usize,
    },
    /// A class with this id is already registered.
    #[error("Class {0} already exists")]
    DuplicateClass(ClassId),
    /// The configuration cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl QdiscError {
    /// Returns `true` if the packet was dropped by admission control.
    #[inline]
    pub fn is_overlimit(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    /// Returns `true` if the packet was dropped because it matched no class.
    #[inline]
    pub fn is_unclassified(&self) -> bool {
        matches!(self, Self::Unclassified | Self::UnknownClass(_))
    }
}

/// The unit in which a queue's capacity is accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Capacity is counted in bytes.
    #[default]
    Bytes,
    /// Capacity is counted in packets.
    Packets,
}

/// Admission limit of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimit {
    /// Which of the two limits below applies.
    pub mode: QueueMode,
    /// Maximum number of packets, enforced in [`QueueMode::Packets`].
    pub max_packets: usize,
    /// Maximum number of bytes, enforced in [`QueueMode::Bytes`].
    pub max_bytes: usize,
}

impl Default for QueueLimit {
    /// Byte mode, 100 packets or 100 full-sized Ethernet frames.
    fn default() -> Self {
        Self {
            mode: QueueMode::Bytes,
            max_packets: DEFAULT_MAX_PACKETS,
            max_bytes: qdisc_common::constants::MTU_ETHERNET as usize * DEFAULT_MAX_PACKETS,
        }
    }
}

impl QueueLimit {
    /// A limit of `max_packets` packets.
    pub fn packets(max_packets: usize) -> Self {
        Self { mode: QueueMode::Packets, max_packets, ..Default::default() }
    }

    /// A limit of `max_bytes` bytes.
    pub fn bytes(max_bytes: usize) -> Self {
        Self { mode: QueueMode::Bytes, max_bytes, ..Default::default() }
    }

    /// A limit that is never reached.
    pub fn unbounded() -> Self {
        Self { mode: QueueMode::Packets, max_packets: usize::MAX, max_bytes: usize::MAX }
    }

    /// The limit that applies in the configured mode.
    #[inline]
    pub fn active_limit(&self) -> usize {
        match self.mode {
            QueueMode::Packets => self.max_packets,
            QueueMode::Bytes => self.max_bytes,
        }
    }

    /// Returns `true` if a queue currently holding `packets` packets and `bytes` bytes can
    /// admit another `size` bytes.
    #[inline]
    pub fn admits(&self, packets: usize, bytes: usize, size: usize) -> bool {
        match self.mode {
            QueueMode::Packets => packets.saturating_add(1) <= self.max_packets,
            QueueMode::Bytes => bytes.saturating_add(size) <= self.max_bytes,
        }
    }

    /// The error reported when this limit rejects a packet.
    pub fn exceeded(&self) -> QdiscError {
        QdiscError::CapacityExceeded { mode: self.mode, limit: self.active_limit() }
    }

    pub(crate) fn validate(&self) -> Result<(), QdiscError> {
        if self.active_limit() == 0 {
            return Err(QdiscError::InvalidConfig(format!(
                "{:?} limit must be greater than zero",
                self.mode
            )));
        }

        Ok(())
    }
}

/// The contract every queueing discipline implements.
///
/// Disciplines are driven synchronously: every call runs to completion and never blocks.
/// Time-based behaviour is expressed through the [`Clock`](qdisc_common::Clock) or
/// [`Scheduler`](qdisc_common::Scheduler) a discipline was built with.
pub trait QueueDisc: Send + 'static {
    /// Short name of the discipline, used in logs.
    fn kind(&self) -> &'static str;

    /// Offers a packet to the discipline. On error the packet has been dropped.
    fn enqueue(&mut self, packet: Packet) -> Result<(), QdiscError>;

    /// Removes the next packet to transmit, if any.
    fn dequeue(&mut self) -> Option<Packet>;

    /// Returns a copy of the packet the next [`dequeue`](QueueDisc::dequeue) would return,
    /// without changing any state.
    fn peek(&self) -> Option<Packet>;

    /// Length of the packet [`peek`](QueueDisc::peek) would return.
    fn peek_len(&self) -> Option<usize> {
        self.peek().map(|packet| packet.len())
    }

    /// Number of packets held.
    fn len(&self) -> usize;

    /// Number of bytes held.
    fn byte_len(&self) -> usize;

    /// Returns `true` if no packets are held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a parent scheduler may own this discipline as a class child. The parent
    /// relies on every held packet being visible to [`peek`](QueueDisc::peek) and on
    /// [`dequeue`](QueueDisc::dequeue) returning exactly the peeked packet.
    fn schedulable(&self) -> bool {
        true
    }

    /// Validates the configuration. Called once before traffic starts.
    fn check_config(&self) -> Result<(), QdiscError>;

    /// Initializes runtime state, recursively for owned disciplines. Called once after a
    /// successful [`check_config`](QueueDisc::check_config).
    fn initialize_params(&mut self);

    /// Counters of this discipline.
    fn stats(&self) -> &QdiscStats;
}
