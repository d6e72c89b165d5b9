use std::{collections::VecDeque, time::Duration};

use qdisc_packet::Packet;

use crate::QueueLimit;

/// Anything that can be held in a [`BoundedSubQueue`].
pub trait QueueItem {
    /// Size in bytes, as accounted against the queue's byte limit.
    fn size(&self) -> usize;
}

impl QueueItem for Packet {
    #[inline]
    fn size(&self) -> usize {
        self.len()
    }
}

/// A packet together with the time it was admitted into a discipline.
///
/// The timestamp only exists while the packet is inside the discipline that stamped it;
/// [`Stamped::into_parts`] strips it again on the way out.
#[derive(Debug, Clone)]
pub struct Stamped {
    packet: Packet,
    enqueued_at: Duration,
}

impl Stamped {
    /// Wraps `packet`, admitted at `enqueued_at`.
    #[inline]
    pub fn new(packet: Packet, enqueued_at: Duration) -> Self {
        Self { packet, enqueued_at }
    }

    /// The wrapped packet.
    #[inline]
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    /// When the packet was admitted.
    #[inline]
    pub fn enqueued_at(&self) -> Duration {
        self.enqueued_at
    }

    /// Time spent in the queue as of `now`.
    #[inline]
    pub fn sojourn(&self, now: Duration) -> Duration {
        now.saturating_sub(self.enqueued_at)
    }

    /// Splits into the packet and its admission time.
    #[inline]
    pub fn into_parts(self) -> (Packet, Duration) {
        (self.packet, self.enqueued_at)
    }
}

impl QueueItem for Stamped {
    #[inline]
    fn size(&self) -> usize {
        self.packet.len()
    }
}

/// A FIFO queue bounded by packet count or byte count.
#[derive(Debug)]
pub struct BoundedSubQueue<T = Packet> {
    items: VecDeque<T>,
    bytes: usize,
    limit: QueueLimit,
}

impl<T: QueueItem> BoundedSubQueue<T> {
    /// Creates an empty queue with the given limit.
    pub fn new(limit: QueueLimit) -> Self {
        Self { items: VecDeque::new(), bytes: 0, limit }
    }

    /// Admits `item` if the limit allows it. A rejected item is handed back and the queue
    /// is left unchanged.
    pub fn enqueue(&mut self, item: T) -> Result<(), T> {
        let size = item.size();
        if !self.limit.admits(self.items.len(), self.bytes, size) {
            return Err(item);
        }

        self.bytes += size;
        self.items.push_back(item);
        Ok(())
    }

    /// Removes the earliest admitted item.
    pub fn dequeue(&mut self) -> Option<T> {
        let item = self.items.pop_front()?;
        self.bytes -= item.size();
        Some(item)
    }

    /// The earliest admitted item.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Number of items held.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Number of bytes held.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes
    }

    /// Returns `true` if no items are held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The admission limit.
    #[inline]
    pub fn limit(&self) -> &QueueLimit {
        &self.limit
    }

    /// Drops every item, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        self.bytes = 0;
        n
    }
}
