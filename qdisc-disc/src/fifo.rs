use qdisc_packet::Packet;

use crate::{BoundedSubQueue, QdiscError, QdiscStats, QueueDisc, QueueLimit};

/// Tail-drop FIFO: a [`BoundedSubQueue`] exposed as a discipline. This is the default child
/// of a [`WeightedScheduler`](crate::WeightedScheduler) class.
#[derive(Debug)]
pub struct Fifo {
    queue: BoundedSubQueue<Packet>,
    stats: QdiscStats,
}

impl Fifo {
    /// Creates an empty FIFO with the given limit.
    pub fn new(limit: QueueLimit) -> Self {
        Self { queue: BoundedSubQueue::new(limit), stats: QdiscStats::default() }
    }
}

impl Default for Fifo {
    fn default() -> Self {
        Self::new(QueueLimit::default())
    }
}

impl QueueDisc for Fifo {
    fn kind(&self) -> &'static str {
        "fifo"
    }

    fn enqueue(&mut self, packet: Packet) -> Result<(), QdiscError> {
        if let Err(packet) = self.queue.enqueue(packet) {
            tracing::trace!(len = packet.len(), backlog = self.queue.len(), "fifo full, dropping");
            self.stats.increment_dropped_overlimit();
            return Err(self.queue.limit().exceeded());
        }

        self.stats.increment_enqueued();
        Ok(())
    }

    fn dequeue(&mut self) -> Option<Packet> {
        let packet = self.queue.dequeue()?;
        self.stats.increment_dequeued(packet.len());
        Some(packet)
    }

    fn peek(&self) -> Option<Packet> {
        self.queue.peek().cloned()
    }

    fn peek_len(&self) -> Option<usize> {
        self.queue.peek().map(Packet::len)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn byte_len(&self) -> usize {
        self.queue.byte_len()
    }

    fn check_config(&self) -> Result<(), QdiscError> {
        self.queue.limit().validate()
    }

    fn initialize_params(&mut self) {
        tracing::debug!(limit = ?self.queue.limit(), "fifo initialized");
    }

    fn stats(&self) -> &QdiscStats {
        &self.stats
    }
}
