//! DRR (Deficit Round Robin) scheduling over classful child disciplines.

use std::{collections::VecDeque, sync::Arc};

use qdisc_packet::{ClassId, Classifier, Packet};
use rustc_hash::FxHashMap;

use crate::{QdiscError, QdiscStats, QueueDisc};

/// The default quantum for DRR classes, in bytes.
///
/// Setting the quantum to the Ethernet MTU gives plain round-robin behaviour between
/// classes carrying full-sized frames: each class dequeues one packet per round.
pub const DRR_DEFAULT_QUANTUM: u32 = qdisc_common::constants::MTU_ETHERNET;

struct DrrClass {
    /// Bytes of credit granted per round.
    quantum: usize,
    /// Bytes of credit left in the current round.
    deficit: usize,
    child: Box<dyn QueueDisc>,
}

/// Deficit weighted round robin scheduler.
///
/// Packets are classified into classes, each of which owns a child discipline. Classes with
/// backlog are kept in an active list and served in turn: the head class may send packets
/// as long as its deficit covers them, then it is credited with its quantum and moved to the
/// tail. Over full rounds, the bytes served per class are proportional to the quanta.
///
/// A class must have a quantum greater than zero, which guarantees that every backlogged
/// class is eventually served.
pub struct WeightedScheduler {
    classes: FxHashMap<ClassId, DrrClass>,
    /// Backlogged classes in service order.
    active: VecDeque<ClassId>,
    classifier: Arc<dyn Classifier>,
    stats: QdiscStats,
}

impl std::fmt::Debug for WeightedScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightedScheduler")
            .field("classes", &self.classes.len())
            .field("active", &self.active)
            .finish()
    }
}

impl WeightedScheduler {
    /// Creates a scheduler without classes.
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classes: FxHashMap::default(),
            active: VecDeque::new(),
            classifier,
            stats: QdiscStats::default(),
        }
    }

    /// Registers a class with the given quantum and child discipline.
    pub fn add_class(
        &mut self,
        id: ClassId,
        quantum: u32,
        child: Box<dyn QueueDisc>,
    ) -> Result<(), QdiscError> {
        if quantum == 0 {
            return Err(QdiscError::InvalidConfig(format!("class {id}: quantum must be positive")));
        }

        if !child.schedulable() {
            return Err(QdiscError::InvalidConfig(format!(
                "class {id}: {} cannot be a class child",
                child.kind()
            )));
        }

        if self.classes.contains_key(&id) {
            return Err(QdiscError::DuplicateClass(id));
        }

        tracing::debug!(class = id, quantum, child = child.kind(), "added class");
        self.classes.insert(id, DrrClass { quantum: quantum as usize, deficit: 0, child });
        Ok(())
    }

    /// Number of registered classes.
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Remaining credit of the given class in the current round.
    pub fn deficit(&self, id: ClassId) -> Option<usize> {
        self.classes.get(&id).map(|class| class.deficit)
    }

    /// Backlogged classes, in the order they will be served.
    pub fn active_classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.active.iter().copied()
    }

    /// The child discipline of the given class.
    pub fn child(&self, id: ClassId) -> Option<&dyn QueueDisc> {
        self.classes.get(&id).map(|class| class.child.as_ref())
    }
}

impl QueueDisc for WeightedScheduler {
    fn kind(&self) -> &'static str {
        "dwrr"
    }

    fn enqueue(&mut self, packet: Packet) -> Result<(), QdiscError> {
        let Some(id) = self.classifier.classify(&packet) else {
            tracing::warn!(uid = packet.uid(), "Packet could not be classified, dropping");
            self.stats.increment_dropped_unclassified();
            return Err(QdiscError::Unclassified);
        };

        let Some(class) = self.classes.get_mut(&id) else {
            tracing::warn!(uid = packet.uid(), class = id, "No such class, dropping");
            self.stats.increment_dropped_unclassified();
            return Err(QdiscError::UnknownClass(id));
        };

        if let Err(e) = class.child.enqueue(packet) {
            if e.is_overlimit() {
                self.stats.increment_dropped_overlimit();
            }
            return Err(e);
        }

        self.stats.increment_enqueued();

        if class.child.len() == 1 {
            class.deficit = class.quantum;
            self.active.push_back(id);
            tracing::trace!(class = id, deficit = class.deficit, "class activated");
        }

        Ok(())
    }

    fn dequeue(&mut self) -> Option<Packet> {
        loop {
            let id = *self.active.front()?;

            let Some(class) = self.classes.get_mut(&id) else {
                tracing::error!(class = id, "Active class is not registered");
                self.active.pop_front();
                continue;
            };

            let Some(len) = class.child.peek_len() else {
                tracing::error!(
                    class = id,
                    backlog = class.child.len(),
                    "Active class has nothing to dequeue"
                );
                return None;
            };

            if len > class.deficit {
                class.deficit += class.quantum;
                self.active.rotate_left(1);
                tracing::trace!(class = id, len, deficit = class.deficit, "deficit too low");
                continue;
            }

            let Some(packet) = class.child.dequeue() else {
                tracing::error!(class = id, "Child peeked a packet but dequeued none");
                return None;
            };

            if packet.len() != len {
                tracing::error!(
                    class = id,
                    peeked = len,
                    dequeued = packet.len(),
                    "Child dequeued a different packet than it peeked"
                );
            }
            class.deficit = class.deficit.saturating_sub(packet.len());

            if class.child.is_empty() {
                class.deficit = 0;
                self.active.pop_front();
                tracing::trace!(class = id, "class drained");
            }

            self.stats.increment_dequeued(packet.len());
            return Some(packet);
        }
    }

    /// Returns the head packet of the head class. This may not be the next packet
    /// [`dequeue`](QueueDisc::dequeue) returns, since the head class may lack the deficit
    /// to send it.
    fn peek(&self) -> Option<Packet> {
        let id = self.active.front()?;
        self.classes.get(id)?.child.peek()
    }

    fn len(&self) -> usize {
        self.classes.values().map(|class| class.child.len()).sum()
    }

    fn byte_len(&self) -> usize {
        self.classes.values().map(|class| class.child.byte_len()).sum()
    }

    fn schedulable(&self) -> bool {
        false
    }

    fn check_config(&self) -> Result<(), QdiscError> {
        if self.classes.is_empty() {
            return Err(QdiscError::InvalidConfig("no classes configured".to_string()));
        }

        for class in self.classes.values() {
            class.child.check_config()?;
        }

        Ok(())
    }

    fn initialize_params(&mut self) {
        for (id, class) in self.classes.iter_mut() {
            class.deficit = 0;
            class.child.initialize_params();
            tracing::debug!(class = id, quantum = class.quantum, "class initialized");
        }
        self.active.clear();
    }

    fn stats(&self) -> &QdiscStats {
        &self.stats
    }
}
