use std::{sync::Arc, time::Duration};

use qdisc_common::{Clock, Scheduler};
use qdisc_packet::{ClassId, Classifier};

use crate::{
    CongestionMarker, DelayEmulator, Fifo, MarkerOptions, QdiscError, QueueDisc, QueueLimit,
    WeightedScheduler, DRR_DEFAULT_QUANTUM,
};

/// Collaborators shared by every discipline built from one [`QdiscConfig`].
#[derive(Clone)]
pub struct Context {
    /// Time source and timer for time-based disciplines.
    pub scheduler: Arc<dyn Scheduler>,
    /// Classifier used by classful disciplines.
    pub classifier: Arc<dyn Classifier>,
}

impl Context {
    /// Creates a context from a scheduler and a classifier.
    pub fn new(scheduler: Arc<dyn Scheduler>, classifier: Arc<dyn Classifier>) -> Self {
        Self { scheduler, classifier }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("now", &self.scheduler.now()).finish()
    }
}

/// Configuration of a discipline tree.
#[derive(Debug, Clone, PartialEq)]
pub enum QdiscConfig {
    /// A tail-drop [`Fifo`].
    Fifo(QueueLimit),
    /// A [`CongestionMarker`].
    Marker(MarkerOptions),
    /// A [`WeightedScheduler`] over child disciplines.
    Dwrr(DwrrConfig),
    /// A [`DelayEmulator`]. Only valid at the root of a tree.
    Delay(DelayConfig),
}

impl Default for QdiscConfig {
    fn default() -> Self {
        Self::Fifo(QueueLimit::default())
    }
}

/// Configuration of a [`WeightedScheduler`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DwrrConfig {
    /// Classes in registration order.
    pub classes: Vec<DwrrClassConfig>,
}

impl DwrrConfig {
    /// Adds a class served with the given quantum by the given child discipline.
    pub fn class(mut self, id: ClassId, quantum: u32, child: QdiscConfig) -> Self {
        self.classes.push(DwrrClassConfig { id, quantum, child });
        self
    }
}

/// A single [`WeightedScheduler`] class.
#[derive(Debug, Clone, PartialEq)]
pub struct DwrrClassConfig {
    /// Class id the classifier maps packets to.
    pub id: ClassId,
    /// Bytes of credit per round, see [`DRR_DEFAULT_QUANTUM`].
    pub quantum: u32,
    /// Discipline holding the packets of this class. Must not be a DWRR or a delay
    /// emulator.
    pub child: QdiscConfig,
}

impl DwrrClassConfig {
    /// A FIFO class with the default quantum.
    pub fn new(id: ClassId) -> Self {
        Self { id, quantum: DRR_DEFAULT_QUANTUM, child: QdiscConfig::default() }
    }
}

/// Configuration of a [`DelayEmulator`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelayConfig {
    /// Limit of the output queue.
    pub output: QueueLimit,
    /// Classes in registration order.
    pub classes: Vec<DelayClassConfig>,
}

impl DelayConfig {
    /// Adds a class delaying its packets by `delay`.
    pub fn class(mut self, id: ClassId, delay: Duration, limit: QueueLimit) -> Self {
        self.classes.push(DelayClassConfig { id, delay, limit });
        self
    }
}

/// A single [`DelayEmulator`] class.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayClassConfig {
    /// Class id the classifier maps packets to.
    pub id: ClassId,
    /// Fixed delay applied to every packet of the class.
    pub delay: Duration,
    /// Limit of the class queue, i.e. of the packets in flight.
    pub limit: QueueLimit,
}

/// Builds the discipline tree described by `config`, then validates and initializes it.
pub fn build(config: &QdiscConfig, ctx: &Context) -> Result<Box<dyn QueueDisc>, QdiscError> {
    let mut qdisc = instantiate(config, ctx)?;
    qdisc.check_config()?;
    qdisc.initialize_params();

    tracing::debug!(kind = qdisc.kind(), "built discipline");
    Ok(qdisc)
}

fn instantiate(config: &QdiscConfig, ctx: &Context) -> Result<Box<dyn QueueDisc>, QdiscError> {
    let qdisc: Box<dyn QueueDisc> = match config {
        QdiscConfig::Fifo(limit) => Box::new(Fifo::new(*limit)),
        QdiscConfig::Marker(options) => {
            let clock: Arc<dyn Clock> = Arc::new(Arc::clone(&ctx.scheduler));
            Box::new(CongestionMarker::new(clock, options.clone()))
        }
        QdiscConfig::Dwrr(dwrr) => {
            let mut scheduler = WeightedScheduler::new(Arc::clone(&ctx.classifier));
            for class in &dwrr.classes {
                scheduler.add_class(class.id, class.quantum, instantiate(&class.child, ctx)?)?;
            }
            Box::new(scheduler)
        }
        QdiscConfig::Delay(delay) => {
            let mut emulator = DelayEmulator::new(
                Arc::clone(&ctx.scheduler),
                Arc::clone(&ctx.classifier),
                delay.output,
            );
            for class in &delay.classes {
                emulator.add_class(class.id, class.delay, class.limit)?;
            }
            Box::new(emulator)
        }
    };

    Ok(qdisc)
}
