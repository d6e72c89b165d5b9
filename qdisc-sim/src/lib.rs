//! Reference implementations of the [`Clock`](qdisc_common::Clock) and
//! [`Scheduler`](qdisc_common::Scheduler) contracts.
//!
//! - [`Simulator`]: a discrete-event loop with a logical clock, for deterministic tests and
//!   offline experiments.
//! - [`TokioScheduler`]: drives callbacks from the tokio timer, for running disciplines in
//!   real time.
#![doc(issue_tracker_base_url = "https://github.com/chainbound/qdisc-rs/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod event;
/// Real-time scheduling on the tokio timer.
pub mod realtime;
/// Discrete-event simulation.
pub mod simulator;

pub use realtime::TokioScheduler;
pub use simulator::Simulator;
