#![doc(issue_tracker_base_url = "https://github.com/chainbound/qdisc-rs/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use qdisc_common::{constants, Callback, Clock, Scheduler};
pub use qdisc_disc::*;
pub use qdisc_packet::*;
pub use qdisc_sim::{Simulator, TokioScheduler};
