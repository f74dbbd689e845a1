//! The per-node protocol state machine
//!
//! A [`Node`] owns its transaction pool, its pending-batch index, the
//! proofs of the values it holds, its personal chain, and its own copy of
//! both shared chains. It consumes timer events and inbound messages
//! delivered by the discrete-event driver and reacts through the
//! [`NodeEnv`] handle: scheduling timers, broadcasting, unicasting and
//! publishing batches to the process-wide pool.

pub mod config;
pub mod env;
pub mod errors;
pub mod metrics;
pub mod msg;
pub mod node;
pub mod pool;

pub use config::SimConfig;
pub use env::NodeEnv;
pub use errors::{NodeError, NodeResult};
pub use metrics::{Counter, SharedMetrics, SimMetrics, StatRecord};
pub use msg::Msg;
pub use node::Node;
pub use pool::BatchPool;
