//! Chain stores for the EZchain simulator
//!
//! Both logs are append-only and dense in height, so blocks live in a
//! vector keyed by height and the predecessor relation is index
//! arithmetic, with no back pointers. Every node keeps its own copy of each
//! chain; global consistency is an artefact of instantaneous block
//! broadcast, not shared state.

pub mod ac;
pub mod cc;
pub mod context;
pub mod errors;
pub mod personal;

pub use ac::{AcBlock, AcChain};
pub use cc::{CcBlock, CcChain};
pub use context::ChainContext;
pub use errors::{ChainError, ChainResult};
pub use personal::PersonalChain;
