//! Relay orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::Relay;
pub use stats::RelayStats;
