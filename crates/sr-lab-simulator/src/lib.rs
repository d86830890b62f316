//! Discrete-event simulation of the unreliable channel, timer service, and
//! application layer that drive the protocol engines.

pub mod engine;
pub mod scenario_runner;
pub mod trace;

pub use engine::{LinkEventSummary, NodeId, Simulator};
pub use scenario_runner::ScenarioError;
pub use trace::SimulationReport;
