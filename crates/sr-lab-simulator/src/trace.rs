use serde::Serialize;
use sr_lab_abstract::SimConfig;
use std::collections::HashMap;

use crate::engine::LinkEventSummary;

/// Serializable snapshot of a finished (or paused) simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration: u64,
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u32,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}
