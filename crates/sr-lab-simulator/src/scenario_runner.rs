//! Loads a declarative TOML scenario, runs it to completion, and checks its
//! assertions against the finished run.

use crate::engine::Simulator;
use crate::trace::SimulationReport;
use sr_lab_abstract::{SimConfig, TestAction, TestAssertion, TestScenario, TransportProtocol};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("scenario '{name}' failed assertions:\n{}", .failures.join("\n"))]
    AssertionsFailed { name: String, failures: Vec<String> },
}

pub fn load_scenario(path: &Path) -> Result<TestScenario, ScenarioError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Translate scenario actions into simulator schedule entries and faults.
pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                sim.schedule_app_send(*time, data.as_bytes().to_vec());
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
        }
    }
}

/// Run a scenario file with the given engine pair. Returns the report on
/// success; assertion failures are collected into one error.
pub fn run_scenario(
    path: &Path,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> Result<SimulationReport, ScenarioError> {
    let scenario = load_scenario(path)?;
    info!("Running scenario '{}': {}", scenario.name, scenario.description);

    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);

    let mut sim = Simulator::new(config, sender, receiver);
    configure_actions(&mut sim, &scenario.actions);
    sim.run_until_complete();

    let report = sim.export_report();
    let failures = check_assertions(&scenario.assertions, &report);
    if failures.is_empty() {
        info!("Scenario '{}' passed", scenario.name);
        Ok(report)
    } else {
        Err(ScenarioError::AssertionsFailed {
            name: scenario.name,
            failures,
        })
    }
}

fn check_assertions(assertions: &[TestAssertion], report: &SimulationReport) -> Vec<String> {
    let mut failures = Vec::new();
    for assertion in assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                let found = report
                    .delivered_data
                    .iter()
                    .any(|d| payload_matches(d, data));
                if !found {
                    failures.push(format!("expected data {data:?} was never delivered"));
                }
            }
            TestAssertion::DeliveredCount { count } => {
                if report.delivered_data.len() != *count {
                    failures.push(format!(
                        "expected {} delivered messages, got {}",
                        count,
                        report.delivered_data.len()
                    ));
                }
            }
            TestAssertion::SenderPacketCount { min, max } => {
                let count = report.sender_packet_count;
                if count < *min {
                    failures.push(format!("sender sent {count} packets, expected at least {min}"));
                }
                if let Some(max) = max
                    && count > *max
                {
                    failures.push(format!("sender sent {count} packets, expected at most {max}"));
                }
            }
            TestAssertion::MaxDuration { time } => {
                if report.duration > *time {
                    failures.push(format!(
                        "simulation took {} time units, limit was {}",
                        report.duration, time
                    ));
                }
            }
        }
    }
    failures
}

/// Delivered payloads are fixed-size blocks; compare against the scenario
/// string ignoring the zero padding.
fn payload_matches(delivered: &[u8], expected: &str) -> bool {
    let expected = expected.as_bytes();
    if expected.len() > delivered.len() {
        return false;
    }
    let (head, tail) = delivered.split_at(expected.len());
    head == expected && tail.iter().all(|&b| b == 0)
}
