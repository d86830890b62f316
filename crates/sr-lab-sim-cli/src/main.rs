use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use sr_lab_abstract::SimConfig;
use sr_lab_protocol::{SrReceiver, SrSender};
use sr_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless Selective Repeat lab simulator")]
struct Args {
    /// Run a TOML scenario from disk instead of the default lossy run.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Number of messages the application submits in the default run.
    #[arg(long, default_value_t = 10)]
    messages: usize,

    /// Channel loss probability for the default run.
    #[arg(long, default_value_t = 0.1)]
    loss_rate: f64,

    /// Channel corruption probability for the default run.
    #[arg(long, default_value_t = 0.1)]
    corrupt_rate: f64,

    /// RNG seed for the default run.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("sr-lab-sim-cli starting…");

    let sender = Box::new(SrSender::new());
    let receiver = Box::new(SrReceiver::new());

    let report = if let Some(path) = &args.scenario {
        scenario_runner::run_scenario(path, sender, receiver)?
    } else {
        run_default_sim(&args, sender, receiver)
    };

    info!(
        "Simulation complete: {} messages delivered, {} packets sent, {} time units",
        report.delivered_data.len(),
        report.sender_packet_count,
        report.duration
    );

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

fn run_default_sim(
    args: &Args,
    sender: Box<dyn sr_lab_abstract::TransportProtocol>,
    receiver: Box<dyn sr_lab_abstract::TransportProtocol>,
) -> SimulationReport {
    let config = SimConfig {
        loss_rate: args.loss_rate,
        corrupt_rate: args.corrupt_rate,
        seed: args.seed,
        ..Default::default()
    };
    let mut sim = Simulator::new(config, sender, receiver);
    for i in 0..args.messages {
        let time = (i as u64) * 50;
        sim.schedule_app_send(time, format!("message {i}").into_bytes());
    }
    info!("Starting default headless simulation…");
    sim.run_until_complete();
    sim.export_report()
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
