#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs Tilegrid scenarios and transfers grid topology.

mod scenario;
mod simulation;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use tilegrid_core::VOID_HEIGHT;
use tilegrid_world::{query, Topology};

use crate::{
    scenario::Scenario,
    simulation::{describe, describe_report, Simulation},
};

#[derive(Debug, Parser)]
#[command(name = "tilegrid", about = "Drives the Tilegrid simulation from the terminal", version)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run a scenario and print every event it produces
    Run {
        /// Path to the scenario TOML file
        scenario: PathBuf,

        /// Override the number of ticks declared by the scenario
        #[arg(long)]
        ticks: Option<u32>,
    },

    /// Encode or inspect grid topology strings
    Topology {
        #[command(subcommand)]
        action: TopologyAction,
    },
}

#[derive(Debug, Subcommand)]
enum TopologyAction {
    /// Print the topology string of a scenario's grid
    Export {
        /// Path to the scenario TOML file
        scenario: PathBuf,
    },

    /// Decode a topology string and draw its floor plan
    Inspect {
        /// Encoded topology string
        encoded: String,
    },
}

/// Entry point for the Tilegrid command-line interface.
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Run { scenario, ticks } => run(scenario, ticks),
        CliCommand::Topology {
            action: TopologyAction::Export { scenario },
        } => export_topology(scenario),
        CliCommand::Topology {
            action: TopologyAction::Inspect { encoded },
        } => inspect_topology(&encoded),
    }
}

fn run(path: PathBuf, ticks: Option<u32>) -> Result<()> {
    let scenario = Scenario::load(&path)?;
    let ticks = ticks.unwrap_or(scenario.run.ticks);
    info!("running {} for {ticks} ticks", path.display());

    let mut events = Vec::new();
    let mut simulation = Simulation::from_scenario(&scenario, &mut events)?;
    println!("setup");
    for event in events.drain(..) {
        println!("  {}", describe(&event));
    }

    let mut reports = Vec::new();
    for tick in 1..=ticks {
        simulation.step(&mut events, &mut reports);
        println!("tick {tick}");
        for event in events.drain(..) {
            println!("  {}", describe(&event));
        }
        for report in reports.drain(..) {
            println!("  {}", describe_report(&report));
        }
    }

    println!("final");
    for snapshot in query::entity_view(simulation.grid()).iter() {
        let heading = snapshot
            .destination
            .map_or_else(|| "idle".to_owned(), |cell| format!("heading to {cell}"));
        println!(
            "  entity {} ({:?}) at {}, {heading}",
            snapshot.id, snapshot.kind, snapshot.cell
        );
    }
    Ok(())
}

fn export_topology(path: PathBuf) -> Result<()> {
    let scenario = Scenario::load(&path)?;
    let mut events = Vec::new();
    let simulation = Simulation::from_scenario(&scenario, &mut events)?;
    let encoded = simulation
        .grid()
        .topology()
        .encode()
        .context("failed to encode grid topology")?;
    println!("{encoded}");
    Ok(())
}

fn inspect_topology(encoded: &str) -> Result<()> {
    let topology = Topology::decode(encoded).context("failed to decode topology string")?;
    let voids = topology
        .heights
        .iter()
        .filter(|&&height| height == VOID_HEIGHT)
        .count();
    println!(
        "{}x{} grid, {voids} void cells",
        topology.width, topology.height
    );

    let width = usize::try_from(topology.width).context("grid width does not fit in memory")?;
    for (row, heights) in topology.heights.chunks(width).enumerate() {
        let line: String = heights
            .iter()
            .map(|&height| match height {
                VOID_HEIGHT => '#',
                0 => '.',
                _ => '^',
            })
            .collect();
        println!("{:>3} {line}", row + 1);
    }
    Ok(())
}
