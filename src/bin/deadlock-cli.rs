//! Deadlock Simulator CLI
//!
//! Usage:
//!   deadlock-cli generate --processes 5 --resources 3 --cores 2 --seed 42
//!   deadlock-cli simulate --file state.json
//!   deadlock-cli solve --strategy Detection --file state.json --json

use clap::{Parser, Subcommand};
use colored::Colorize;
use deadlock_sim_core::engine::{AllocationState, RecoveryStep, ScenarioGenerator};
use deadlock_sim_core::strategy::{self, DeadlockStatus, SolveOutcome};
use deadlock_sim_core::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deadlock-cli")]
#[command(about = "Deadlock simulator command line interface", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print raw JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random scenario
    Generate {
        #[arg(short, long, default_value = "5")]
        processes: usize,

        #[arg(short, long, default_value = "3")]
        resources: usize,

        #[arg(short, long, default_value = "2")]
        cores: usize,

        /// Seed for a reproducible scenario
        #[arg(long, env = "DEADLOCK_SEED")]
        seed: Option<u64>,
    },

    /// Check a state for deadlock
    Simulate {
        /// State file (JSON); reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Apply a strategy to a state
    Solve {
        /// Prevention, Avoidance or Detection
        #[arg(short, long)]
        strategy: String,

        /// State file (JSON); reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            processes,
            resources,
            cores,
            seed,
        } => cmd_generate(processes, resources, cores, seed, cli.json)?,
        Commands::Simulate { file } => cmd_simulate(&read_state(file)?, cli.json)?,
        Commands::Solve { strategy, file } => cmd_solve(&read_state(file)?, &strategy, cli.json)?,
    }

    Ok(())
}

fn read_state(file: Option<PathBuf>) -> deadlock_sim_core::Result<AllocationState> {
    let raw = match file {
        Some(path) => fs::read_to_string(&path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::from_str(&raw).map_err(|e| Error::InvalidInput(e.to_string()))
}

fn cmd_generate(
    processes: usize,
    resources: usize,
    cores: usize,
    seed: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let scenario = match seed {
        Some(seed) => ScenarioGenerator::seeded(seed).generate(processes, resources, cores)?,
        None => ScenarioGenerator::from_entropy().generate(processes, resources, cores)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&scenario)?);
        return Ok(());
    }

    println!("{}", "Generated scenario".cyan().bold());
    let state = &scenario.state;
    println!("  Processes: {}", state.processes().join(", "));
    for (resource, total) in scenario.total_resources.0.iter() {
        println!("  {} total: {}", resource, total);
    }
    println!("  Available: {:?}", state.available());
    if scenario.engineered_circular_wait {
        println!("  {}", "Circular wait engineered".yellow());
    }
    println!();
    for description in &scenario.educational.process_descriptions {
        println!("  {}", description);
    }

    Ok(())
}

fn cmd_simulate(state: &AllocationState, json: bool) -> anyhow::Result<()> {
    let report = strategy::simulate(state);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match report.status {
        DeadlockStatus::NoDeadlock => println!("{}", "✓ No deadlock".green().bold()),
        DeadlockStatus::DeadlockDetected => {
            println!("{}", "✗ Deadlock detected".red().bold());
            println!("  Deadlocked: {}", report.deadlocked_processes.join(", "));
            println!("  Options: {}", report.options.join(", "));
        }
    }
    println!("  {}", report.hint.dimmed());

    Ok(())
}

fn cmd_solve(state: &AllocationState, strategy: &str, json: bool) -> anyhow::Result<()> {
    let outcome = strategy::solve_named(state, strategy)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        SolveOutcome::Prevention(plan) => {
            println!("{}", plan.strategy.cyan().bold());
            println!("  {}", plan.explanation);
            for step in &plan.steps {
                println!("  - {}: {}", step.process.bold(), step.detail);
            }
        }
        SolveOutcome::Avoidance(plan) => {
            println!("{}", plan.strategy.cyan().bold());
            for step in &plan.steps {
                println!(
                    "  {}. {} need {:?} work {:?} -> {:?}",
                    step.step, step.process, step.need, step.work_before, step.work_after
                );
            }
            if plan.safe {
                println!("{} {}", "✓ Safe:".green().bold(), plan.safe_sequence.join(" → "));
            } else {
                println!("{}", "✗ Unsafe state".red().bold());
            }
        }
        SolveOutcome::Detection(plan) => {
            let outcome = plan.outcome;
            println!("{}", plan.strategy.cyan().bold());
            for step in &outcome.steps {
                match step {
                    RecoveryStep::Detection(d) => println!("  {} {}", "detect".yellow(), d.description),
                    RecoveryStep::Recovery(t) => println!(
                        "  {} {} (score {:.1})",
                        "terminate".red(),
                        t.process,
                        t.priority_score
                    ),
                    RecoveryStep::Continue(c) => println!("  {} {}", "continue".green(), c.process),
                }
            }
            let verdict = if outcome.recovered {
                outcome.explanation.green().bold()
            } else {
                outcome.explanation.red().bold()
            };
            println!("{}", verdict);
        }
    }

    Ok(())
}
