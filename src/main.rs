//! Periphery - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use periphery::session::{Arg, Computer, Outcome, Session, Step};
use periphery::util::logger::{self, LogLevel};
use periphery::{run_session_file, BridgeConfig, NAME, VERSION};
use std::path::PathBuf;

/// Drive attached peripherals through the script bridge
#[derive(Parser, Debug)]
#[command(name = "periphery")]
#[command(author = "Periphery Team")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (RON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Attach the reference devices and run a short session
    Demo,

    /// Run a session file
    Session {
        /// Session file to run
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print outcomes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    if args.verbose {
        logger::init_with_level(LogLevel::Debug);
        eprintln!("Periphery version: {}", VERSION);
    } else {
        logger::init_with_level(config.log_level);
    }

    match args.command {
        Commands::Demo => {
            let mut computer = Computer::new(config);
            let outcomes = computer.run(&demo_session()).context("Demo failed")?;
            print_outcomes(&outcomes);
        }
        Commands::Session { file, json } => {
            let outcomes = run_session_file(&file, config)?;
            if json {
                let json: Vec<_> = outcomes
                    .iter()
                    .map(|(step, outcome)| serde_json::json!({ "step": step, "outcome": outcome }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                print_outcomes(&outcomes);
            }
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}

fn demo_session() -> Session {
    let call = |side: &str, method: &str, args: Vec<Arg>| Step::Call(side.into(), method.into(), args);
    Session {
        steps: vec![
            Step::Attach("top".into(), "speaker".into()),
            Step::Attach("left".into(), "sensor".into()),
            Step::Attach("back".into(), "chest".into()),
            Step::Start,
            call("top", "playNote", vec![Arg::Str("bell".into())]),
            call("top", "playNote", vec![]),
            call("left", "scan", vec![]),
            call("left", "getNeighbours", vec![]),
            call("back", "size", vec![]),
            call("back", "getItemDetail", vec![Arg::Int(99)]),
            call("bottom", "isOn", vec![]),
            Step::Events,
            Step::Detach("top".into()),
            call("top", "playNote", vec![Arg::Str("bell".into())]),
            Step::Events,
            Step::Stop,
        ],
    }
}

fn print_outcomes(outcomes: &[(Step, Outcome)]) {
    for (step, outcome) in outcomes {
        print!("{} ", "›".dimmed());
        println!("{}", step.bold());
        match outcome {
            Outcome::Done => {}
            Outcome::Returned { values } => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                println!("  {} {}", "ok".green(), values.join(", "));
            }
            Outcome::Failed { message, level } => {
                println!("  {} {} (level {})", "error".red(), message, level);
            }
            Outcome::Waiting => println!("  {}", "waiting".yellow()),
            Outcome::Ticked { tasks } => println!("  {} {} task(s)", "tick".cyan(), tasks),
            Outcome::Events { events } => {
                if events.is_empty() {
                    println!("  {}", "no events".dimmed());
                }
                for event in events {
                    let values: Vec<String> = event.iter().map(|v| v.to_string()).collect();
                    println!("  {} {}", "event".blue(), values.join(" "));
                }
            }
        }
    }
}
