//! coastveg - CLI Entry Point
//!
//! Annual vegetation succession for coastal wetland landscapes.

use clap::{Parser, Subcommand};
use coastveg::{Config, ModelError, Simulation};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "coastveg")]
#[command(version)]
#[command(about = "Annual vegetation succession model for coastal wetland rasters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Quiet mode (no per-year output)
        #[arg(short, long)]
        quiet: bool,

        /// Write the yearly summary history to this YAML file
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },

    /// Validate the configuration and every input without simulating
    Check {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Print aggregated setup problems one per line.
fn report(error: &ModelError) {
    match error {
        ModelError::Setup(problems) => {
            log::error!("{} setup problem(s):", problems.len());
            for problem in problems {
                log::error!("  {}", problem);
            }
        }
        other => log::error!("{}", other),
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config, quiet, summary } => run_simulation(config, quiet, summary),
        Commands::Check { config } => check_inputs(config),
        Commands::Init { output } => {
            init_logging("info");
            generate_config(output)
        }
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }
}

fn load_config(path: &PathBuf) -> coastveg::Result<Config> {
    match Config::from_file(path) {
        Ok(config) => {
            init_logging(&config.logging.log_level);
            log::info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            init_logging("info");
            Err(e)
        }
    }
}

fn run_simulation(config_path: PathBuf, quiet: bool, summary: Option<PathBuf>) -> coastveg::Result<()> {
    let config = load_config(&config_path)?;
    let mut sim = Simulation::from_config(&config)?;

    let start = Instant::now();
    while let Some(year) = sim.step()? {
        if !quiet {
            if let Some(stats) = sim.history.get(year) {
                println!("{}", stats.summary());
            }
        }
    }
    let elapsed = start.elapsed();

    let years = sim.history.years.len();
    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Years: {}", years);
    println!("Speed: {:.2} years/s", years as f64 / elapsed.as_secs_f64().max(1e-9));
    println!("Snapshots: {}", sim.sink().written().len());
    if let Some(last) = sim.history.last() {
        if let Some((code, cover)) = last.dominant(&sim.schema) {
            println!("Dominant species: {} ({:.1}%)", code, 100.0 * cover);
        }
        println!("Final land fraction: {:.3}", last.land_mean);
    }

    if let Some(path) = summary {
        sim.history.save(&path)?;
        println!("Summary history: {:?}", path);
    }

    Ok(())
}

fn check_inputs(config_path: PathBuf) -> coastveg::Result<()> {
    let config = load_config(&config_path)?;
    let sim = Simulation::from_config(&config)?;
    println!(
        "OK: {} cells, {} columns, years {}..={}",
        sim.landscape.len(),
        sim.schema.len(),
        config.simulation.start_year + 1,
        config.simulation.end_year
    );
    Ok(())
}

fn generate_config(output: PathBuf) -> coastveg::Result<()> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}
