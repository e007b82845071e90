use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::filter::Directive;

use pnl_simulator::config::SimulationConfig;
use pnl_simulator::export::export_all;
use pnl_simulator::report::render_table;
use pnl_simulator::{RunError, RunOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "pnl-simulator")]
#[command(author, version, about = "Monte Carlo equity curve simulator for tick-based trading profiles")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate every profile in a run file and print final equities
    Run {
        /// Run file (JSON); built-in defaults when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override trades per path
        #[arg(short, long)]
        trades: Option<usize>,

        /// Override starting equity
        #[arg(long, allow_negative_numbers = true)]
        initial_equity: Option<f64>,

        /// Paths simulated in parallel per batch (defaults to host parallelism)
        #[arg(short = 'j', long, env = "PNL_SIM_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Write one CSV per path into this directory
        #[arg(short, long)]
        export_dir: Option<PathBuf>,
    },

    /// Write a run file populated with defaults
    Init {
        /// Output path
        #[arg(short, long, default_value = "simulation.json")]
        output: PathBuf,

        /// Number of default profiles to include
        #[arg(short, long, default_value = "1")]
        profiles: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pnl_simulator=info".parse::<Directive>()?),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Run {
            config,
            trades,
            initial_equity,
            concurrency,
            export_dir,
        } => {
            let mut run_config = match config {
                Some(path) => SimulationConfig::load(&path)?,
                None => SimulationConfig::default(),
            };
            if let Some(trades) = trades {
                run_config.global.number_of_trades = trades;
            }
            if let Some(equity) = initial_equity {
                run_config.global.initial_equity = equity;
            }
            if concurrency.is_some() {
                run_config.concurrency_limit = concurrency;
            }
            run_simulation(run_config, export_dir).await
        }
        Commands::Init { output, profiles } => {
            let mut config = SimulationConfig::default();
            while config.profiles.len() < profiles {
                config.add_profile();
            }
            config.save(&output)?;
            info!("Wrote {} profiles to {:?}", config.profiles.len(), output);
            Ok(())
        }
    }
}

async fn run_simulation(config: SimulationConfig, export_dir: Option<PathBuf>) -> Result<()> {
    let runner = config.runner_config();
    info!(
        "Simulating {} paths x {} trades across {} profiles (concurrency {})",
        config.total_paths(),
        config.global.number_of_trades,
        config.profiles.len(),
        runner.batch_size()
    );

    let mut orchestrator = RunOrchestrator::new(runner);

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current batch");
            token.cancel();
        }
    });

    let start = Instant::now();
    let outcome = orchestrator
        .run(&config.global, &config.profiles, |progress, _| {
            let elapsed = start.elapsed().as_secs_f64();
            eprint!(
                "\r[{}/{}] {:.0}% {:.1}s       ",
                progress.completed,
                progress.total,
                progress.percent(),
                elapsed
            );
        })
        .await;
    eprintln!();

    let results = orchestrator.results();
    print!("{}", render_table(results));

    if let Some(dir) = export_dir {
        export_all(results, &dir)?;
    }

    match outcome {
        Ok(completed) => {
            info!("Finished {} paths in {:.1}s", completed, start.elapsed().as_secs_f64());
            Ok(())
        }
        Err(e @ RunError::Cancelled { .. }) => {
            warn!("{}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
