use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use epicell::{Compartment, compartmental, manager::Manager};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Run {
        #[arg(long)]
        seed: Option<u64>,
    },

    Integrate {
        #[arg(long, default_value_t = 150)]
        days: usize,

        #[arg(long)]
        basic_reproduction: Option<f64>,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Run { seed } => {
            let history = mgr.run_simulation(seed)?;
            let (peak, peak_day) = history.peak(Compartment::Infected);
            log::info!(
                "{:?} after {} days, peak of {peak} infected on day {peak_day}, attack rate {:.4}",
                history.status(),
                history.days(),
                history.attack_rate()
            );
        }
        Command::Integrate {
            days,
            basic_reproduction,
        } => {
            let traj = mgr.integrate(days, basic_reproduction)?;
            log::info!(
                "peak infected fraction {:.4}, attack rate {:.4}",
                compartmental::peak_infected_fraction(&traj),
                compartmental::attack_rate(&traj)
            );
        }
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
