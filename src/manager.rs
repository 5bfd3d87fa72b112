use crate::compartmental::{self, OdeSnapshot};
use crate::config::Config;
use crate::engine::{Engine, SimulationHistory};
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::encode;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Final states of a run, as written to `states.msgpack`.
#[derive(Serialize)]
struct FinalStates {
    day: usize,
    has_infected: bool,
    states: Vec<Vec<u8>>,
}

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Run one simulation into a new run directory and return its history.
    ///
    /// `seed` overrides the seed of the configuration.
    pub fn run_simulation(&self, seed: Option<u64>) -> Result<SimulationHistory> {
        let engine = match seed.or(self.cfg.init.seed) {
            Some(seed) => Engine::from_seed(seed),
            None => Engine::from_entropy(),
        };
        let mut engine = engine.with_max_steps(self.cfg.output.max_steps);

        let mut grid = self
            .cfg
            .build_grid(engine.rng_mut())
            .context("failed to generate initial condition")?;

        let history = engine.run(&mut grid).context("failed to run simulation")?;

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        write_msgpack(run_dir.join("history.msgpack"), &history)
            .context("failed to save history")?;

        let states = FinalStates {
            day: grid.day(),
            has_infected: grid.has_infected(),
            states: grid.get_states(),
        };
        write_msgpack(run_dir.join("states.msgpack"), &states)
            .context("failed to save final states")?;

        Ok(history)
    }

    /// Integrate the compartmental model matching the configuration.
    pub fn integrate(&self, days: usize, basic_reproduction: Option<f64>) -> Result<Vec<OdeSnapshot>> {
        let par = self.cfg.ode_params(basic_reproduction);
        log::info!("{par:#?}");

        let traj = compartmental::integrate(&par, days).context("failed to integrate model")?;

        write_msgpack(self.oracle_file(), &traj).context("failed to save trajectory")?;

        Ok(traj)
    }

    /// Remove every run directory and the compartmental trajectory.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let oracle_file = self.oracle_file();
        if oracle_file.exists() {
            fs::remove_file(&oracle_file)
                .with_context(|| format!("failed to remove {oracle_file:?}"))?;
            log::info!("removed {oracle_file:?}");
        }

        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn oracle_file(&self) -> PathBuf {
        self.sim_dir.join("oracle.msgpack")
    }
}

fn write_msgpack<P: AsRef<Path>, T: Serialize + ?Sized>(file: P, value: &T) -> Result<()> {
    let file = file.as_ref();
    let handle = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(handle);
    encode::write_named(&mut writer, value).context("failed to serialize value")?;
    writer.flush().context("failed to flush writer stream")?;
    log::info!("wrote {file:?}");
    Ok(())
}
