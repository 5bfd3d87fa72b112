use crate::compartmental::OdeParams;
use crate::grid::Grid;
use crate::neighbors::NeighborStrategy;
use crate::params::{Params, check_num};
use crate::types::Compartment;
use anyhow::{Context, Result, bail};
use rand::{Rng, seq::index};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Epidemiological model parameters.
    pub model: Params,
    /// Grid dimensions and contact strategy.
    pub grid: GridConfig,
    /// Initial condition.
    #[serde(default)]
    pub init: InitConfig,
    /// Run limits.
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub neighbors: NeighborStrategy,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitConfig {
    /// Cells infected on day 0, as `[x, y]` pairs.
    #[serde(default)]
    pub infected: Vec<[usize; 2]>,
    /// Cells exposed on day 0, as `[x, y]` pairs.
    #[serde(default)]
    pub exposed: Vec<[usize; 2]>,
    /// Number of additional infected cells placed uniformly at random.
    #[serde(default)]
    pub random_infected: usize,
    /// Seed of the random number generator.
    pub seed: Option<u64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Maximum number of steps of a run.
    pub max_steps: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { max_steps: 10_000 }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let (width, height) = (self.grid.width, self.grid.height);
        check_num(width, 1..=10_000).context("invalid grid width")?;
        check_num(height, 1..=10_000).context("invalid grid height")?;

        self.model.validate().context("invalid model parameters")?;
        self.grid
            .neighbors
            .validate(width, height)
            .context("invalid neighbor strategy")?;

        for (name, cells) in [("infected", &self.init.infected), ("exposed", &self.init.exposed)] {
            for &[x, y] in cells {
                if x >= width || y >= height {
                    bail!("{name} cell [{x}, {y}] is outside the {width}x{height} grid");
                }
            }
        }
        if !self.init.exposed.is_empty() && !self.model.variant.has_exposed() {
            bail!("the {} model has no exposed compartment", self.model.variant);
        }
        check_num(self.init.random_infected, 0..=width * height)
            .context("invalid number of random infected cells")?;

        check_num(self.output.max_steps, 1..=1_000_000).context("invalid maximum number of steps")?;

        Ok(())
    }

    /// Build the day-0 grid described by the configuration.
    ///
    /// Random initial infections are drawn from `rng`.
    pub fn build_grid<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Grid> {
        let (width, height) = (self.grid.width, self.grid.height);
        let mut grid = Grid::new(width, height, self.model.clone(), self.grid.neighbors)
            .context("failed to construct grid")?;

        for &[x, y] in &self.init.exposed {
            grid.expose(x, y).context("failed to seed exposed cell")?;
        }
        for &[x, y] in &self.init.infected {
            grid.infect(x, y).context("failed to seed infected cell")?;
        }
        let susceptible: Vec<usize> = grid
            .cells()
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.compartment() == Compartment::Susceptible)
            .map(|(idx, _)| idx)
            .collect();
        let n_random = self.init.random_infected;
        if n_random > susceptible.len() {
            bail!(
                "cannot place {n_random} random infected cells among {} susceptible cells",
                susceptible.len()
            );
        }
        for i_sus in index::sample(rng, susceptible.len(), n_random) {
            let idx = susceptible[i_sus];
            grid.infect(idx % width, idx / width)
                .context("failed to seed random infected cell")?;
        }

        Ok(grid)
    }

    /// Rough basic reproduction number of the cellular model.
    ///
    /// An infected cell has `contacts` contacts per day for `infectious_period`
    /// days, each transmitting with probability `beta`.
    pub fn basic_reproduction(&self) -> f64 {
        let contacts = self
            .grid
            .neighbors
            .neighbor_count(self.grid.width, self.grid.height);
        self.model.beta * contacts as f64 * self.model.infectious_period
    }

    /// Compartmental model matching the configured population and periods.
    pub fn ode_params(&self, basic_reproduction: Option<f64>) -> OdeParams {
        let population = (self.grid.width * self.grid.height) as f64;
        let initial_infected =
            (self.init.infected.len() + self.init.random_infected).max(1) as f64;
        OdeParams {
            variant: self.model.variant,
            population,
            initial_infected: initial_infected.min(population),
            basic_reproduction: basic_reproduction.unwrap_or_else(|| self.basic_reproduction()),
            infectious_period: self.model.infectious_period,
            incubation_period: self.model.incubation_period,
            fatality: self.model.fatality,
            death_period: self.model.death_period,
        }
    }
}
