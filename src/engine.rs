use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::types::{Compartment, Counts};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

/// Number of days between progress log lines.
pub const PROGRESS_INTERVAL: usize = 100;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// No cell is infected or exposed anymore.
    Extinct,
    /// The step budget ran out first.
    StepLimit,
    /// Infected cells are held until a first transmission that can no longer
    /// happen.
    Stalled,
}

/// Aggregate counts of a run, one snapshot per day, day 0 first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationHistory {
    n_cells: usize,
    snapshots: Vec<Counts>,
    status: Status,
}

impl SimulationHistory {
    pub fn snapshots(&self) -> &[Counts] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Number of elapsed days.
    pub fn days(&self) -> usize {
        self.snapshots.len().saturating_sub(1)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Count of a compartment on every day.
    pub fn series(&self, compartment: Compartment) -> Vec<usize> {
        self.snapshots
            .iter()
            .map(|counts| counts.get(&compartment).copied().unwrap_or(0))
            .collect()
    }

    /// Largest count of a compartment and the first day it was reached.
    pub fn peak(&self, compartment: Compartment) -> (usize, usize) {
        self.series(compartment)
            .into_iter()
            .enumerate()
            .fold((0, 0), |best, (day, count)| {
                if count > best.0 { (count, day) } else { best }
            })
    }

    pub fn final_counts(&self) -> Option<&Counts> {
        self.snapshots.last()
    }

    /// Fraction of cells that are no longer susceptible on the last day.
    pub fn attack_rate(&self) -> f64 {
        let susceptible = self
            .final_counts()
            .and_then(|counts| counts.get(&Compartment::Susceptible).copied())
            .unwrap_or(self.n_cells);
        1.0 - susceptible as f64 / self.n_cells as f64
    }
}

/// Simulation driver.
///
/// Holds the random number generator and the step budget, and steps grids
/// until their outbreak is over.
pub struct Engine<R = ChaCha12Rng> {
    rng: R,
    max_steps: Option<usize>,
}

impl Engine<ChaCha12Rng> {
    /// Create an `Engine` seeded from the thread-local generator.
    pub fn from_entropy() -> Self {
        Self::new(ChaCha12Rng::from_rng(&mut rand::rng()))
    }

    /// Create a reproducible `Engine`.
    pub fn from_seed(seed: u64) -> Self {
        Self::new(ChaCha12Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> Engine<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            max_steps: None,
        }
    }

    /// Stop runs after `max_steps` steps even if the outbreak goes on.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Step `grid` until the outbreak is over, recording the counts of every day.
    ///
    /// # Errors
    /// Returns [`Error::NoOutbreak`] if the grid has no infected or exposed cell.
    pub fn run(&mut self, grid: &mut Grid) -> Result<SimulationHistory> {
        if grid.active() == 0 {
            return Err(Error::NoOutbreak);
        }
        log::info!(
            "starting {} run on a {}x{} grid with {:?}",
            grid.model(),
            grid.width(),
            grid.height(),
            grid.strategy()
        );

        let mut snapshots = vec![grid.count_states()];
        let status = loop {
            if grid.is_stalled() {
                break Status::Stalled;
            }
            if self.max_steps.is_some_and(|max| snapshots.len() > max) {
                break Status::StepLimit;
            }

            let done = grid.step(&mut self.rng)?;
            snapshots.push(grid.count_states());

            let day = grid.day();
            if day % PROGRESS_INTERVAL == 0 {
                log::info!("day {day}: {}", format_counts(grid.count_states()));
            }
            if done {
                break Status::Extinct;
            }
        };

        match status {
            Status::Extinct => log::info!("outbreak over after {} days", grid.day()),
            Status::StepLimit => log::warn!("step budget exhausted after {} days", grid.day()),
            Status::Stalled => log::warn!(
                "run stalled on day {}: {} infected cells wait for a transmission that cannot happen",
                grid.day(),
                grid.count(Compartment::Infected)
            ),
        }

        Ok(SimulationHistory {
            n_cells: grid.n_cells(),
            snapshots,
            status,
        })
    }
}

fn format_counts(counts: Counts) -> String {
    counts
        .iter()
        .map(|(compartment, count)| format!("{compartment}={count}"))
        .collect::<Vec<_>>()
        .join(" ")
}
