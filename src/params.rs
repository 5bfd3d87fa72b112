use crate::error::{Error, Result};
use crate::types::Model;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, ops::RangeBounds};

/// How long a cell stays in a transient compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Leave with probability `1 / period` every day (geometric durations).
    #[default]
    Memoryless,
    /// Leave exactly once `period` days have been spent in the compartment.
    Fixed,
}

/// Epidemiological parameters of the cellular model.
///
/// `beta` is the probability that one infected contact infects a susceptible
/// cell during one step. A cell with `n` infected contacts is infected with
/// probability `1 - (1 - beta)^n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Params {
    pub variant: Model,

    /// Per-contact infection probability.
    pub beta: f64,

    /// Expected number of days spent infected.
    pub infectious_period: f64,
    /// Expected number of days spent exposed (SEIR, SEIRD).
    #[serde(default = "default_incubation_period")]
    pub incubation_period: f64,
    /// Expected number of days from infection to death (SEIRD).
    #[serde(default = "default_death_period")]
    pub death_period: f64,
    /// Case-fatality proportion, `alpha` (SEIRD).
    #[serde(default = "default_fatality")]
    pub fatality: f64,

    #[serde(default)]
    pub phase: Phase,

    /// Only let infected cells leave once a transmission has happened somewhere.
    #[serde(default = "default_recovery_requires_transmission")]
    pub recovery_requires_transmission: bool,
}

fn default_incubation_period() -> f64 {
    5.2
}

fn default_death_period() -> f64 {
    6.0
}

fn default_fatality() -> f64 {
    0.05
}

fn default_recovery_requires_transmission() -> bool {
    true
}

impl Params {
    /// Parameters of a model with default incubation and mortality settings.
    pub fn new(variant: Model, beta: f64, infectious_period: f64) -> Self {
        Self {
            variant,
            beta,
            infectious_period,
            incubation_period: default_incubation_period(),
            death_period: default_death_period(),
            fatality: default_fatality(),
            phase: Phase::default(),
            recovery_requires_transmission: default_recovery_requires_transmission(),
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_incubation_period(mut self, incubation_period: f64) -> Self {
        self.incubation_period = incubation_period;
        self
    }

    pub fn with_mortality(mut self, fatality: f64, death_period: f64) -> Self {
        self.fatality = fatality;
        self.death_period = death_period;
        self
    }

    pub fn with_recovery_requires_transmission(mut self, flag: bool) -> Self {
        self.recovery_requires_transmission = flag;
        self
    }

    /// Recovery rate, `gamma`.
    pub fn gamma(&self) -> f64 {
        1.0 / self.infectious_period
    }

    /// Incubation rate, `delta`.
    pub fn delta(&self) -> f64 {
        1.0 / self.incubation_period
    }

    /// Death rate of fatal cases, `rho`.
    pub fn rho(&self) -> f64 {
        1.0 / self.death_period
    }

    /// Daily probability that an infected cell dies (memoryless SEIRD).
    pub fn prob_death(&self) -> f64 {
        self.fatality * self.rho()
    }

    /// Daily probability that an infected cell leaves the infected compartment
    /// (memoryless phase).
    pub fn prob_exit(&self) -> f64 {
        match self.variant {
            Model::Seird => self.prob_death() + (1.0 - self.fatality) * self.gamma(),
            Model::Sir | Model::Seir => self.gamma(),
        }
    }

    /// Convert a per-day transmission rate spread over `contacts` contacts
    /// into a per-contact probability.
    pub fn beta_from_rate(rate: f64, contacts: usize) -> f64 {
        if contacts == 0 {
            return 0.0;
        }
        (rate / contacts as f64).min(1.0)
    }

    pub fn validate(&self) -> Result<()> {
        check_num(self.beta, 0.0..=1.0).map_err(|e| prefix("beta", e))?;
        check_num(self.infectious_period, 1.0..=1e6)
            .map_err(|e| prefix("infectious period", e))?;
        if self.variant.has_exposed() {
            check_num(self.incubation_period, 1.0..=1e6)
                .map_err(|e| prefix("incubation period", e))?;
        }
        if self.variant == Model::Seird {
            check_num(self.fatality, 0.0..=1.0).map_err(|e| prefix("fatality", e))?;
            check_num(self.death_period, 1.0..=1e6).map_err(|e| prefix("death period", e))?;
            if self.phase == Phase::Memoryless {
                check_num(self.prob_exit(), 0.0..=1.0)
                    .map_err(|e| prefix("daily exit probability", e))?;
            }
        }
        Ok(())
    }
}

fn prefix(name: &str, error: Error) -> Error {
    match error {
        Error::InvalidParams(msg) => Error::InvalidParams(format!("{name}: {msg}")),
        other => other,
    }
}

pub(crate) fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        return Err(Error::InvalidParams(format!(
            "number must be in the range {range:?}, but is {num:?}"
        )));
    }
    Ok(())
}
