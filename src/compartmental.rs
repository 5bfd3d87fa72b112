//! Compartmental reference model integrated with one Euler step per day.

use crate::error::{Error, Result};
use crate::params::check_num;
use crate::types::Model;
use serde::{Deserialize, Serialize};

/// Parameters of the compartmental model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdeParams {
    pub variant: Model,
    /// Total population, `N`.
    pub population: f64,
    pub initial_infected: f64,
    /// Basic reproduction number, `R0`. Transmission rate is `R0 * gamma`.
    pub basic_reproduction: f64,
    pub infectious_period: f64,
    pub incubation_period: f64,
    /// Case-fatality proportion, `alpha`.
    pub fatality: f64,
    pub death_period: f64,
}

impl OdeParams {
    pub fn new(variant: Model, population: f64, basic_reproduction: f64, infectious_period: f64) -> Self {
        Self {
            variant,
            population,
            initial_infected: 1.0,
            basic_reproduction,
            infectious_period,
            incubation_period: 5.2,
            fatality: 0.05,
            death_period: 6.0,
        }
    }

    pub fn with_initial_infected(mut self, initial_infected: f64) -> Self {
        self.initial_infected = initial_infected;
        self
    }

    pub fn gamma(&self) -> f64 {
        1.0 / self.infectious_period
    }

    pub fn beta(&self) -> f64 {
        self.basic_reproduction * self.gamma()
    }

    pub fn delta(&self) -> f64 {
        1.0 / self.incubation_period
    }

    pub fn rho(&self) -> f64 {
        1.0 / self.death_period
    }

    pub fn validate(&self) -> Result<()> {
        let err = |name: &str, e: Error| Error::InvalidParams(format!("{name}: {e}"));
        check_num(self.population, 1.0..).map_err(|e| err("population", e))?;
        check_num(self.initial_infected, 0.0..=self.population)
            .map_err(|e| err("initial infected", e))?;
        check_num(self.basic_reproduction, 0.0..).map_err(|e| err("R0", e))?;
        check_num(self.infectious_period, 1.0..).map_err(|e| err("infectious period", e))?;
        if self.variant.has_exposed() {
            check_num(self.incubation_period, 1.0..).map_err(|e| err("incubation period", e))?;
        }
        if self.variant == Model::Seird {
            check_num(self.fatality, 0.0..=1.0).map_err(|e| err("fatality", e))?;
            check_num(self.death_period, 1.0..).map_err(|e| err("death period", e))?;
        }
        Ok(())
    }
}

/// Compartment sizes on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OdeSnapshot {
    pub s: f64,
    pub e: f64,
    pub i: f64,
    pub r: f64,
    pub d: f64,
}

impl OdeSnapshot {
    pub fn total(&self) -> f64 {
        self.s + self.e + self.i + self.r + self.d
    }
}

/// Integrate the model for `days` days, returning `days + 1` snapshots.
pub fn integrate(par: &OdeParams, days: usize) -> Result<Vec<OdeSnapshot>> {
    par.validate()?;

    let n = par.population;
    let (beta, gamma, delta, rho) = (par.beta(), par.gamma(), par.delta(), par.rho());
    let alpha = par.fatality;

    let mut cur = OdeSnapshot {
        s: n - par.initial_infected,
        i: par.initial_infected,
        ..Default::default()
    };
    let mut out = Vec::with_capacity(days + 1);
    out.push(cur);

    for _ in 0..days {
        let infection = beta * cur.i * cur.s / n;
        let prev = cur;
        cur.s -= infection;
        match par.variant {
            Model::Sir => {
                cur.i += infection - gamma * prev.i;
                cur.r += gamma * prev.i;
            }
            Model::Seir => {
                cur.e += infection - delta * prev.e;
                cur.i += delta * prev.e - gamma * prev.i;
                cur.r += gamma * prev.i;
            }
            Model::Seird => {
                let recovery = (1.0 - alpha) * gamma * prev.i;
                let death = alpha * rho * prev.i;
                cur.e += infection - delta * prev.e;
                cur.i += delta * prev.e - recovery - death;
                cur.r += recovery;
                cur.d += death;
            }
        }
        out.push(cur);
    }

    Ok(out)
}

/// Largest infected fraction reached.
pub fn peak_infected_fraction(traj: &[OdeSnapshot]) -> f64 {
    match traj.first() {
        Some(first) => {
            let n = first.total();
            traj.iter().map(|snap| snap.i).fold(0.0, f64::max) / n
        }
        None => f64::NAN,
    }
}

/// Fraction of the population that left the susceptible compartment.
pub fn attack_rate(traj: &[OdeSnapshot]) -> f64 {
    match (traj.first(), traj.last()) {
        (Some(first), Some(last)) => 1.0 - last.s / first.total(),
        _ => f64::NAN,
    }
}
