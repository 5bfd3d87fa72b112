//! Simulation data types.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Health state of an individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Compartment {
    Susceptible,
    Exposed,
    Infected,
    Recovered,
    Deceased,
}

impl Compartment {
    /// Stable small-integer code used by renderers.
    ///
    /// The SIR compartments keep the codes 0, 1 and 2 so that a three-colour
    /// palette works for every model.
    pub fn code(self) -> u8 {
        match self {
            Compartment::Susceptible => 0,
            Compartment::Infected => 1,
            Compartment::Recovered => 2,
            Compartment::Exposed => 3,
            Compartment::Deceased => 4,
        }
    }

    /// One-letter label.
    pub fn label(self) -> char {
        match self {
            Compartment::Susceptible => 'S',
            Compartment::Exposed => 'E',
            Compartment::Infected => 'I',
            Compartment::Recovered => 'R',
            Compartment::Deceased => 'D',
        }
    }

    /// Recovered and deceased cells never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Compartment::Recovered | Compartment::Deceased)
    }
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Compartmental model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Model {
    Sir,
    Seir,
    Seird,
}

impl Model {
    /// Compartments used by the model, in label order.
    pub fn compartments(self) -> &'static [Compartment] {
        use Compartment::*;
        match self {
            Model::Sir => &[Susceptible, Infected, Recovered],
            Model::Seir => &[Susceptible, Exposed, Infected, Recovered],
            Model::Seird => &[Susceptible, Exposed, Infected, Recovered, Deceased],
        }
    }

    pub fn has(self, compartment: Compartment) -> bool {
        self.compartments().contains(&compartment)
    }

    pub fn has_exposed(self) -> bool {
        self.has(Compartment::Exposed)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Model::Sir => "SIR",
            Model::Seir => "SEIR",
            Model::Seird => "SEIRD",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Model {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "SIR" => Ok(Model::Sir),
            "SEIR" => Ok(Model::Seir),
            "SEIRD" => Ok(Model::Seird),
            _ => Err(Error::InvalidModel(tag.to_string())),
        }
    }
}

impl TryFrom<String> for Model {
    type Error = Error;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl From<Model> for String {
    fn from(model: Model) -> Self {
        model.tag().to_string()
    }
}

/// Number of cells per compartment.
pub type Counts = BTreeMap<Compartment, usize>;

/// Individual occupying one grid cell.
///
/// The history holds one compartment per elapsed day, day 0 first, and its
/// last entry is always the current compartment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    history: Vec<Compartment>,
}

impl Cell {
    /// Create a cell on day 0.
    pub fn new(compartment: Compartment) -> Self {
        Self {
            history: vec![compartment],
        }
    }

    /// Get the current compartment of the cell.
    pub fn compartment(&self) -> Compartment {
        // history is never empty
        self.history[self.history.len() - 1]
    }

    /// Get the compartment of the cell on every elapsed day.
    pub fn history(&self) -> &[Compartment] {
        &self.history
    }

    /// Number of consecutive days, today included, spent in the current compartment.
    pub fn days_in_compartment(&self) -> usize {
        let current = self.compartment();
        self.history
            .iter()
            .rev()
            .take_while(|&&c| c == current)
            .count()
    }

    pub(crate) fn push(&mut self, compartment: Compartment) {
        self.history.push(compartment);
    }

    /// Replace the day-0 compartment. Only valid before the first step.
    pub(crate) fn reset(&mut self, compartment: Compartment) {
        self.history.clear();
        self.history.push(compartment);
    }
}
