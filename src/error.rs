//! Error types for the simulation core.

use crate::types::{Compartment, Model};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid model variant {0:?} (expected SIR, SEIR or SEIRD)")]
    InvalidModel(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("invalid neighbor strategy: {0}")]
    InvalidNeighbors(String),

    #[error("grid dimensions must be positive, but are {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("compartment {compartment} is not part of the {model} model")]
    UnsupportedCompartment {
        compartment: Compartment,
        model: Model,
    },

    #[error("grid can only be seeded on day 0, but is on day {day}")]
    AlreadyStarted { day: usize },

    #[error("no outbreak: the grid has no infected or exposed cells")]
    NoOutbreak,
}
