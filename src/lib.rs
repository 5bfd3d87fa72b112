//! Epidemic spread on a toroidal cellular automaton, with a compartmental
//! reference model for validation.

pub mod compartmental;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod manager;
pub mod neighbors;
pub mod params;
pub mod types;

pub use engine::{Engine, SimulationHistory, Status};
pub use error::{Error, Result};
pub use grid::Grid;
pub use neighbors::NeighborStrategy;
pub use params::{Params, Phase};
pub use types::{Cell, Compartment, Counts, Model};
