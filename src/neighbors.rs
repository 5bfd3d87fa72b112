//! Contact selection on a toroidal grid.

use crate::error::{Error, Result};
use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Draw attempts allowed per requested neighbor before the Gaussian sampler
/// gives up and returns a smaller set.
pub const GAUSS_ATTEMPTS_PER_NEIGHBOR: usize = 1000;

/// Rule deciding which cells a cell is in contact with during one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NeighborStrategy {
    /// Moore neighborhood of the given radius, wrapped at the borders.
    Radius { radius: usize },
    /// `count` distinct cells drawn uniformly from the whole grid.
    Random { count: usize },
    /// `count` distinct cells at Gaussian-distributed offsets.
    Gauss { count: usize, std_dev: f64 },
    /// Every other cell of the grid.
    All,
}

impl Default for NeighborStrategy {
    fn default() -> Self {
        NeighborStrategy::Radius { radius: 1 }
    }
}

impl NeighborStrategy {
    /// Check that the strategy can produce its contacts on a `width x height` grid.
    pub fn validate(&self, width: usize, height: usize) -> Result<()> {
        let n_cells = width * height;
        match *self {
            NeighborStrategy::Radius { radius } => {
                if radius == 0 {
                    return Err(Error::InvalidNeighbors(
                        "radius must be at least 1".to_string(),
                    ));
                }
                let max_radius = width.min(height).saturating_sub(1) / 2;
                if radius > max_radius {
                    return Err(Error::InvalidNeighbors(format!(
                        "radius {radius} needs a grid of at least {side}x{side}, but it is {width}x{height}",
                        side = radius.saturating_mul(2).saturating_add(1)
                    )));
                }
            }
            NeighborStrategy::Random { count } => check_count(count, n_cells)?,
            NeighborStrategy::Gauss { count, std_dev } => {
                check_count(count, n_cells)?;
                if !(std_dev.is_finite() && std_dev > 0.0) {
                    return Err(Error::InvalidNeighbors(format!(
                        "standard deviation must be positive, but is {std_dev}"
                    )));
                }
            }
            NeighborStrategy::All => {
                if n_cells < 2 {
                    return Err(Error::InvalidNeighbors(
                        "grid must have at least two cells".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Nominal number of contacts of every cell.
    pub fn neighbor_count(&self, width: usize, height: usize) -> usize {
        match *self {
            NeighborStrategy::Radius { radius } => {
                let side = radius.saturating_mul(2).saturating_add(1);
                side.saturating_mul(side) - 1
            }
            NeighborStrategy::Random { count } | NeighborStrategy::Gauss { count, .. } => count,
            NeighborStrategy::All => width * height - 1,
        }
    }

    /// Coordinates of the contacts of cell `(x, y)`.
    ///
    /// The result never contains `(x, y)` nor any duplicate. The strategy must
    /// have been validated against the grid dimensions.
    pub fn neighbors<R: Rng + ?Sized>(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        rng: &mut R,
    ) -> Result<Vec<(usize, usize)>> {
        match *self {
            NeighborStrategy::Radius { radius } => Ok(radius_neighbors(x, y, width, height, radius)),
            NeighborStrategy::Random { count } => {
                Ok(random_neighbors(x, y, width, height, count, rng))
            }
            NeighborStrategy::Gauss { count, std_dev } => {
                gauss_neighbors(x, y, width, height, count, std_dev, rng)
            }
            NeighborStrategy::All => Ok((0..height)
                .flat_map(|ny| (0..width).map(move |nx| (nx, ny)))
                .filter(|&pos| pos != (x, y))
                .collect()),
        }
    }
}

fn check_count(count: usize, n_cells: usize) -> Result<()> {
    if count == 0 || count >= n_cells {
        return Err(Error::InvalidNeighbors(format!(
            "neighbor count must be in the range 1..{n_cells}, but is {count}"
        )));
    }
    Ok(())
}

fn wrap(pos: usize, offset: i64, len: usize) -> usize {
    (pos as i64 + offset).rem_euclid(len as i64) as usize
}

/// Round a sampled offset and reduce it below `len` in magnitude.
fn grid_offset(sample: f64, len: usize) -> i64 {
    (sample.round() % len as f64) as i64
}

fn radius_neighbors(
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    radius: usize,
) -> Vec<(usize, usize)> {
    let r = radius as i64;
    let mut out = Vec::with_capacity((2 * radius + 1).pow(2) - 1);
    for dy in -r..=r {
        for dx in -r..=r {
            if dx == 0 && dy == 0 {
                continue;
            }
            out.push((wrap(x, dx, width), wrap(y, dy, height)));
        }
    }
    out
}

fn random_neighbors<R: Rng + ?Sized>(
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    count: usize,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    let n_cells = width * height;
    let own = y * width + x;
    let mut seen = HashSet::with_capacity(count);
    let mut out = Vec::with_capacity(count);
    // count < n_cells, so the loop ends with probability one
    while out.len() < count {
        let idx = rng.random_range(0..n_cells);
        if idx != own && seen.insert(idx) {
            out.push((idx % width, idx / width));
        }
    }
    out
}

fn gauss_neighbors<R: Rng + ?Sized>(
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    count: usize,
    std_dev: f64,
    rng: &mut R,
) -> Result<Vec<(usize, usize)>> {
    let offset_dist =
        Normal::new(0.0, std_dev).map_err(|e| Error::InvalidNeighbors(e.to_string()))?;
    let max_attempts = GAUSS_ATTEMPTS_PER_NEIGHBOR * count;

    let mut seen = HashSet::with_capacity(count);
    let mut out = Vec::with_capacity(count);
    let mut attempts = 0;
    while out.len() < count && attempts < max_attempts {
        attempts += 1;
        let dx = grid_offset(offset_dist.sample(rng), width);
        let dy = grid_offset(offset_dist.sample(rng), height);
        let pos = (wrap(x, dx, width), wrap(y, dy, height));
        if pos != (x, y) && seen.insert(pos) {
            out.push(pos);
        }
    }
    if out.len() < count {
        log::debug!(
            "gauss sampler found {} of {count} neighbors of ({x}, {y}) in {attempts} attempts",
            out.len()
        );
    }
    Ok(out)
}
