use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::warn;
use ndarray::Array2;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

use crate::bounds::{Bounds, Location};
use crate::grid::{cell_of, OccupancyGrid};

/// Neighborhood used when expanding grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Connectivity {
    /// Cardinal moves only
    Four,
    /// Cardinal and diagonal moves
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(i64, i64)] {
        const FOUR: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(i64, i64); 8] = [
            (-1, 0),
            (1, 0),
            (0, -1),
            (0, 1),
            (-1, -1),
            (-1, 1),
            (1, -1),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Path cost oracle settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct PathConfig {
    /// Cell neighborhood
    pub connectivity: Connectivity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CostCell {
    cost: f64,
    cell: (usize, usize),
}

impl Eq for CostCell {}

impl Ord for CostCell {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed so the binary heap pops the cheapest cell first
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for CostCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Travel cost from a fixed start location to anywhere on an [`OccupancyGrid`].
///
/// Construction runs one Dijkstra sweep over the grid and keeps the whole
/// distance field, so [`PathCostOracle::cost_to`] is a plain lookup no matter
/// how many destinations are probed afterwards. Cardinal moves cost one cell
/// side length along their axis, diagonal moves the cell diagonal, and a
/// diagonal never cuts the corner of a blocked cell. Destinations that are
/// blocked, outside the bounds or unreachable cost `f64::INFINITY` rather
/// than erroring.
#[derive(Debug, Clone)]
pub struct PathCostOracle {
    dist: Array2<f64>,
    bounds: Bounds,
}

impl PathCostOracle {
    /// Sweep the grid from `start` and record the travel cost to every cell.
    ///
    /// A blocked or out-of-bounds start yields an oracle where every
    /// destination is unreachable, with a warning.
    pub fn new(grid: &OccupancyGrid, start: &Location, config: PathConfig) -> PathCostOracle {
        let shape = grid.shape();
        let res = grid.resolution();
        let mut dist = Array2::from_elem(shape, f64::INFINITY);

        let start_cell = match grid.cell_of(start) {
            Some(cell) if !grid.is_occupied_cell(cell) => cell,
            _ => {
                warn!("Path cost start {start} is blocked or outside the mapped area: all destinations unreachable");
                return PathCostOracle {
                    dist,
                    bounds: grid.bounds().clone(),
                };
            }
        };

        let diagonal = res[0].hypot(res[1]);
        let mut heap = BinaryHeap::new();
        dist[start_cell] = 0.;
        heap.push(CostCell {
            cost: 0.,
            cell: start_cell,
        });

        while let Some(CostCell { cost, cell }) = heap.pop() {
            if cost > dist[cell] {
                continue; // stale queue entry
            }
            let (i, j) = cell;
            for &(di, dj) in config.connectivity.offsets() {
                let ni = i as i64 + di;
                let nj = j as i64 + dj;
                if ni < 0 || nj < 0 || ni >= shape.0 as i64 || nj >= shape.1 as i64 {
                    continue;
                }
                let next = (ni as usize, nj as usize);
                if grid.is_occupied_cell(next) {
                    continue;
                }
                let step = if di != 0 && dj != 0 {
                    if grid.is_occupied_cell((next.0, j)) || grid.is_occupied_cell((i, next.1)) {
                        continue;
                    }
                    diagonal
                } else if di != 0 {
                    res[0]
                } else {
                    res[1]
                };
                let next_cost = cost + step;
                if next_cost < dist[next] {
                    dist[next] = next_cost;
                    heap.push(CostCell {
                        cost: next_cost,
                        cell: next,
                    });
                }
            }
        }

        PathCostOracle {
            dist,
            bounds: grid.bounds().clone(),
        }
    }

    /// Travel cost from the start to the cell covering `x`.
    pub fn cost_to(&self, x: &Location) -> f64 {
        match cell_of(&self.bounds, self.dist.dim(), x) {
            Some(cell) => self.dist[cell],
            None => f64::INFINITY,
        }
    }

    /// Travel cost from the start to a cell.
    pub fn cost_to_cell(&self, cell: (usize, usize)) -> f64 {
        match self.dist.get(cell) {
            Some(&cost) => cost,
            None => f64::INFINITY,
        }
    }
}
