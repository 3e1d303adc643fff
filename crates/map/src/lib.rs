//! Spatial primitives for adaptive-sampling missions.
//!
//! This library provides the domain-side collaborators of a sampling mission:
//! a rectangular bounded domain ([`Bounds`]), rasters addressable by continuous
//! coordinates ([`OccupancyGrid`] for traversability, [`RasterField`] for
//! scalar ground-truth values), and a travel-cost oracle ([`PathCostOracle`])
//! answering "how far is any point from where the sensor currently is" over
//! the occupancy grid.
//!
//! ```
//! use ndarray::array;
//! use infosamp_map::{Bounds, OccupancyGrid, PathCostOracle, PathConfig};
//!
//! let bounds = Bounds::new(array![0., 0.], array![1., 1.]).unwrap();
//! let mut grid = OccupancyGrid::free((10, 10), bounds);
//! grid.occupy_rect(&array![0.4, 0.0], &array![0.6, 0.8]);
//!
//! let oracle = PathCostOracle::new(&grid, &array![0.05, 0.05], PathConfig::default());
//! // going around the wall is costlier than the crow flies
//! assert!(oracle.cost_to(&array![0.95, 0.05]) > 0.9);
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod bounds;
mod errors;
mod grid;
mod pathing;

pub use bounds::*;
pub use errors::*;
pub use grid::*;
pub use pathing::*;
