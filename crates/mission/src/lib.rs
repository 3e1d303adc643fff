//! This library implements sequential adaptive sampling missions: a mobile
//! sensor explores a bounded 2D domain, deciding after each measurement where
//! to take the next one so the field map improves as fast as the travel and
//! sampling budget allows.
//!
//! The decision loop borrows an occupancy grid and ground-truth access from
//! `infosamp-map` and keeps a multi-output Gaussian process belief from
//! `infosamp-gp`. Each iteration scores candidate locations with the
//! configured sample cost strategy, steers a particle swarm to the cheapest
//! reachable candidate, samples every observed quantity there and refits the
//! belief on the grown history.
//!
//! Missions come with a set of options to:
//! * pick the sample cost strategy and its weights (see [`costs`]),
//! * blend samples from earlier campaigns into the belief mean,
//! * fix or learn the observation noise level,
//! * parameterize the swarm selector and the path cost oracle,
//! * save the sample history and settings at mission end.
//!
//! # Example
//!
//! ```no_run
//! use infosamp_map::{Bounds, OccupancyGrid, RasterField};
//! use infosamp_mission::{MapSampler, Mission, MissionConfig};
//! use ndarray::array;
//!
//! let grid = OccupancyGrid::free((20, 20), Bounds::unit(2));
//! let field = RasterField::from_fn((20, 20), Bounds::unit(2), |x| x.sum())?;
//! let sampler = MapSampler::new(vec![field]);
//! let config = MissionConfig::default()
//!     .num_samples(10)
//!     .start_locations(vec![array![0.1, 0.1]])
//!     .seed(42);
//! let result = Mission::new(&grid, &sampler, config)?.run()?;
//! println!("took {} samples", result.samples.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Logging uses the `env_logger` crate and is controlled by the
//! `INFOSAMP_LOG` environment variable.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod costs;

mod config;
mod errors;
mod mission;
mod optimizers;
mod types;

pub use crate::config::*;
pub use crate::errors::*;
pub use crate::mission::*;
pub use crate::optimizers::*;
pub use crate::types::*;
