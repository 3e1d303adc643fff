//! Continuous location selection over the bounded domain

mod pso;

pub use pso::{minimize_swarm, SwarmParams};
