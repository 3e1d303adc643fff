//! Sample-cost strategies scoring candidate locations, lower is better.
//!
//! Each strategy computes a vector of named component values at a candidate
//! location and reduces it with a weighted linear combination, unless it
//! defines a nonlinear combination. Infeasible candidates cost `+inf`.

mod basic;
mod eigf;
mod normed;
mod var_trace;

pub use basic::{BasicCost, BasicWeights};
pub use eigf::{DistScaledEigfCost, DistScaledEigfWeights, EigfCost, EigfWeights};
pub use normed::{NormedCost, NormedWeights};
pub use var_trace::{VarTraceCost, VarTraceWeights};

use crate::errors::{MissionError, Result};
use infosamp_gp::BeliefModel;
use infosamp_gp::Sample;
use infosamp_map::{Location, OccupancyGrid, PathCostOracle};
use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Borrowed snapshot every sample-cost strategy evaluates against, rebuilt
/// once per mission iteration.
#[derive(Clone, Copy)]
pub struct CostContext<'a> {
    /// Occupancy the mission plans against
    pub grid: &'a OccupancyGrid,
    /// Sample history so far, seeds included
    pub samples: &'a [Sample],
    /// Latest fitted belief
    pub belief: &'a BeliefModel,
    /// Number of live quantities the mission observes
    pub n_quantities: usize,
    /// Travel costs rooted at the sensor's current location
    pub oracle: &'a PathCostOracle,
}

impl CostContext<'_> {
    /// Belief means and spreads of the live quantities at a location, `None`
    /// when the belief query fails.
    fn stats(&self, location: &Location) -> Option<(Array1<f64>, Array1<f64>)> {
        match self.belief.query_all(location) {
            Ok((means, stds)) => Some((
                means.slice(s![..self.n_quantities]).to_owned(),
                stds.slice(s![..self.n_quantities]).to_owned(),
            )),
            Err(_) => None,
        }
    }

    /// Distance and value of the history sample of `quantity` closest to
    /// `location`.
    fn nearest_value(&self, location: &Location, quantity: usize) -> Option<(f64, f64)> {
        let mut nearest: Option<(f64, f64)> = None;
        for sample in self.samples.iter().filter(|s| s.quantity == quantity) {
            let dist = distance(&location.view(), &sample.location.view());
            match nearest {
                Some((best, _)) if best <= dist => {}
                _ => nearest = Some((dist, sample.value)),
            }
        }
        nearest
    }
}

/// Euclidean distance between two points
pub(crate) fn distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    (a - b).mapv(|d| d * d).sum().sqrt()
}

/// A scoring strategy for candidate sampling locations.
///
/// `cost` is what the location selector minimizes. The default implementation
/// is the weighted sum of `values`, skipping zero-weight components so a
/// disabled infinite term cannot poison the total.
pub trait SampleCost: Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Component values at a candidate location
    fn values(&self, location: &Location) -> Array1<f64>;

    /// Weights applied componentwise to `values`
    fn weights(&self) -> Array1<f64>;

    /// Scalar cost at a candidate location, lower is better
    fn cost(&self, location: &Location) -> f64 {
        let values = self.values(location);
        let mut total = 0.;
        for (&w, &v) in self.weights().iter().zip(values.iter()) {
            if w != 0. {
                total += w * v;
            }
        }
        total
    }
}

/// Sample-cost strategy selection with the weights it consumes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CostStrategy {
    /// Belief mean and spread, travel cost, proximity penalty
    Basic(BasicWeights),
    /// Mean and spread normalized by their per-quantity maxima over the grid
    Normed(NormedWeights),
    /// Expected improvement for global fit, first quantity only
    Eigf(EigfWeights),
    /// EIGF with a travel penalty ramping up as samples accumulate
    DistScaledEigf(DistScaledEigfWeights),
    /// Remaining posterior variance after a hypothetical sample
    VarTrace(VarTraceWeights),
}

impl Default for CostStrategy {
    fn default() -> CostStrategy {
        CostStrategy::Basic(BasicWeights::default())
    }
}

impl CostStrategy {
    /// Strategy name for logs
    pub fn name(&self) -> &'static str {
        match self {
            CostStrategy::Basic(_) => "basic",
            CostStrategy::Normed(_) => "normed",
            CostStrategy::Eigf(_) => "eigf",
            CostStrategy::DistScaledEigf(_) => "dist-scaled-eigf",
            CostStrategy::VarTrace(_) => "var-trace",
        }
    }

    /// Validate the carried weights.
    pub fn check(&self) -> Result<()> {
        match self {
            CostStrategy::Basic(w) => w.check(),
            CostStrategy::Normed(w) => w.check(),
            CostStrategy::Eigf(w) => w.check(),
            CostStrategy::DistScaledEigf(w) => w.check(),
            CostStrategy::VarTrace(w) => w.check(),
        }
    }

    /// Build the cost function for one mission iteration.
    pub fn build<'a>(&self, ctx: CostContext<'a>) -> Result<Box<dyn SampleCost + 'a>> {
        match self {
            CostStrategy::Basic(w) => Ok(Box::new(BasicCost::new(ctx, w.clone()))),
            CostStrategy::Normed(w) => Ok(Box::new(NormedCost::new(ctx, w.clone())?)),
            CostStrategy::Eigf(w) => Ok(Box::new(EigfCost::new(ctx, w.clone())?)),
            CostStrategy::DistScaledEigf(w) => {
                Ok(Box::new(DistScaledEigfCost::new(ctx, w.clone())?))
            }
            CostStrategy::VarTrace(w) => Ok(Box::new(VarTraceCost::new(ctx, w.clone()))),
        }
    }
}

pub(crate) fn check_weights(strategy: &str, weights: &[(&str, f64)]) -> Result<()> {
    for (name, w) in weights {
        if !w.is_finite() || *w < 0. {
            return Err(MissionError::InvalidConfigError(format!(
                "{strategy} weight `{name}` should be finite and non-negative, got {w}"
            )));
        }
    }
    Ok(())
}
