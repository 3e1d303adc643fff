use super::{check_weights, distance, CostContext, SampleCost};
use crate::errors::Result;
use infosamp_map::Location;
use ndarray::{array, Array1};
use serde::{Deserialize, Serialize};

/// Weights of the [`BasicCost`] components
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasicWeights {
    /// Reward for high predicted mean
    pub mean: f64,
    /// Reward for high predicted spread
    pub std: f64,
    /// Penalty on travel cost
    pub travel: f64,
    /// Penalty for crowding already-sampled spots
    pub proximity: f64,
}

impl Default for BasicWeights {
    fn default() -> BasicWeights {
        BasicWeights {
            mean: 1.,
            std: 1.,
            travel: 1.,
            proximity: 1.,
        }
    }
}

impl BasicWeights {
    pub(crate) fn check(&self) -> Result<()> {
        check_weights(
            "basic",
            &[
                ("mean", self.mean),
                ("std", self.std),
                ("travel", self.travel),
                ("proximity", self.proximity),
            ],
        )
    }
}

/// Rewards high-valued, uncertain regions close to the sensor and away from
/// the samples already taken.
///
/// The proximity penalty sums `(radius / distance)^3` over the history, with
/// `radius` a quarter of the smallest domain extent, so a candidate sitting on
/// an existing sample costs `+inf`.
pub struct BasicCost<'a> {
    ctx: CostContext<'a>,
    weights: BasicWeights,
    radius: f64,
}

impl<'a> BasicCost<'a> {
    /// Cost over the given iteration context.
    pub fn new(ctx: CostContext<'a>, weights: BasicWeights) -> BasicCost<'a> {
        let radius = ctx
            .grid
            .bounds()
            .extents()
            .fold(f64::INFINITY, |acc, &e| acc.min(e))
            / 4.;
        BasicCost {
            ctx,
            weights,
            radius,
        }
    }
}

impl SampleCost for BasicCost<'_> {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn values(&self, location: &Location) -> Array1<f64> {
        let (means, stds) = match self.ctx.stats(location) {
            Some(stats) => stats,
            None => return Array1::from_elem(4, f64::INFINITY),
        };
        let travel = self.ctx.oracle.cost_to(location);
        let proximity: f64 = self
            .ctx
            .samples
            .iter()
            .map(|sample| {
                let dist = distance(&location.view(), &sample.location.view());
                (self.radius / dist).powi(3)
            })
            .sum();
        array![
            -means.mean().unwrap_or(0.),
            -stds.mean().unwrap_or(0.),
            travel,
            proximity,
        ]
    }

    fn weights(&self) -> Array1<f64> {
        array![
            self.weights.mean,
            self.weights.std,
            self.weights.travel,
            self.weights.proximity,
        ]
    }
}
