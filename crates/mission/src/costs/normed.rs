use super::{check_weights, CostContext, SampleCost};
use crate::errors::Result;
use infosamp_map::Location;
use ndarray::{array, Array1, Array2};
use serde::{Deserialize, Serialize};

/// Weights of the [`NormedCost`] components
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormedWeights {
    /// Reward for high normalized mean
    pub mean: f64,
    /// Reward for high normalized spread
    pub std: f64,
    /// Penalty on travel cost
    pub travel: f64,
}

impl Default for NormedWeights {
    fn default() -> NormedWeights {
        NormedWeights {
            mean: 1.,
            std: 1.,
            travel: 1.,
        }
    }
}

impl NormedWeights {
    pub(crate) fn check(&self) -> Result<()> {
        check_weights(
            "normed",
            &[
                ("mean", self.mean),
                ("std", self.std),
                ("travel", self.travel),
            ],
        )
    }
}

/// Mean and spread rewards normalized by their per-quantity maxima over every
/// grid cell, so quantities on different scales contribute comparably.
///
/// The maxima are computed once at construction. The spread term is
/// `-ln(mean normalized spread)`, which grows without bound as the spread
/// vanishes and keeps the selector off already-surveyed spots.
pub struct NormedCost<'a> {
    ctx: CostContext<'a>,
    weights: NormedWeights,
    mean_max: Array1<f64>,
    std_max: Array1<f64>,
}

impl<'a> NormedCost<'a> {
    /// Cost over the given iteration context, querying the belief on every
    /// grid cell to set the normalization.
    pub fn new(ctx: CostContext<'a>, weights: NormedWeights) -> Result<NormedCost<'a>> {
        let (rows, cols) = ctx.grid.shape();
        let mut centers = Array2::zeros((rows * cols, ctx.grid.bounds().ndim()));
        for i in 0..rows {
            for j in 0..cols {
                centers
                    .row_mut(i * cols + j)
                    .assign(&ctx.grid.point_of((i, j)));
            }
        }
        let mut mean_max = Array1::zeros(ctx.n_quantities);
        let mut std_max = Array1::zeros(ctx.n_quantities);
        for q in 0..ctx.n_quantities {
            let (means, stds) = ctx.belief.query_many(&centers, q)?;
            mean_max[q] = positive_max(&means.mapv(f64::abs));
            std_max[q] = positive_max(&stds);
        }
        Ok(NormedCost {
            ctx,
            weights,
            mean_max,
            std_max,
        })
    }
}

// flat beliefs would otherwise divide by zero
fn positive_max(values: &Array1<f64>) -> f64 {
    let max = values.fold(0., |acc: f64, &v| acc.max(v));
    if max > 0. {
        max
    } else {
        1.
    }
}

impl SampleCost for NormedCost<'_> {
    fn name(&self) -> &'static str {
        "normed"
    }

    fn values(&self, location: &Location) -> Array1<f64> {
        let (means, stds) = match self.ctx.stats(location) {
            Some(stats) => stats,
            None => return Array1::from_elem(3, f64::INFINITY),
        };
        let mean_ratio = (&means / &self.mean_max).mean().unwrap_or(0.);
        let std_ratio = (&stds / &self.std_max).mean().unwrap_or(0.);
        array![
            -mean_ratio,
            -std_ratio.ln(),
            self.ctx.oracle.cost_to(location),
        ]
    }

    fn weights(&self) -> Array1<f64> {
        array![self.weights.mean, self.weights.std, self.weights.travel]
    }
}
