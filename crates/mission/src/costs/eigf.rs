use super::{check_weights, CostContext, SampleCost};
use crate::errors::{MissionError, Result};
use infosamp_map::Location;
use ndarray::{array, Array1};
use serde::{Deserialize, Serialize};

/// Weights of the [`EigfCost`] components
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EigfWeights {
    /// Reward for mean predictions diverging from the nearest sampled value
    pub mean: f64,
    /// Reward for high predicted variance
    pub std: f64,
    /// Gate on the occupancy infeasibility term
    pub travel: f64,
}

impl Default for EigfWeights {
    fn default() -> EigfWeights {
        EigfWeights {
            mean: 1.,
            std: 1.,
            travel: 1.,
        }
    }
}

impl EigfWeights {
    pub(crate) fn check(&self) -> Result<()> {
        check_weights(
            "eigf",
            &[
                ("mean", self.mean),
                ("std", self.std),
                ("travel", self.travel),
            ],
        )
    }
}

fn require_first_quantity_sample(ctx: &CostContext) -> Result<()> {
    if ctx.samples.iter().any(|sample| sample.quantity == 0) {
        Ok(())
    } else {
        Err(MissionError::InvalidConfigError(
            "EIGF costs require at least one existing sample of the first quantity".to_string(),
        ))
    }
}

/// Expected improvement for global fit, evaluated on the first quantity only.
///
/// Rewards candidates whose predicted mean diverges from the value of the
/// nearest existing sample, which points at regions where the fitted surface
/// still misses the data, and candidates with high predictive variance.
/// Occupied candidates cost `+inf` through the third component.
pub struct EigfCost<'a> {
    ctx: CostContext<'a>,
    weights: EigfWeights,
}

impl<'a> EigfCost<'a> {
    /// Cost over the given iteration context. The history must already hold a
    /// sample of the first quantity.
    pub fn new(ctx: CostContext<'a>, weights: EigfWeights) -> Result<EigfCost<'a>> {
        require_first_quantity_sample(&ctx)?;
        Ok(EigfCost { ctx, weights })
    }
}

impl SampleCost for EigfCost<'_> {
    fn name(&self) -> &'static str {
        "eigf"
    }

    fn values(&self, location: &Location) -> Array1<f64> {
        let (mean, std) = match self.ctx.belief.query(location, 0) {
            Ok(stats) => stats,
            Err(_) => return Array1::from_elem(3, f64::INFINITY),
        };
        let err = match self.ctx.nearest_value(location, 0) {
            Some((_, nearest)) => mean - nearest,
            None => 0.,
        };
        let infeasible = if self.ctx.grid.is_occupied(location) {
            f64::INFINITY
        } else {
            0.
        };
        array![-err * err, -std * std, infeasible]
    }

    fn weights(&self) -> Array1<f64> {
        array![self.weights.mean, self.weights.std, self.weights.travel]
    }
}

/// Weights of the [`DistScaledEigfCost`] combination
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistScaledEigfWeights {
    /// Weight of the squared mean divergence
    pub mean: f64,
    /// Weight of the predicted variance
    pub std: f64,
    /// Strength of the travel damping once samples accumulate
    pub delay: f64,
}

impl Default for DistScaledEigfWeights {
    fn default() -> DistScaledEigfWeights {
        DistScaledEigfWeights {
            mean: 1.,
            std: 1.,
            delay: 1.,
        }
    }
}

impl DistScaledEigfWeights {
    pub(crate) fn check(&self) -> Result<()> {
        check_weights(
            "dist-scaled-eigf",
            &[
                ("mean", self.mean),
                ("std", self.std),
                ("delay", self.delay),
            ],
        )
    }
}

/// [`EigfCost`] divided by a travel term that only matters once enough samples
/// exist.
///
/// The combination is `-(w_mean err^2 + w_std var) / (1 + w_delay n_scale
/// tau_norm^2)` where `n_scale` ramps logistically from 0 toward 1 around ten
/// samples and `tau_norm` is the path cost normalized by the mean domain
/// extent. Early iterations therefore roam freely, later ones stay close.
pub struct DistScaledEigfCost<'a> {
    ctx: CostContext<'a>,
    weights: DistScaledEigfWeights,
    mean_extent: f64,
}

impl<'a> DistScaledEigfCost<'a> {
    /// Cost over the given iteration context. The history must already hold a
    /// sample of the first quantity.
    pub fn new(
        ctx: CostContext<'a>,
        weights: DistScaledEigfWeights,
    ) -> Result<DistScaledEigfCost<'a>> {
        require_first_quantity_sample(&ctx)?;
        let mean_extent = ctx.grid.bounds().extents().mean().unwrap_or(1.);
        Ok(DistScaledEigfCost {
            ctx,
            weights,
            mean_extent,
        })
    }
}

impl SampleCost for DistScaledEigfCost<'_> {
    fn name(&self) -> &'static str {
        "dist-scaled-eigf"
    }

    fn values(&self, location: &Location) -> Array1<f64> {
        let (mean, std) = match self.ctx.belief.query(location, 0) {
            Ok(stats) => stats,
            Err(_) => return Array1::from_elem(3, f64::INFINITY),
        };
        let err = match self.ctx.nearest_value(location, 0) {
            Some((_, nearest)) => mean - nearest,
            None => 0.,
        };
        let tau_norm = self.ctx.oracle.cost_to(location) / self.mean_extent;
        array![err * err, std * std, tau_norm]
    }

    fn weights(&self) -> Array1<f64> {
        array![self.weights.mean, self.weights.std, self.weights.delay]
    }

    fn cost(&self, location: &Location) -> f64 {
        if self.ctx.grid.is_occupied(location) {
            return f64::INFINITY;
        }
        let values = self.values(location);
        if values.iter().any(|v| v.is_infinite()) {
            return f64::INFINITY;
        }
        let n = self.ctx.samples.len() as f64;
        let n_scale = 1. / (1. + (-0.5 * (n - 10.)).exp());
        let gain = self.weights.mean * values[0] + self.weights.std * values[1];
        let damping = 1. + self.weights.delay * n_scale * values[2] * values[2];
        -gain / damping
    }
}
