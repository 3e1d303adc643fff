use super::{check_weights, CostContext, SampleCost};
use crate::errors::Result;
use infosamp_gp::Sample;
use infosamp_map::Location;
use ndarray::{array, Array1, Array2};
use serde::{Deserialize, Serialize};

/// Side length of the evaluation grid the remaining variance is summed over.
const VAR_TRACE_GRID: usize = 20;

/// Weights of the [`VarTraceCost`] components
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarTraceWeights {
    /// Penalty on the posterior variance left after the hypothetical sample
    pub var: f64,
    /// Penalty on travel cost
    pub travel: f64,
}

impl Default for VarTraceWeights {
    fn default() -> VarTraceWeights {
        VarTraceWeights {
            var: 1.,
            travel: 1.,
        }
    }
}

impl VarTraceWeights {
    pub(crate) fn check(&self) -> Result<()> {
        check_weights(
            "var-trace",
            &[("var", self.var), ("travel", self.travel)],
        )
    }
}

/// Scores a candidate by the total posterior variance that would remain after
/// sampling it, plus the travel cost of getting there.
///
/// Each evaluation refits a hypothetical belief holding the candidate and sums
/// the predicted variance of the first quantity over a fixed grid of domain
/// points, so the preferred candidate is the one whose measurement shrinks the
/// belief spread the most.
pub struct VarTraceCost<'a> {
    ctx: CostContext<'a>,
    weights: VarTraceWeights,
    test_grid: Array2<f64>,
}

impl<'a> VarTraceCost<'a> {
    /// Cost over the given iteration context.
    pub fn new(ctx: CostContext<'a>, weights: VarTraceWeights) -> VarTraceCost<'a> {
        let bounds = ctx.grid.bounds();
        let extents = bounds.extents();
        let mut test_grid = Array2::zeros((VAR_TRACE_GRID * VAR_TRACE_GRID, 2));
        for i in 0..VAR_TRACE_GRID {
            for j in 0..VAR_TRACE_GRID {
                let row = i * VAR_TRACE_GRID + j;
                test_grid[(row, 0)] =
                    bounds.lower[0] + (i as f64 + 0.5) * extents[0] / VAR_TRACE_GRID as f64;
                test_grid[(row, 1)] =
                    bounds.lower[1] + (j as f64 + 0.5) * extents[1] / VAR_TRACE_GRID as f64;
            }
        }
        VarTraceCost {
            ctx,
            weights,
            test_grid,
        }
    }
}

impl SampleCost for VarTraceCost<'_> {
    fn name(&self) -> &'static str {
        "var-trace"
    }

    fn values(&self, location: &Location) -> Array1<f64> {
        if self.ctx.grid.is_occupied(location) {
            return Array1::from_elem(2, f64::INFINITY);
        }
        // posterior spread is independent of the observed value, so a
        // placeholder measurement works
        let hypothetical = match self
            .ctx
            .belief
            .hypothetical(&Sample::new(location.clone(), 0, 0.))
        {
            Ok(belief) => belief,
            Err(_) => return Array1::from_elem(2, f64::INFINITY),
        };
        let (_, stds) = match hypothetical.query_many(&self.test_grid, 0) {
            Ok(stats) => stats,
            Err(_) => return Array1::from_elem(2, f64::INFINITY),
        };
        array![
            stds.mapv(|s| s * s).sum(),
            self.ctx.oracle.cost_to(location),
        ]
    }

    fn weights(&self) -> Array1<f64> {
        array![self.weights.var, self.weights.travel]
    }
}
