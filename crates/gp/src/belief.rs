use crate::errors::{GpError, Result};
use crate::parameters::NoiseTuning;
use crate::MultiGp;

use infosamp_map::{Bounds, Location};
use linfa::prelude::{Dataset, Fit};
use log::warn;
use ndarray::{array, s, Array1, Array2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

/// One field measurement of a quantity at a location.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Sample {
    /// Where the measurement was taken
    pub location: Location,
    /// Index of the measured quantity
    pub quantity: usize,
    /// Measured value
    pub value: f64,
}

impl Sample {
    /// A measurement of `quantity` at `location` with the given value.
    pub fn new(location: Location, quantity: usize, value: f64) -> Sample {
        Sample {
            location,
            quantity,
            value,
        }
    }
}

/// Which samples feed the mean and spread estimates of a [`BeliefModel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum BeliefKind {
    /// One model conditioned on prior and mission samples together
    #[default]
    Simple,
    /// Mean from prior and mission samples together, spread from mission
    /// samples only, so already-surveyed regions still look unexplored
    Split,
}

/// Current belief about the surveyed field, one posterior per quantity.
///
/// Wraps one or two [`MultiGp`] models fitted on [`Sample`] sets. The mean
/// estimate always blends prior knowledge with mission samples; with
/// [`BeliefKind::Split`] the spread estimate ignores the prior so that the
/// mission is still drawn to regions only the prior has seen.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct BeliefModel {
    kind: BeliefKind,
    /// Conditioned on prior and mission samples
    combined: MultiGp<f64>,
    /// Conditioned on mission samples only, absent for [`BeliefKind::Simple`]
    current: Option<MultiGp<f64>>,
}

impl BeliefModel {
    /// Fit a belief over `prior` and `current` samples.
    ///
    /// Kernel hyperparameters start from data-driven guesses and are tuned by
    /// likelihood maximization. A fit that fails numerically is retried once
    /// with an inflated nugget before the error is propagated.
    pub fn fit(
        kind: BeliefKind,
        prior: &[Sample],
        current: &[Sample],
        bounds: &Bounds,
        noise: NoiseTuning<f64>,
    ) -> Result<BeliefModel> {
        if current.is_empty() {
            return Err(GpError::InvalidValueError(
                "at least one mission sample is required".to_string(),
            ));
        }
        let all: Vec<Sample> = prior.iter().chain(current.iter()).cloned().collect();
        let n_outputs = 1 + all.iter().map(|sample| sample.quantity).max().unwrap_or(0);
        let combined = fit_samples(&all, n_outputs, bounds, noise)?;
        let current_model = match kind {
            BeliefKind::Simple => None,
            BeliefKind::Split => Some(fit_samples(current, n_outputs, bounds, noise)?),
        };
        Ok(BeliefModel {
            kind,
            combined,
            current: current_model,
        })
    }

    /// Posterior mean and standard deviation of one quantity at one location.
    pub fn query(&self, location: &Location, quantity: usize) -> Result<(f64, f64)> {
        let x = augment_one(location, quantity);
        let mean = self.combined.predict(&x)?[0];
        let var = self.spread_model().predict_var(&x)?[0];
        Ok((mean, var.max(0.).sqrt()))
    }

    /// Posterior mean and standard deviation of every quantity at one
    /// location, each as a vector of length [`BeliefModel::num_quantities`].
    pub fn query_all(&self, location: &Location) -> Result<(Array1<f64>, Array1<f64>)> {
        let t = self.num_quantities();
        let d = location.len();
        let mut x = Array2::zeros((t, d + 1));
        for q in 0..t {
            x.slice_mut(s![q, ..d]).assign(location);
            x[(q, d)] = q as f64;
        }
        let means = self.combined.predict(&x)?;
        let vars = self.spread_model().predict_var(&x)?;
        Ok((means, vars.mapv(|v| v.max(0.).sqrt())))
    }

    /// Posterior mean and standard deviation of one quantity at n locations
    /// given as a (n, ndim) matrix.
    pub fn query_many(
        &self,
        locations: &Array2<f64>,
        quantity: usize,
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        let (n, d) = locations.dim();
        let mut x = Array2::zeros((n, d + 1));
        x.slice_mut(s![.., ..d]).assign(locations);
        x.column_mut(d).fill(quantity as f64);
        let means = self.combined.predict(&x)?;
        let vars = self.spread_model().predict_var(&x)?;
        Ok((means, vars.mapv(|v| v.max(0.).sqrt())))
    }

    /// Correlation implied by the fitted coregionalization between quantity 0
    /// and every other quantity, as a vector of length `num_quantities - 1`.
    pub fn correlations(&self) -> Array1<f64> {
        self.combined.output_correlations()
    }

    /// Number of quantities the belief jointly models
    pub fn num_quantities(&self) -> usize {
        self.combined.n_outputs()
    }

    /// How prior and mission samples are blended
    pub fn kind(&self) -> BeliefKind {
        self.kind
    }

    /// Belief updated as if `sample` had also been taken, keeping the fitted
    /// hyperparameters.
    pub fn hypothetical(&self, sample: &Sample) -> Result<BeliefModel> {
        let x = augment_one(&sample.location, sample.quantity);
        let y = array![sample.value];
        let combined = self.combined.hypothetical(&x, &y)?;
        let current = match &self.current {
            Some(model) => Some(model.hypothetical(&x, &y)?),
            None => None,
        };
        Ok(BeliefModel {
            kind: self.kind,
            combined,
            current,
        })
    }

    fn spread_model(&self) -> &MultiGp<f64> {
        match &self.current {
            Some(model) => model,
            None => &self.combined,
        }
    }
}

fn augment_one(location: &Location, quantity: usize) -> Array2<f64> {
    let d = location.len();
    let mut x = Array2::zeros((1, d + 1));
    x.slice_mut(s![0, ..d]).assign(location);
    x[(0, d)] = quantity as f64;
    x
}

fn to_training_arrays(samples: &[Sample], ndim: usize) -> (Array2<f64>, Array1<f64>) {
    let mut x = Array2::zeros((samples.len(), ndim + 1));
    let mut y = Array1::zeros(samples.len());
    for (i, sample) in samples.iter().enumerate() {
        x.slice_mut(s![i, ..ndim]).assign(&sample.location);
        x[(i, ndim)] = sample.quantity as f64;
        y[i] = sample.value;
    }
    (x, y)
}

/// Data-driven initial guess `[sigma.., length_scale]`.
///
/// Output scales start from the spread of observed values, the length scale
/// from the spread of visited locations. With too few samples for either
/// statistic, the value magnitude and the domain extent stand in.
fn initial_theta(x: &Array2<f64>, y: &Array1<f64>, n_outputs: usize, bounds: &Bounds) -> Array1<f64> {
    let n = y.len();
    let y_std = if n > 1 { y.std(0.) } else { 0. };
    let sigma0 = if y_std > 0. {
        y_std / SQRT_2
    } else {
        y.mean().unwrap_or(0.).abs().max(1.) / SQRT_2
    };

    let d = x.ncols() - 1;
    let mut ell0 = 0.;
    if n > 1 {
        for j in 0..d {
            ell0 += x.column(j).std(0.);
        }
        ell0 /= d as f64;
    }
    if ell0 <= 0. {
        ell0 = bounds.extents().mean().unwrap_or(1.) / 4.;
    }

    let n_sigma = n_outputs * (n_outputs + 1) / 2;
    let mut theta = Array1::from_elem(n_sigma + 1, sigma0);
    theta[n_sigma] = ell0;
    theta
}

fn fit_samples(
    samples: &[Sample],
    n_outputs: usize,
    bounds: &Bounds,
    noise: NoiseTuning<f64>,
) -> Result<MultiGp<f64>> {
    let (x, y) = to_training_arrays(samples, bounds.ndim());
    let theta0 = initial_theta(&x, &y, n_outputs, bounds);
    let dataset = Dataset::new(x, y);

    let fitted = MultiGp::params()
        .n_outputs(Some(n_outputs))
        .theta_init(theta0.to_owned())
        .noise(noise)
        .fit(&dataset);
    match fitted {
        Ok(model) => Ok(model),
        Err(err) => {
            // one retry with a jitter scaled to the process variance
            let sigma0_sq = theta0
                .slice(s![..theta0.len() - 1])
                .mapv(|v| v * v)
                .mean()
                .unwrap_or(1.);
            let jitter = 100. * f64::EPSILON * (1. + sigma0_sq) * 1e3;
            warn!(
                "Belief fit failed ({err}), retrying with jitter {jitter:e}: theta0={theta0} x={} y={}",
                dataset.records(),
                dataset.targets()
            );
            MultiGp::params()
                .n_outputs(Some(n_outputs))
                .theta_init(theta0)
                .noise(noise)
                .nugget(jitter)
                .fit(&dataset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn unit_bounds() -> Bounds {
        Bounds::new(array![0., 0.], array![1., 1.]).unwrap()
    }

    #[test]
    fn test_initial_guess_from_single_sample() {
        let bounds = Bounds::new(array![0., 0.], array![2., 2.]).unwrap();
        let x = array![[1., 1., 0.]];
        let y = array![3.0];
        let theta = initial_theta(&x, &y, 1, &bounds);
        // value magnitude and domain extent stand in for missing spreads
        assert_abs_diff_eq!(theta[0], 3. / SQRT_2, epsilon = 1e-9);
        assert_abs_diff_eq!(theta[1], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_initial_guess_from_spreads() {
        let x = array![[0., 0., 0.], [1., 1., 0.]];
        let y = array![0., 2.];
        let theta = initial_theta(&x, &y, 1, &unit_bounds());
        assert_abs_diff_eq!(theta[0], 1. / SQRT_2, epsilon = 1e-9);
        assert_abs_diff_eq!(theta[1], 0.5, epsilon = 1e-9);

        // small near-constant values fall back to a unit scale
        let y = array![0.5, 0.5];
        let theta = initial_theta(&x, &y, 1, &unit_bounds());
        assert_abs_diff_eq!(theta[0], 1. / SQRT_2, epsilon = 1e-9);
    }

    #[test]
    fn test_initial_guess_sized_for_outputs() {
        let x = array![[0., 0., 0.], [1., 1., 1.]];
        let y = array![0., 2.];
        let theta = initial_theta(&x, &y, 2, &unit_bounds());
        assert_eq!(theta.len(), 4);
        assert_abs_diff_eq!(theta[0], theta[1]);
        assert_abs_diff_eq!(theta[0], theta[2]);
    }

    #[test]
    fn test_fit_requires_mission_samples() {
        let prior = vec![Sample::new(array![0.5, 0.5], 0, 1.0)];
        let result = BeliefModel::fit(
            BeliefKind::Simple,
            &prior,
            &[],
            &unit_bounds(),
            NoiseTuning::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_single_sample_is_reproduced() {
        let current = vec![Sample::new(array![0.5, 0.5], 0, 3.0)];
        let belief = BeliefModel::fit(
            BeliefKind::Simple,
            &[],
            &current,
            &unit_bounds(),
            NoiseTuning::Fixed(1e-3),
        )
        .expect("belief fit");

        assert_eq!(belief.num_quantities(), 1);
        let (mean, std_near) = belief.query(&array![0.5, 0.5], 0).expect("query");
        assert_abs_diff_eq!(mean, 3.0, epsilon = 1e-2);
        let (_, std_far) = belief.query(&array![0.05, 0.05], 0).expect("query");
        assert!(std_far > std_near);
    }

    #[test]
    fn test_split_blends_prior_mean_but_not_spread() {
        let prior = vec![Sample::new(array![0.1, 0.1], 0, 10.0)];
        let current = vec![
            Sample::new(array![0.8, 0.8], 0, 0.0),
            Sample::new(array![0.9, 0.9], 0, 1.0),
        ];

        let split = BeliefModel::fit(
            BeliefKind::Split,
            &prior,
            &current,
            &unit_bounds(),
            NoiseTuning::Fixed(1e-3),
        )
        .expect("belief fit");

        // the prior value shapes the mean
        let (mean_prior_loc, std_prior_loc) = split.query(&array![0.1, 0.1], 0).expect("query");
        assert_abs_diff_eq!(mean_prior_loc, 10.0, epsilon = 0.5);
        // but not the spread, which only mission samples can reduce
        let (_, std_current_loc) = split.query(&array![0.9, 0.9], 0).expect("query");
        assert!(std_prior_loc > 0.05);
        assert!(std_current_loc < 0.05);

        // a simple belief treats the prior location as surveyed
        let simple = BeliefModel::fit(
            BeliefKind::Simple,
            &prior,
            &current,
            &unit_bounds(),
            NoiseTuning::Fixed(1e-3),
        )
        .expect("belief fit");
        let (_, simple_std_prior_loc) = simple.query(&array![0.1, 0.1], 0).expect("query");
        assert!(simple_std_prior_loc < 0.05);
    }

    #[test]
    fn test_split_query_matches_submodel_queries() {
        let prior = vec![Sample::new(array![0.2, 0.8], 0, 4.0)];
        let current = vec![
            Sample::new(array![0.3, 0.3], 0, 1.0),
            Sample::new(array![0.7, 0.6], 0, 2.0),
        ];
        let split = BeliefModel::fit(
            BeliefKind::Split,
            &prior,
            &current,
            &unit_bounds(),
            NoiseTuning::Fixed(1e-3),
        )
        .expect("belief fit");

        // the blend takes the mean from the combined model and the spread
        // from the current one, each exactly as the sub-model reports it
        for probe in [array![0.1, 0.1], array![0.5, 0.5], array![0.9, 0.2]] {
            let (mean, std) = split.query(&probe, 0).expect("query");
            let x = augment_one(&probe, 0);
            let direct_mean = split.combined.predict(&x).expect("prediction")[0];
            let direct_var = split
                .current
                .as_ref()
                .expect("split current model")
                .predict_var(&x)
                .expect("variance")[0];
            assert_abs_diff_eq!(mean, direct_mean, epsilon = 1e-12);
            assert_abs_diff_eq!(std, direct_var.max(0.).sqrt(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_spread_grows_with_distance_from_the_sample() {
        let current = vec![Sample::new(array![0.1, 0.5], 0, 1.0)];
        let belief = BeliefModel::fit(
            BeliefKind::Simple,
            &[],
            &current,
            &unit_bounds(),
            NoiseTuning::Fixed(1e-3),
        )
        .expect("belief fit");

        let mut last = 0.;
        for radius in [0.05, 0.1, 0.2, 0.4, 0.8] {
            let (_, std) = belief.query(&array![0.1 + radius, 0.5], 0).expect("query");
            assert!(std > last);
            last = std;
        }
    }

    #[test]
    fn test_correlations_length_and_range() {
        let mut current = Vec::new();
        for &(x, y) in &[(0.2, 0.2), (0.5, 0.8), (0.8, 0.3)] {
            let base = x + y;
            current.push(Sample::new(array![x, y], 0, base));
            current.push(Sample::new(array![x, y], 1, 2. * base + 0.1));
        }
        let belief = BeliefModel::fit(
            BeliefKind::Simple,
            &[],
            &current,
            &unit_bounds(),
            NoiseTuning::Fixed(1e-3),
        )
        .expect("belief fit");

        assert_eq!(belief.num_quantities(), 2);
        let rho = belief.correlations();
        assert_eq!(rho.len(), 1);
        assert!(rho[0].abs() <= 1.0 + 1e-9);

        let (means, stds) = belief.query_all(&array![0.2, 0.2]).expect("query");
        assert_eq!(means.len(), 2);
        assert_eq!(stds.len(), 2);
        assert_abs_diff_eq!(means[0], 0.4, epsilon = 0.2);
    }

    #[test]
    fn test_hypothetical_sample_reduces_spread() {
        let current = vec![
            Sample::new(array![0.2, 0.2], 0, 1.0),
            Sample::new(array![0.4, 0.4], 0, 2.0),
        ];
        let belief = BeliefModel::fit(
            BeliefKind::Simple,
            &[],
            &current,
            &unit_bounds(),
            NoiseTuning::Fixed(1e-3),
        )
        .expect("belief fit");

        let probe = array![0.9, 0.9];
        let (_, std_before) = belief.query(&probe, 0).expect("query");
        let updated = belief
            .hypothetical(&Sample::new(probe.to_owned(), 0, 0.0))
            .expect("hypothetical");
        let (_, std_after) = updated.query(&probe, 0).expect("query");
        assert!(std_after < std_before);
        assert_eq!(updated.num_quantities(), belief.num_quantities());
    }
}
