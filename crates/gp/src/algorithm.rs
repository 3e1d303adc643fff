use crate::errors::{GpError, Result};
use crate::kernel::CoregionalKernel;
use crate::optimization::{optimize_theta, NelderMeadParams};
use crate::parameters::{MultiGpParams, MultiGpValidParams, NoiseTuning, ThetaTuning};

use linfa::prelude::{Dataset, DatasetBase, Fit, Float, PredictInplace};
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{concatenate, s, Array1, Array2, ArrayBase, ArrayView1, Axis, Data, Ix1, Ix2};
use ndarray_stats::QuantileExt;

use log::debug;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Maximum number of simplex iterations for likelihood maximization
pub const GP_SIMPLEX_MAX_ITER: usize = 1000;

/// Internal parameters computed during training,
/// used later on in prediction computations
#[derive(Default, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub(crate) struct GpInnerParams<F: Float> {
    /// Cholesky factor of the observation covariance matrix \[K\]
    k_chol: Array2<F>,
    /// Solution of the linear equation system : \[K\] alpha = y
    alpha: Array2<F>,
}

impl<F: Float> Clone for GpInnerParams<F> {
    fn clone(&self) -> Self {
        Self {
            k_chol: self.k_chol.to_owned(),
            alpha: self.alpha.to_owned(),
        }
    }
}

/// A zero-mean Gaussian process over several co-located quantities.
///
/// Training inputs are augmented rows `[location..., quantity]` whose last
/// column holds the index of the measured quantity, so one model jointly
/// interpolates every quantity. The covariance between two measurements is
/// the [`CoregionalKernel`] applied to their locations and quantity indices,
/// plus the observation noise variance on the diagonal.
///
/// kernel hyperparameters (the coregionalization sigmas and the length
/// scale) and optionally the noise standard deviation are estimated by
/// minimizing the negative log marginal likelihood with an unconstrained
/// simplex search over their log10 values.
///
/// # Implementation
///
/// * Based on [ndarray](https://github.com/rust-ndarray/ndarray)
///   and [linfa](https://github.com/rust-ml/linfa) and strive to follow [linfa guidelines](https://github.com/rust-ml/linfa/blob/master/CONTRIBUTE.md)
/// * Models can be saved and loaded using [serde](https://serde.rs/).
///   See `serializable` feature section below.
///
/// # Features
///
/// ## serializable
///
/// The `serializable` feature enables the serialization of fitted models using the [`serde crate`](https://serde.rs/).
///
/// # Example
///
/// ```no_run
/// use infosamp_gp::{MultiGp, NoiseTuning};
/// use linfa::prelude::*;
/// use ndarray::array;
///
/// // two measurements of quantity 0 at two stations
/// let xt = array![[0.2, 0.3, 0.], [0.7, 0.6, 0.]];
/// let yt = array![1.4, 2.1];
///
/// let gp = MultiGp::<f64>::params()
///     .noise(NoiseTuning::Fixed(1e-3))
///     .fit(&Dataset::new(xt, yt))
///     .expect("belief model trained");
///
/// let (mean, var) = gp
///     .predict_valvar(&array![[0.5, 0.5, 0.]])
///     .expect("prediction");
/// ```
#[derive(Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize",
        deserialize = "F: Deserialize<'de>"
    ))
)]
pub struct MultiGp<F: Float> {
    /// Covariance structure over locations and quantity indices
    kernel: CoregionalKernel,
    /// Fitted kernel hyperparameters `[sigma.., length_scale]`
    theta: Array1<F>,
    /// Fitted observation noise standard deviation
    noise: F,
    /// Negative log marginal likelihood at the fitted hyperparameters.
    /// Maybe used to compare different trained models
    likelihood: F,
    /// Gaussian process internal fitted params
    inner_params: GpInnerParams<F>,
    /// Training dataset (augmented inputs, outputs)
    pub(crate) training_data: (Array2<F>, Array1<F>),
    /// Parameters used to fit this model
    pub(crate) params: MultiGpValidParams<F>,
}

impl<F: Float> Clone for MultiGp<F> {
    fn clone(&self) -> Self {
        Self {
            kernel: self.kernel.clone(),
            theta: self.theta.to_owned(),
            noise: self.noise,
            likelihood: self.likelihood,
            inner_params: self.inner_params.clone(),
            training_data: self.training_data.clone(),
            params: self.params.clone(),
        }
    }
}

impl<F: Float> fmt::Display for MultiGp<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "MultiGp(kernel={}, theta={}, noise={}, likelihood={})",
            self.kernel, self.theta, self.noise, self.likelihood,
        )
    }
}

impl<F: Float> MultiGp<F> {
    /// Multi-output GP parameters constructor
    pub fn params() -> MultiGpParams<F> {
        MultiGpParams::new()
    }

    /// Predict posterior mean values at n given augmented `x` points
    /// specified as a (n, nx) matrix. Returns n scalar values as a vector (n,).
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check_query(x)?;
        let (sigma, length_scale) = self.split_theta();
        let k_star = self
            .kernel
            .value(x, &self.training_data.0, &sigma, length_scale);
        Ok(k_star.dot(&self.inner_params.alpha).remove_axis(Axis(1)))
    }

    /// Predict posterior variance values at n given augmented `x` points
    /// specified as a (n, nx) matrix. Returns n variance values as a vector (n,).
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check_query(x)?;
        let (sigma, length_scale) = self.split_theta();
        let k_star = self
            .kernel
            .value(x, &self.training_data.0, &sigma, length_scale);
        self.posterior_var(x, &sigma, k_star)
    }

    /// Predict both posterior mean and variance at n given augmented `x` points
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        self.check_query(x)?;
        let (sigma, length_scale) = self.split_theta();
        let k_star = self
            .kernel
            .value(x, &self.training_data.0, &sigma, length_scale);
        let mean = k_star.dot(&self.inner_params.alpha).remove_axis(Axis(1));
        let var = self.posterior_var(x, &sigma, k_star)?;
        Ok((mean, var))
    }

    fn posterior_var(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        sigma: &ArrayView1<F>,
        k_star: Array2<F>,
    ) -> Result<Array1<F>> {
        let kt = k_star.reversed_axes();
        let v = self.inner_params.k_chol.solve_triangular(&kt, UPLO::Lower)?;
        let prior = self.kernel.prior_variance(x, sigma);
        let mse = prior - v.mapv(|t| t * t).sum_axis(Axis(0));
        // Variance might be slightly negative depending on
        // machine precision: set to zero in that case
        Ok(mse.mapv(|v| if v < F::zero() { F::zero() } else { v }))
    }

    /// A model re-conditioned as if `(x, y)` had also been observed,
    /// keeping the fitted hyperparameters.
    pub fn hypothetical(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<MultiGp<F>> {
        self.check_query(x)?;
        let xt = concatenate![Axis(0), self.training_data.0.view(), x.view()];
        let yt = concatenate![Axis(0), self.training_data.1.view(), y.view()];
        MultiGpParams::new_from_valid(&self.params)
            .theta_tuning(ThetaTuning::Fixed(self.theta.to_owned()))
            .noise(NoiseTuning::Fixed(self.noise))
            .n_outputs(Some(self.kernel.n_outputs()))
            .fit(&Dataset::new(xt, yt))
    }

    /// Number of coupled quantities
    pub fn n_outputs(&self) -> usize {
        self.kernel.n_outputs()
    }

    /// Fitted kernel hyperparameters `[sigma.., length_scale]`
    pub fn theta(&self) -> &Array1<F> {
        &self.theta
    }

    /// Fitted observation noise standard deviation
    pub fn noise(&self) -> F {
        self.noise
    }

    /// Negative log marginal likelihood at the fitted hyperparameters
    pub fn likelihood(&self) -> F {
        self.likelihood
    }

    /// Fitted coregionalization matrix `A`
    pub fn coregionalization(&self) -> Array2<F> {
        let (sigma, _) = self.split_theta();
        self.kernel.coregionalization(&sigma)
    }

    /// Correlation implied by the fitted coregionalization between quantity 0
    /// and every other quantity, as a vector of length `n_outputs - 1`.
    pub fn output_correlations(&self) -> Array1<F> {
        let a = self.coregionalization();
        let t = self.kernel.n_outputs();
        let mut rho = Array1::zeros(t.saturating_sub(1));
        for i in 1..t {
            rho[i - 1] = a[(0, i)] / (a[(0, 0)] * a[(i, i)]).sqrt();
        }
        rho
    }

    fn split_theta(&self) -> (ArrayView1<'_, F>, F) {
        let n_sigma = self.kernel.n_sigma();
        (
            self.theta.slice(s![..n_sigma]),
            self.theta[self.theta.len() - 1],
        )
    }

    fn check_query(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
        if x.ncols() != self.training_data.0.ncols() {
            return Err(GpError::InvalidValueError(format!(
                "query points should have {} columns like the training inputs, got {}",
                self.training_data.0.ncols(),
                x.ncols()
            )));
        }
        Ok(())
    }
}

impl<F: Float> MultiGpValidParams<F> {
    /// Zero-mean negative log marginal likelihood at the given hyperparameters,
    /// together with the conditioning terms reused for prediction.
    fn negative_log_likelihood(
        &self,
        kernel: &CoregionalKernel,
        xt: &Array2<F>,
        yt: &Array1<F>,
        theta: &Array1<F>,
        noise: F,
    ) -> Result<(F, GpInnerParams<F>)> {
        let sigma = theta.slice(s![..kernel.n_sigma()]);
        let length_scale = theta[theta.len() - 1];
        let mut k_mx = kernel.value(xt, xt, &sigma, length_scale);
        let diag = noise * noise + self.nugget();
        for i in 0..k_mx.nrows() {
            k_mx[(i, i)] = k_mx[(i, i)] + diag;
        }

        let k_chol = k_mx.cholesky()?;
        let y_mx = yt.to_owned().insert_axis(Axis(1));
        let z = k_chol.solve_triangular(&y_mx, UPLO::Lower)?;
        let data_fit = F::cast(0.5) * z.mapv(|v| v * v).sum();
        let alpha = k_chol.t().solve_triangular_into(z, UPLO::Upper)?;

        let mut half_log_det = F::zero();
        for i in 0..k_chol.nrows() {
            half_log_det = half_log_det + k_chol[(i, i)].ln();
        }
        let n = F::cast(yt.len() as f64);
        let nll =
            data_fit + half_log_det + F::cast(0.5) * n * F::cast((2. * std::f64::consts::PI).ln());
        if !nll.is_finite() {
            return Err(GpError::LikelihoodComputationError(format!(
                "non finite likelihood for theta={theta} noise={noise}"
            )));
        }
        Ok((nll, GpInnerParams { k_chol, alpha }))
    }
}

impl<F: Float, D: Data<Elem = F>> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError>
    for MultiGpValidParams<F>
{
    type Object = MultiGp<F>;

    /// Fit a multi-output GP on the given augmented dataset, estimating the
    /// kernel hyperparameters by likelihood maximization when so tuned.
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let x = dataset.records();
        let y = dataset.targets();
        if x.nrows() == 0 {
            return Err(GpError::InvalidValueError(
                "at least one training sample is required".to_string(),
            ));
        }
        if x.ncols() < 2 {
            return Err(GpError::InvalidValueError(format!(
                "augmented inputs need location columns and a quantity column, got {} columns",
                x.ncols()
            )));
        }
        if x.nrows() != y.len() {
            return Err(GpError::InvalidValueError(format!(
                "{} training inputs for {} training outputs",
                x.nrows(),
                y.len()
            )));
        }
        let xt = x.to_owned();
        let yt = y.to_owned();

        let n_outputs = match self.n_outputs() {
            Some(t) => t,
            None => {
                let max_q = *xt.column(xt.ncols() - 1).max().map_err(|_| {
                    GpError::InvalidValueError("quantity indices should be comparable".to_string())
                })?;
                max_q.to_usize().unwrap_or(0) + 1
            }
        };
        let kernel = CoregionalKernel::new(n_outputs);
        let theta0 = self.theta_tuning().init().to_owned();
        if theta0.len() != kernel.n_sigma() + 1 {
            return Err(GpError::InvalidValueError(format!(
                "{} outputs require {} theta values, got {}",
                n_outputs,
                kernel.n_sigma() + 1,
                theta0.len()
            )));
        }

        let opt_theta = self.theta_tuning().is_estimated();
        let opt_noise = self.noise().is_estimated();
        let noise0 = self.noise().value();

        let unpack = |packed: &Array1<F>| -> (Array1<F>, F) {
            match (opt_theta, opt_noise) {
                (true, true) => (
                    packed.slice(s![..packed.len() - 1]).to_owned(),
                    packed[packed.len() - 1],
                ),
                (true, false) => (packed.to_owned(), noise0),
                (false, true) => (theta0.clone(), packed[0]),
                (false, false) => (theta0.clone(), noise0),
            }
        };

        let now = Instant::now();
        let (theta, noise) = if opt_theta || opt_noise {
            let base: f64 = 10.;
            let objfn = |p: &[f64], _gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
                for v in p {
                    if v.is_nan() {
                        return f64::INFINITY;
                    }
                }
                let packed = Array1::from_shape_fn(p.len(), |i| F::cast(base.powf(p[i])));
                let (theta, noise) = unpack(&packed);
                match self.negative_log_likelihood(&kernel, &xt, &yt, &theta, noise) {
                    Ok((nll, _)) => nll.to_f64().unwrap_or(f64::INFINITY),
                    Err(_) => f64::INFINITY,
                }
            };

            // Estimated parameters enter the simplex as log10 values which
            // keeps sigmas, length scale and noise positive without bounds
            let mut p0: Vec<f64> = Vec::new();
            if opt_theta {
                p0.extend(
                    theta0
                        .iter()
                        .map(|v| v.to_f64().unwrap_or(f64::NAN).log10()),
                );
            }
            if opt_noise {
                p0.push(noise0.to_f64().unwrap_or(f64::NAN).log10());
            }
            let options = NelderMeadParams {
                max_iters: self.max_iters(),
                ..Default::default()
            };
            let (fmin, p_opt) = optimize_theta(objfn, &Array1::from_vec(p0), &options);
            if !fmin.is_finite() {
                return Err(GpError::LikelihoodComputationError(
                    "likelihood maximization failed on every simplex point".to_string(),
                ));
            }
            let packed = p_opt.mapv(|v| F::cast(base.powf(v)));
            unpack(&packed)
        } else {
            (theta0.to_owned(), noise0)
        };

        let (likelihood, inner_params) =
            self.negative_log_likelihood(&kernel, &xt, &yt, &theta, noise)?;
        debug!(
            "Belief fitted in {:?}: theta={} noise={} likelihood={}",
            now.elapsed(),
            theta,
            noise,
            likelihood
        );

        Ok(MultiGp {
            kernel,
            theta,
            noise,
            likelihood,
            inner_params,
            training_data: (xt, yt),
            params: self.clone(),
        })
    }
}

impl<F: Float, D: Data<Elem = F>> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for MultiGp<F> {
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );
        *y = self.predict(x).expect("MultiGp prediction");
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros((x.nrows(),))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_single_sample_reproduction() {
        let xt = array![[0.25, 0.25, 0.]];
        let yt = array![2.5];
        let gp = MultiGp::<f64>::params()
            .theta_tuning(ThetaTuning::Fixed(array![1.0, 0.3]))
            .noise(NoiseTuning::Fixed(1e-3))
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");
        let mean = gp.predict(&array![[0.25, 0.25, 0.]]).expect("prediction");
        assert_abs_diff_eq!(mean[0], 2.5, epsilon = 1e-3);
        let var = gp.predict_var(&array![[0.25, 0.25, 0.]]).expect("variance");
        assert_abs_diff_eq!(var[0], 0., epsilon = 1e-3);
    }

    #[test]
    fn test_interpolates_smooth_field() {
        let mut xt = Vec::new();
        let mut yt = Vec::new();
        for &xi in &[0., 0.5, 1.] {
            for &yi in &[0., 0.5, 1.] {
                xt.push([xi, yi, 0.]);
                yt.push(xi + 2. * yi);
            }
        }
        let xt = Array2::from_shape_vec((9, 3), xt.concat()).expect("training grid");
        let yt = Array1::from_vec(yt);
        let gp = MultiGp::<f64>::params()
            .theta_tuning(ThetaTuning::Fixed(array![1.0, 0.4]))
            .noise(NoiseTuning::Fixed(1e-3))
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");

        // training points are reproduced
        let mean = gp
            .predict(&array![[0.5, 0.5, 0.], [1., 1., 0.]])
            .expect("prediction");
        assert_abs_diff_eq!(mean[0], 1.5, epsilon = 0.05);
        assert_abs_diff_eq!(mean[1], 3.0, epsilon = 0.05);

        // spread shrinks near data and grows far from it
        let var = gp
            .predict_var(&array![[0.25, 0.25, 0.], [3., 3., 0.]])
            .expect("variance");
        assert!(var[0] < var[1]);
        assert_abs_diff_eq!(var[1], 1., epsilon = 1e-2);
    }

    #[test]
    fn test_estimation_not_worse_than_initial_guess() {
        let xt = array![
            [0.1, 0.1, 0.],
            [0.4, 0.2, 0.],
            [0.8, 0.9, 0.],
            [0.3, 0.7, 0.],
            [0.6, 0.5, 0.]
        ];
        let yt = array![0.3, 0.5, 1.2, 0.8, 0.9];
        let init = array![0.8, 0.2];

        let fixed = MultiGp::<f64>::params()
            .theta_tuning(ThetaTuning::Fixed(init.to_owned()))
            .noise(NoiseTuning::Fixed(1e-2))
            .fit(&Dataset::new(xt.to_owned(), yt.to_owned()))
            .expect("GP fit error");
        let tuned = MultiGp::<f64>::params()
            .theta_tuning(ThetaTuning::Estimated(init))
            .noise(NoiseTuning::Fixed(1e-2))
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");

        assert!(tuned.likelihood() <= fixed.likelihood() + 1e-9);
    }

    #[test]
    fn test_two_quantities_share_information() {
        let xt = array![
            [0.2, 0.2, 0.],
            [0.8, 0.8, 0.],
            [0.2, 0.2, 1.],
            [0.8, 0.8, 1.]
        ];
        let yt = array![1.0, 2.0, 2.1, 4.2];
        let gp = MultiGp::<f64>::params()
            .theta_tuning(ThetaTuning::Fixed(array![1.0, 0.5, 0.5, 0.3]))
            .noise(NoiseTuning::Fixed(1e-3))
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");

        // the number of quantities is read off the quantity column
        assert_eq!(gp.n_outputs(), 2);

        let rho = gp.output_correlations();
        assert_eq!(rho.len(), 1);
        // A = [[1.0, 0.5], [0.5, 0.5]] gives rho = 0.5 / sqrt(0.5)
        assert_abs_diff_eq!(rho[0], 0.5 / 0.5_f64.sqrt(), epsilon = 1e-3);

        let a = gp.coregionalization();
        assert_abs_diff_eq!(a[(0, 1)], a[(1, 0)], epsilon = 1e-12);
    }

    #[test]
    fn test_hypothetical_observation_removes_spread() {
        let gp = MultiGp::<f64>::params()
            .theta_tuning(ThetaTuning::Fixed(array![1.0, 0.3]))
            .noise(NoiseTuning::Fixed(1e-3))
            .fit(&Dataset::new(array![[0.2, 0.2, 0.]], array![1.0]))
            .expect("GP fit error");

        let probe = array![[0.8, 0.8, 0.]];
        let before = gp.predict_var(&probe).expect("variance")[0];
        let hyp = gp
            .hypothetical(&probe, &array![0.0])
            .expect("hypothetical fit");
        let after = hyp.predict_var(&probe).expect("variance")[0];

        assert!(before > 0.5);
        assert!(after < 1e-2);
        assert_abs_diff_eq!(hyp.theta(), gp.theta());
        // the original model is untouched
        assert_abs_diff_eq!(gp.predict_var(&probe).expect("variance")[0], before);
    }

    #[test]
    fn test_fit_rejects_bad_data() {
        let empty = Dataset::new(Array2::<f64>::zeros((0, 3)), Array1::<f64>::zeros(0));
        assert!(MultiGp::<f64>::params().fit(&empty).is_err());

        let no_quantity = Dataset::new(array![[0.5], [0.6]], array![1., 2.]);
        assert!(MultiGp::<f64>::params().fit(&no_quantity).is_err());

        // theta sized for one output cannot serve two
        let two_q = Dataset::new(array![[0.5, 0.5, 0.], [0.6, 0.6, 1.]], array![1., 2.]);
        let result = MultiGp::<f64>::params()
            .theta_tuning(ThetaTuning::Fixed(array![1.0, 0.3]))
            .fit(&two_q);
        assert!(result.is_err());
    }

    #[test]
    fn test_query_dimension_mismatch_is_an_error() {
        let gp = MultiGp::<f64>::params()
            .theta_tuning(ThetaTuning::Fixed(array![1.0, 0.3]))
            .noise(NoiseTuning::Fixed(1e-3))
            .fit(&Dataset::new(array![[0.2, 0.2, 0.]], array![1.0]))
            .expect("GP fit error");
        assert!(gp.predict(&array![[0.2, 0.2, 0.2, 0.]]).is_err());
    }
}
