use crate::errors::{GpError, Result};
use crate::GP_SIMPLEX_MAX_ITER;
use linfa::{Float, ParamGuard};

use ndarray::{array, Array1};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Tuning of the kernel hyperparameters `[sigma.., length_scale]`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum ThetaTuning<F: Float> {
    /// Constant parameters (ie given not estimated)
    Fixed(Array1<F>),
    /// Parameters estimated by likelihood maximization from the given initial guess
    Estimated(Array1<F>),
}

impl<F: Float> Default for ThetaTuning<F> {
    fn default() -> Self {
        ThetaTuning::Estimated(array![
            F::cast(ThetaTuning::<F>::DEFAULT_SIGMA_INIT),
            F::cast(ThetaTuning::<F>::DEFAULT_LENGTH_INIT),
        ])
    }
}

impl<F: Float> ThetaTuning<F> {
    /// Default initial output scale
    pub const DEFAULT_SIGMA_INIT: f64 = 1.0;
    /// Default initial length scale
    pub const DEFAULT_LENGTH_INIT: f64 = 0.1;

    /// Get initial theta value
    pub fn init(&self) -> &Array1<F> {
        match self {
            ThetaTuning::Fixed(init) => init,
            ThetaTuning::Estimated(init) => init,
        }
    }

    /// Whether theta is estimated during fit
    pub fn is_estimated(&self) -> bool {
        matches!(self, ThetaTuning::Estimated(_))
    }
}

/// Tuning of the observation noise standard deviation
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum NoiseTuning<F: Float> {
    /// Noise held constant at the given value
    Fixed(F),
    /// Noise estimated by likelihood maximization from the given initial guess
    Estimated(F),
}

impl<F: Float> Default for NoiseTuning<F> {
    fn default() -> Self {
        NoiseTuning::Estimated(F::cast(NoiseTuning::<F>::DEFAULT_NOISE_INIT))
    }
}

impl<F: Float> NoiseTuning<F> {
    /// Default initial noise standard deviation
    pub const DEFAULT_NOISE_INIT: f64 = 1e-3;

    /// Get initial noise value
    pub fn value(&self) -> F {
        match self {
            NoiseTuning::Fixed(v) => *v,
            NoiseTuning::Estimated(v) => *v,
        }
    }

    /// Whether noise is estimated during fit
    pub fn is_estimated(&self) -> bool {
        matches!(self, NoiseTuning::Estimated(_))
    }
}

/// A set of validated multi-output GP parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize",
        deserialize = "F: Deserialize<'de>"
    ))
)]
pub struct MultiGpValidParams<F: Float> {
    /// Tuning of the kernel hyperparameters
    pub(crate) theta_tuning: ThetaTuning<F>,
    /// Tuning of the observation noise
    pub(crate) noise: NoiseTuning<F>,
    /// Number of coupled quantities, inferred from the data when `None`
    pub(crate) n_outputs: Option<usize>,
    /// Max number of simplex iterations during likelihood maximization
    pub(crate) max_iters: usize,
    /// Parameter to improve numerical stability
    pub(crate) nugget: F,
}

impl<F: Float> Default for MultiGpValidParams<F> {
    fn default() -> MultiGpValidParams<F> {
        MultiGpValidParams {
            theta_tuning: ThetaTuning::default(),
            noise: NoiseTuning::default(),
            n_outputs: None,
            max_iters: GP_SIMPLEX_MAX_ITER,
            nugget: F::cast(100.0) * F::epsilon(),
        }
    }
}

impl<F: Float> MultiGpValidParams<F> {
    /// Get tuning of the kernel hyperparameters
    pub fn theta_tuning(&self) -> &ThetaTuning<F> {
        &self.theta_tuning
    }

    /// Get tuning of the observation noise
    pub fn noise(&self) -> &NoiseTuning<F> {
        &self.noise
    }

    /// Get the forced number of outputs if any
    pub fn n_outputs(&self) -> Option<usize> {
        self.n_outputs
    }

    /// Get the max number of simplex iterations
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Get nugget value
    pub fn nugget(&self) -> F {
        self.nugget
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [MultiGp algorithm](struct.MultiGp.html).
pub struct MultiGpParams<F: Float>(MultiGpValidParams<F>);

impl<F: Float> Default for MultiGpParams<F> {
    fn default() -> MultiGpParams<F> {
        MultiGpParams(MultiGpValidParams::default())
    }
}

impl<F: Float> MultiGpParams<F> {
    /// A constructor for multi-output GP parameters
    pub fn new() -> MultiGpParams<F> {
        Self(MultiGpValidParams::default())
    }

    /// A constructor from validated parameters
    pub fn new_from_valid(params: &MultiGpValidParams<F>) -> Self {
        Self(params.clone())
    }

    /// Set initial value for theta hyper parameters.
    ///
    /// When theta is estimated, the internal optimization is started from `theta_init`.
    /// When theta is fixed, this sets the theta constant value.
    pub fn theta_init(mut self, theta_init: Array1<F>) -> Self {
        self.0.theta_tuning = match self.0.theta_tuning {
            ThetaTuning::Estimated(_) => ThetaTuning::Estimated(theta_init),
            ThetaTuning::Fixed(_) => ThetaTuning::Fixed(theta_init),
        };
        self
    }

    /// Set theta hyper parameters tuning
    pub fn theta_tuning(mut self, theta_tuning: ThetaTuning<F>) -> Self {
        self.0.theta_tuning = theta_tuning;
        self
    }

    /// Set observation noise tuning
    pub fn noise(mut self, noise: NoiseTuning<F>) -> Self {
        self.0.noise = noise;
        self
    }

    /// Force the number of coupled quantities instead of inferring it from the data.
    pub fn n_outputs(mut self, n_outputs: Option<usize>) -> Self {
        self.0.n_outputs = n_outputs;
        self
    }

    /// Set the max number of simplex iterations during likelihood maximization
    pub fn max_iters(mut self, max_iters: usize) -> Self {
        self.0.max_iters = max_iters;
        self
    }

    /// Set nugget value.
    ///
    /// Nugget is used to improve numerical stability
    pub fn nugget(mut self, nugget: F) -> Self {
        self.0.nugget = nugget;
        self
    }
}

impl<F: Float> From<MultiGpValidParams<F>> for MultiGpParams<F> {
    fn from(valid: MultiGpValidParams<F>) -> Self {
        MultiGpParams(valid)
    }
}

impl<F: Float> ParamGuard for MultiGpParams<F> {
    type Checked = MultiGpValidParams<F>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let theta = self.0.theta_tuning.init();
        if theta.len() < 2 {
            return Err(GpError::InvalidValueError(format!(
                "theta holds the output scales and the length scale, expected at least 2 values, got {}",
                theta.len()
            )));
        }
        if theta.iter().any(|v| !v.is_finite() || *v <= F::zero()) {
            return Err(GpError::InvalidValueError(format!(
                "theta values should be finite and positive, got {theta}"
            )));
        }
        let noise = self.0.noise.value();
        if !noise.is_finite() || noise <= F::zero() {
            return Err(GpError::InvalidValueError(
                "noise should be finite and positive".to_string(),
            ));
        }
        if let Some(t) = self.0.n_outputs {
            if t == 0 {
                return Err(GpError::InvalidValueError(
                    "`n_outputs` cannot be 0!".to_string(),
                ));
            }
            let expected = t * (t + 1) / 2 + 1;
            if theta.len() != expected {
                return Err(GpError::InvalidValueError(format!(
                    "{t} outputs require {expected} theta values, got {}",
                    theta.len()
                )));
            }
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        let params = MultiGpParams::<f64>::new();
        let checked = params.check().expect("valid defaults");
        assert!(checked.theta_tuning().is_estimated());
        assert!(checked.noise().is_estimated());
        assert_eq!(checked.max_iters(), GP_SIMPLEX_MAX_ITER);
    }

    #[test]
    fn test_rejects_bad_theta() {
        let params = MultiGpParams::<f64>::new().theta_init(array![1.0]);
        assert!(params.check().is_err());
        let params = MultiGpParams::<f64>::new().theta_init(array![1.0, -0.5]);
        assert!(params.check().is_err());
    }

    #[test]
    fn test_rejects_mismatched_outputs() {
        // two outputs need 3 sigmas and a length scale
        let params = MultiGpParams::<f64>::new()
            .n_outputs(Some(2))
            .theta_init(array![1.0, 0.1]);
        assert!(params.check().is_err());
        let params = MultiGpParams::<f64>::new()
            .n_outputs(Some(2))
            .theta_init(array![1.0, 1.0, 1.0, 0.1]);
        assert!(params.check().is_ok());
    }

    #[test]
    fn test_fixed_tuning_keeps_values() {
        let params = MultiGpParams::<f64>::new()
            .theta_tuning(ThetaTuning::Fixed(array![2.0, 0.3]))
            .theta_init(array![1.5, 0.2])
            .check()
            .expect("valid params");
        assert!(!params.theta_tuning().is_estimated());
        assert_eq!(params.theta_tuning().init(), &array![1.5, 0.2]);
    }
}
