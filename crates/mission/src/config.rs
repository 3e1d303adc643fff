use crate::costs::CostStrategy;
use crate::errors::{MissionError, Result};
use crate::optimizers::SwarmParams;
use infosamp_gp::{NoiseTuning, Sample};
use infosamp_map::{Location, PathConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Observation noise settings of the belief model
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseSpec {
    /// Noise standard deviation, either held fixed or used as initial guess
    pub value: f64,
    /// Whether the noise level is re-estimated at each belief fit
    pub learned: bool,
}

impl Default for NoiseSpec {
    fn default() -> NoiseSpec {
        NoiseSpec {
            value: 1e-3,
            learned: true,
        }
    }
}

impl NoiseSpec {
    pub(crate) fn tuning(&self) -> NoiseTuning<f64> {
        if self.learned {
            NoiseTuning::Estimated(self.value)
        } else {
            NoiseTuning::Fixed(self.value)
        }
    }
}

/// Mission settings
///
/// Collected with chained setters then handed to [`Mission::new`].
///
/// ```no_run
/// # use infosamp_mission::MissionConfig;
/// # use ndarray::array;
/// let config = MissionConfig::default()
///     .num_samples(15)
///     .start_locations(vec![array![0.1, 0.1]])
///     .seed(42);
/// ```
///
/// [`Mission::new`]: crate::Mission::new
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MissionConfig {
    /// Number of mission iterations, each one taking a sample of every quantity
    pub num_samples: usize,
    /// Sample cost family scoring candidate locations
    pub strategy: CostStrategy,
    /// Locations sampled before the first iteration to seed the belief
    pub start_locations: Vec<Location>,
    /// Samples from earlier campaigns blended into the belief mean
    pub prior_samples: Vec<Sample>,
    /// Observation noise settings
    pub noise: NoiseSpec,
    /// Particle swarm settings of the location selector
    pub swarm: SwarmParams,
    /// Path cost oracle settings
    pub path: PathConfig,
    /// Seed of the location selector random generator
    pub seed: Option<u64>,
    /// Pause between iterations, for missions shadowing a physical platform
    pub sleep: Option<Duration>,
    /// Directory where samples and settings are saved at mission end
    pub outdir: Option<String>,
}

impl Default for MissionConfig {
    fn default() -> MissionConfig {
        MissionConfig {
            num_samples: 10,
            strategy: CostStrategy::default(),
            start_locations: vec![],
            prior_samples: vec![],
            noise: NoiseSpec::default(),
            swarm: SwarmParams::default(),
            path: PathConfig::default(),
            seed: None,
            sleep: None,
            outdir: None,
        }
    }
}

impl MissionConfig {
    /// Sets the number of mission iterations
    pub fn num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    /// Sets the sample cost family
    pub fn strategy(mut self, strategy: CostStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the locations sampled before the first iteration
    pub fn start_locations(mut self, start_locations: Vec<Location>) -> Self {
        self.start_locations = start_locations;
        self
    }

    /// Sets the prior samples blended into the belief mean
    pub fn prior_samples(mut self, prior_samples: Vec<Sample>) -> Self {
        self.prior_samples = prior_samples;
        self
    }

    /// Sets the observation noise settings
    pub fn noise(mut self, noise: NoiseSpec) -> Self {
        self.noise = noise;
        self
    }

    /// Sets the particle swarm settings
    pub fn swarm(mut self, swarm: SwarmParams) -> Self {
        self.swarm = swarm;
        self
    }

    /// Sets the path cost oracle settings
    pub fn path(mut self, path: PathConfig) -> Self {
        self.path = path;
        self
    }

    /// Sets the seed of the location selector random generator
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets a pause between iterations
    pub fn sleep(mut self, sleep: Duration) -> Self {
        self.sleep = Some(sleep);
        self
    }

    /// Sets the directory where samples and settings are saved
    pub fn outdir(mut self, outdir: impl Into<String>) -> Self {
        self.outdir = Some(outdir.into());
        self
    }

    /// Disables saving
    pub fn no_outdir(mut self) -> Self {
        self.outdir = None;
        self
    }

    /// Checks the settings are usable, without looking at the map.
    pub fn check(&self) -> Result<()> {
        self.strategy.check()?;
        if self.start_locations.is_empty() {
            return Err(MissionError::InvalidConfigError(
                "at least one start location is required".to_string(),
            ));
        }
        if self.swarm.n_particles == 0 {
            return Err(MissionError::InvalidConfigError(
                "the swarm needs at least one particle".to_string(),
            ));
        }
        Ok(())
    }
}
