use crate::config::MissionConfig;
use crate::costs::CostContext;
use crate::errors::{MissionError, Result};
use crate::optimizers::minimize_swarm;
use crate::types::{MissionResult, MissionSnapshot, Sampler};
use env_logger::{Builder, Env};
use infosamp_gp::{BeliefKind, BeliefModel, Sample};
use infosamp_map::{OccupancyGrid, PathCostOracle};
use log::{debug, info, warn};
use ndarray::{s, Array2};
use ndarray_npy::write_npy;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

/// File where the sample history is saved, one row per sample
pub const SAMPLES_FILE: &str = "mission_samples.npy";
/// File where the mission settings are saved
pub const CONFIG_FILE: &str = "mission_config.json";

/// Sequential adaptive sampling mission over an occupied domain.
///
/// Each iteration scores candidate locations with the configured cost
/// strategy, steers a particle swarm to the cheapest reachable one, samples
/// every quantity there and refits the belief on the grown history. The
/// sensor is assumed to sit at the last sampled location, so travel costs are
/// recomputed from there at the next iteration.
///
/// ```no_run
/// use infosamp_map::{Bounds, OccupancyGrid, RasterField};
/// use infosamp_mission::{MapSampler, Mission, MissionConfig};
/// use ndarray::array;
///
/// let grid = OccupancyGrid::free((20, 20), Bounds::unit(2));
/// let field = RasterField::from_fn((20, 20), Bounds::unit(2), |x| x.sum()).unwrap();
/// let sampler = MapSampler::new(vec![field]);
/// let config = MissionConfig::default()
///     .num_samples(5)
///     .start_locations(vec![array![0.1, 0.1]])
///     .seed(42);
/// let result = Mission::new(&grid, &sampler, config)
///     .unwrap()
///     .run()
///     .unwrap();
/// println!("took {} samples", result.samples.len());
/// ```
pub struct Mission<'a, S: Sampler> {
    grid: &'a OccupancyGrid,
    sampler: &'a S,
    config: MissionConfig,
}

impl<'a, S: Sampler> Mission<'a, S> {
    /// Prepares a mission on the given map, checking the settings against it.
    ///
    /// Fails when the settings are inconsistent, when a start location is
    /// occupied or out of the domain, or when a prior sample lies out of the
    /// domain.
    pub fn new(grid: &'a OccupancyGrid, sampler: &'a S, config: MissionConfig) -> Result<Self> {
        let env = Env::new().filter_or("INFOSAMP_LOG", "info");
        let mut builder = Builder::from_env(env);
        let builder = builder.target(env_logger::Target::Stdout);
        builder.try_init().ok();

        config.check()?;
        if sampler.num_quantities() == 0 {
            return Err(MissionError::InvalidConfigError(
                "the sampler measures no quantity".to_string(),
            ));
        }
        for location in &config.start_locations {
            if !grid.bounds().contains(location) {
                return Err(MissionError::InvalidConfigError(format!(
                    "start location {location} is outside the domain"
                )));
            }
            if grid.is_occupied(location) {
                return Err(MissionError::InvalidConfigError(format!(
                    "start location {location} is occupied"
                )));
            }
        }
        for sample in &config.prior_samples {
            if !grid.bounds().contains(&sample.location) {
                return Err(MissionError::InvalidConfigError(format!(
                    "prior sample at {} is outside the domain",
                    sample.location
                )));
            }
        }
        Ok(Mission {
            grid,
            sampler,
            config,
        })
    }

    /// Runs the mission to completion.
    pub fn run(&self) -> Result<MissionResult> {
        self.run_with(|_| {})
    }

    /// Runs the mission, calling `visit` after each iteration with the state
    /// so far. Useful to drive displays or to stream the history out.
    pub fn run_with<V>(&self, mut visit: V) -> Result<MissionResult>
    where
        V: FnMut(&MissionSnapshot),
    {
        let n_quantities = self.sampler.num_quantities();
        let mut rng = if let Some(seed) = self.config.seed {
            Xoshiro256Plus::seed_from_u64(seed)
        } else {
            Xoshiro256Plus::from_entropy()
        };

        let mut samples: Vec<Sample> = vec![];
        for location in &self.config.start_locations {
            for quantity in 0..n_quantities {
                let value = self.sampler.sample(location, quantity);
                samples.push(Sample::new(location.clone(), quantity, value));
            }
        }
        let mut position = match self.config.start_locations.last() {
            Some(location) => location.clone(),
            None => {
                return Err(MissionError::InvalidConfigError(
                    "at least one start location is required".to_string(),
                ))
            }
        };

        let kind = if self.config.prior_samples.is_empty() {
            BeliefKind::Simple
        } else {
            BeliefKind::Split
        };
        let mut belief = self.fit_belief(kind, &samples)?;
        info!(
            "********* Initialization: {} seed samples at {} locations, {} strategy",
            samples.len(),
            self.config.start_locations.len(),
            self.config.strategy.name()
        );

        let mut beliefs = Vec::with_capacity(self.config.num_samples);
        for iteration in 1..=self.config.num_samples {
            info!(
                "********* Start iteration {}/{}",
                iteration, self.config.num_samples
            );
            let now = Instant::now();

            let (cost, location) = {
                let oracle = PathCostOracle::new(self.grid, &position, self.config.path);
                let scorer = self.config.strategy.build(CostContext {
                    grid: self.grid,
                    samples: &samples,
                    belief: &belief,
                    n_quantities,
                    oracle: &oracle,
                })?;
                minimize_swarm(
                    |x| {
                        if self.grid.is_occupied(x) {
                            f64::INFINITY
                        } else {
                            scorer.cost(x)
                        }
                    },
                    self.grid.bounds(),
                    &self.config.swarm,
                    &mut rng,
                )
            };
            // the swarm seeds one particle at the domain midpoint; when no
            // evaluation ever comes back finite that seed wins by default and
            // may sit on a blocked cell, in which case the sensor stays put
            let location = if self.grid.is_occupied(&location) {
                warn!("No feasible candidate found, staying at {position}");
                position.clone()
            } else {
                location
            };
            debug!("Selected x={location} at cost {cost}");

            for quantity in 0..n_quantities {
                let value = self.sampler.sample(&location, quantity);
                samples.push(Sample::new(location.clone(), quantity, value));
            }
            position = location;

            belief = self.fit_belief(kind, &samples)?;
            beliefs.push(belief.clone());
            info!(
                "********* End iteration {}/{} in {:.3}s: {} cost={} at x={}",
                iteration,
                self.config.num_samples,
                now.elapsed().as_secs_f64(),
                self.config.strategy.name(),
                cost,
                position
            );

            visit(&MissionSnapshot {
                iteration,
                samples: &samples,
                belief: &belief,
                grid: self.grid,
            });
            if let Some(pause) = self.config.sleep {
                std::thread::sleep(pause);
            }
        }

        if let Some(outdir) = &self.config.outdir {
            self.save(outdir, &samples)?;
        }
        info!(
            "Mission complete: {} samples taken over {} iterations",
            samples.len(),
            self.config.num_samples
        );
        Ok(MissionResult { samples, beliefs })
    }

    fn fit_belief(&self, kind: BeliefKind, samples: &[Sample]) -> Result<BeliefModel> {
        let belief = BeliefModel::fit(
            kind,
            &self.config.prior_samples,
            samples,
            self.grid.bounds(),
            self.config.noise.tuning(),
        )?;
        Ok(belief)
    }

    fn save(&self, outdir: &str, samples: &[Sample]) -> Result<()> {
        std::fs::create_dir_all(outdir)?;
        let ndim = self.grid.bounds().ndim();
        let mut history = Array2::zeros((samples.len(), ndim + 2));
        for (i, sample) in samples.iter().enumerate() {
            history.slice_mut(s![i, ..ndim]).assign(&sample.location);
            history[(i, ndim)] = sample.quantity as f64;
            history[(i, ndim + 1)] = sample.value;
        }
        write_npy(Path::new(outdir).join(SAMPLES_FILE), &history)?;
        let config = File::create(Path::new(outdir).join(CONFIG_FILE))?;
        serde_json::to_writer_pretty(config, &self.config)?;
        info!("Mission history saved in {outdir}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoiseSpec;
    use crate::optimizers::SwarmParams;
    use crate::types::MapSampler;
    use approx::assert_abs_diff_eq;
    use infosamp_map::{Bounds, RasterField};
    use ndarray::array;

    fn peak_field(shape: (usize, usize)) -> RasterField {
        RasterField::from_fn(shape, Bounds::unit(2), |x| {
            let dx = x[0] - 0.5;
            let dy = x[1] - 0.5;
            (-(dx * dx + dy * dy) / (2. * 0.15 * 0.15)).exp()
        })
        .expect("raster field")
    }

    fn quick_swarm() -> SwarmParams {
        SwarmParams {
            n_particles: 20,
            max_iters: 20,
            ..SwarmParams::default()
        }
    }

    #[test]
    fn test_mission_learns_the_peak() {
        let grid = OccupancyGrid::free((20, 20), Bounds::unit(2));
        let sampler = MapSampler::new(vec![peak_field((20, 20))]);
        let config = MissionConfig::default()
            .num_samples(3)
            .start_locations(vec![array![0.2, 0.2], array![0.5, 0.5], array![0.8, 0.8]])
            .noise(NoiseSpec {
                value: 1e-3,
                learned: false,
            })
            .swarm(quick_swarm())
            .seed(42);
        let result = Mission::new(&grid, &sampler, config)
            .expect("mission")
            .run()
            .expect("mission run");

        assert_eq!(result.samples.len(), 3 + 3);
        assert_eq!(result.beliefs.len(), 3);
        let belief = result.beliefs.last().expect("final belief");
        let peak = array![0.5, 0.5];
        let (mean, _) = belief.query(&peak, 0).expect("belief query");
        assert_abs_diff_eq!(mean, sampler.sample(&peak, 0), epsilon = 1e-1);
    }

    #[test]
    fn test_mean_only_weights_drive_to_the_peak() {
        use crate::costs::{BasicWeights, CostStrategy};
        let grid = OccupancyGrid::free((10, 10), Bounds::unit(2));
        // two quantities peaking at the same spot, on different scales
        let concentration = peak_field((10, 10));
        let temperature = RasterField::from_fn((10, 10), Bounds::unit(2), |x| {
            let dx = x[0] - 0.5;
            let dy = x[1] - 0.5;
            2. * (-(dx * dx + dy * dy) / (2. * 0.15 * 0.15)).exp() + 0.5
        })
        .expect("raster field");
        let sampler = MapSampler::new(vec![concentration, temperature]);

        let config = MissionConfig::default()
            .num_samples(2)
            .start_locations(vec![
                array![0.1, 0.1],
                array![0.9, 0.1],
                array![0.1, 0.9],
                array![0.9, 0.9],
                array![0.5, 0.5],
            ])
            .strategy(CostStrategy::Basic(BasicWeights {
                mean: 1.,
                std: 0.,
                travel: 0.,
                proximity: 0.,
            }))
            .noise(NoiseSpec {
                value: 1e-3,
                learned: false,
            })
            .swarm(quick_swarm())
            .seed(3);
        let result = Mission::new(&grid, &sampler, config)
            .expect("mission")
            .run()
            .expect("mission run");

        // with only the mean rewarded, the selector heads for the peak of the
        // belief mean surface, which the center seed pins at (0.5, 0.5)
        for sample in &result.samples[10..] {
            let off = (sample.location[0] - 0.5).hypot(sample.location[1] - 0.5);
            assert!(off < 0.15, "sampled {} away from the peak", sample.location);
        }
    }

    #[test]
    fn test_one_belief_per_iteration() {
        let grid = OccupancyGrid::free((10, 10), Bounds::unit(2));
        let sampler = MapSampler::new(vec![peak_field((10, 10))]);
        let config = MissionConfig::default()
            .num_samples(2)
            .start_locations(vec![array![0.1, 0.1]])
            .swarm(quick_swarm())
            .seed(0);
        let result = Mission::new(&grid, &sampler, config)
            .expect("mission")
            .run()
            .expect("mission run");
        assert_eq!(result.samples.len(), 1 + 2);
        assert_eq!(result.beliefs.len(), 2);
    }

    #[test]
    fn test_samples_avoid_occupied_cells() {
        let mut grid = OccupancyGrid::free((10, 10), Bounds::unit(2));
        grid.occupy_rect(&array![0.2, 0.2], &array![0.4, 0.4]);
        let sampler = MapSampler::new(vec![peak_field((10, 10))]);
        let config = MissionConfig::default()
            .num_samples(3)
            .start_locations(vec![array![0.7, 0.7]])
            .swarm(quick_swarm())
            .seed(7);
        let mut iterations = vec![];
        let result = Mission::new(&grid, &sampler, config)
            .expect("mission")
            .run_with(|snapshot| iterations.push((snapshot.iteration, snapshot.samples.len())))
            .expect("mission run");
        for sample in &result.samples {
            assert!(!grid.is_occupied(&sample.location));
        }
        assert_eq!(iterations, vec![(1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn test_infeasible_swarm_falls_back_to_current_position() {
        let mut grid = OccupancyGrid::free((10, 10), Bounds::unit(2));
        grid.occupy_rect(&array![0.45, 0.45], &array![0.55, 0.55]);
        let sampler = MapSampler::new(vec![peak_field((10, 10))]);
        // a single particle with no velocity updates only ever evaluates the
        // blocked midpoint, so every cost it sees is infinite
        let config = MissionConfig::default()
            .num_samples(1)
            .start_locations(vec![array![0.1, 0.1]])
            .noise(NoiseSpec {
                value: 1e-3,
                learned: false,
            })
            .swarm(SwarmParams {
                n_particles: 1,
                max_iters: 0,
                ..SwarmParams::default()
            })
            .seed(5);
        let result = Mission::new(&grid, &sampler, config)
            .expect("mission")
            .run()
            .expect("mission run");
        for sample in &result.samples {
            assert!(!grid.is_occupied(&sample.location));
        }
        // the sensor stayed where it was
        assert_eq!(result.samples.last().expect("sample").location, array![0.1, 0.1]);
    }

    #[test]
    fn test_new_rejects_bad_setups() {
        let mut grid = OccupancyGrid::free((10, 10), Bounds::unit(2));
        grid.occupy_rect(&array![0.4, 0.4], &array![0.6, 0.6]);
        let sampler = MapSampler::new(vec![peak_field((10, 10))]);

        let no_start = MissionConfig::default();
        assert!(Mission::new(&grid, &sampler, no_start).is_err());

        let occupied = MissionConfig::default().start_locations(vec![array![0.5, 0.5]]);
        assert!(Mission::new(&grid, &sampler, occupied).is_err());

        let outside = MissionConfig::default().start_locations(vec![array![1.5, 0.5]]);
        assert!(Mission::new(&grid, &sampler, outside).is_err());

        let no_quantities = MapSampler::new(vec![]);
        let config = MissionConfig::default().start_locations(vec![array![0.1, 0.1]]);
        assert!(Mission::new(&grid, &no_quantities, config).is_err());
    }

    #[test]
    fn test_final_belief_round_trips_through_json() {
        let grid = OccupancyGrid::free((10, 10), Bounds::unit(2));
        let sampler = MapSampler::new(vec![peak_field((10, 10))]);
        let config = MissionConfig::default()
            .num_samples(1)
            .start_locations(vec![array![0.3, 0.3]])
            .swarm(quick_swarm())
            .seed(9);
        let result = Mission::new(&grid, &sampler, config)
            .expect("mission")
            .run()
            .expect("mission run");

        let belief = result.beliefs.last().expect("final belief");
        let json = serde_json::to_string(belief).expect("serialize");
        let back: infosamp_gp::BeliefModel = serde_json::from_str(&json).expect("deserialize");

        let probe = array![0.5, 0.5];
        let (mean, std) = belief.query(&probe, 0).expect("query");
        let (mean_back, std_back) = back.query(&probe, 0).expect("query");
        assert_abs_diff_eq!(mean, mean_back);
        assert_abs_diff_eq!(std, std_back);
    }

    #[test]
    fn test_history_is_saved_in_outdir() {
        let outdir = "target/test_mission_outdir";
        let grid = OccupancyGrid::free((10, 10), Bounds::unit(2));
        let sampler = MapSampler::new(vec![peak_field((10, 10))]);
        let config = MissionConfig::default()
            .num_samples(1)
            .start_locations(vec![array![0.3, 0.3]])
            .swarm(quick_swarm())
            .seed(1)
            .outdir(outdir);
        Mission::new(&grid, &sampler, config)
            .expect("mission")
            .run()
            .expect("mission run");

        let history: Array2<f64> =
            ndarray_npy::read_npy(Path::new(outdir).join(SAMPLES_FILE)).expect("read history");
        assert_eq!(history.dim(), (2, 4));
        assert!(Path::new(outdir).join(CONFIG_FILE).exists());
        std::fs::remove_dir_all(outdir).expect("cleanup");
    }
}
