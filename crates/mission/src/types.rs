use infosamp_gp::{BeliefModel, Sample};
use infosamp_map::{Location, OccupancyGrid, RasterField};

/// A source of field measurements, one scalar per quantity per location.
///
/// Missions borrow a sampler and call it synchronously once per observed
/// quantity; implementations are expected to be side-effect free beyond
/// returning the measured value.
pub trait Sampler {
    /// Number of quantities this sampler measures
    fn num_quantities(&self) -> usize;

    /// Measure one quantity at a location.
    ///
    /// `quantity` is in `0..num_quantities()`.
    fn sample(&self, location: &Location, quantity: usize) -> f64;

    /// Measure every quantity at a location
    fn sample_all(&self, location: &Location) -> Vec<f64> {
        (0..self.num_quantities())
            .map(|q| self.sample(location, q))
            .collect()
    }
}

/// Simulated sampler reading one ground-truth raster field per quantity.
pub struct MapSampler {
    fields: Vec<RasterField>,
}

impl MapSampler {
    /// A sampler over the given per-quantity fields.
    pub fn new(fields: Vec<RasterField>) -> MapSampler {
        MapSampler { fields }
    }
}

impl Sampler for MapSampler {
    fn num_quantities(&self) -> usize {
        self.fields.len()
    }

    fn sample(&self, location: &Location, quantity: usize) -> f64 {
        self.fields[quantity].value_at(location)
    }
}

/// Full history returned by a mission run
#[derive(Clone, Debug)]
pub struct MissionResult {
    /// Every sample taken, seeds first, in acquisition order
    pub samples: Vec<Sample>,
    /// Belief models refitted after each selector-driven iteration
    pub beliefs: Vec<BeliefModel>,
}

/// Read-only view of the mission state handed to the per-iteration visitor
pub struct MissionSnapshot<'a> {
    /// Selector-driven iteration number, starting at 1
    pub iteration: usize,
    /// Sample history so far, seeds included
    pub samples: &'a [Sample],
    /// Belief refitted on that history
    pub belief: &'a BeliefModel,
    /// Occupancy the mission plans against
    pub grid: &'a OccupancyGrid,
}
