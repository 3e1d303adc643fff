use clap::Parser;

use infosamp_map::{Bounds, OccupancyGrid, RasterField};
use infosamp_mission::costs::{CostStrategy, DistScaledEigfWeights};
use infosamp_mission::{MapSampler, Mission, MissionConfig, Result, Sampler};
use ndarray::array;

/// A bell-shaped field peaking at the given spot
fn bell(peak: (f64, f64), width: f64) -> impl Fn(&ndarray::Array1<f64>) -> f64 {
    move |x| {
        let dx = x[0] - peak.0;
        let dy = x[1] - peak.1;
        (-(dx * dx + dy * dy) / (2. * width * width)).exp()
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 15)]
    samples: usize,
    #[arg(short, long)]
    outdir: Option<String>,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let bounds = Bounds::unit(2);
    let mut grid = OccupancyGrid::free((40, 40), bounds.clone());
    grid.occupy_rect(&array![0.55, 0.25], &array![0.75, 0.55]);

    // two correlated quantities: a concentration plume and the temperature
    // riding on it
    let concentration = RasterField::from_fn((40, 40), bounds.clone(), bell((0.35, 0.65), 0.18))?;
    let base = bell((0.35, 0.65), 0.18);
    let temperature = RasterField::from_fn((40, 40), bounds, move |x| 2. * base(x) + 0.5)?;
    let sampler = MapSampler::new(vec![concentration, temperature]);

    let mut config = MissionConfig::default()
        .num_samples(args.samples)
        .start_locations(vec![array![0.1, 0.1]])
        .strategy(CostStrategy::DistScaledEigf(
            DistScaledEigfWeights::default(),
        ))
        .seed(args.seed);
    if let Some(outdir) = args.outdir {
        config = config.outdir(outdir);
    }

    let result = Mission::new(&grid, &sampler, config)?.run()?;

    let peak = array![0.35, 0.65];
    if let Some(belief) = result.beliefs.last() {
        let (mean, std) = belief.query(&peak, 0)?;
        println!("Mission took {} samples", result.samples.len());
        println!(
            "Concentration at the true peak: predicted {mean:.3} (+/- {std:.3}), actual {:.3}",
            sampler.sample(&peak, 0)
        );
        println!(
            "Estimated cross-quantity correlations: {}",
            belief.correlations()
        );
    }

    Ok(())
}
