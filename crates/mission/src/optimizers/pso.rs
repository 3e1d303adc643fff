use infosamp_map::{Bounds, Location};
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand::Rng;
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Particle-swarm settings for the location selector
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwarmParams {
    /// Number of particles
    pub n_particles: usize,
    /// Number of velocity updates
    pub max_iters: usize,
    /// Velocity retention factor
    pub inertia: f64,
    /// Pull toward each particle's own best position
    pub cognitive: f64,
    /// Pull toward the swarm's best position
    pub social: f64,
}

impl Default for SwarmParams {
    fn default() -> SwarmParams {
        SwarmParams {
            n_particles: 40,
            max_iters: 60,
            inertia: 0.7298,
            cognitive: 1.49618,
            social: 1.49618,
        }
    }
}

/// Minimize `fun` over `bounds` with a bounded particle swarm.
///
/// The first particle starts at the domain midpoint, the rest uniformly in
/// bounds. Positions are clamped to the domain after every velocity update and
/// bests move only on strictly smaller values, so `+inf` evaluations steer the
/// swarm away without corrupting it. Candidate evaluations run in parallel.
///
/// Returns the best cost found and its location.
pub fn minimize_swarm<F>(
    fun: F,
    bounds: &Bounds,
    params: &SwarmParams,
    rng: &mut Xoshiro256Plus,
) -> (f64, Location)
where
    F: Fn(&Location) -> f64 + Sync,
{
    let ndim = bounds.ndim();
    let n = params.n_particles.max(1);

    let mut positions = Array2::zeros((n, ndim));
    positions.row_mut(0).assign(&bounds.midpoint());
    for i in 1..n {
        for j in 0..ndim {
            positions[(i, j)] =
                bounds.lower[j] + rng.gen::<f64>() * (bounds.upper[j] - bounds.lower[j]);
        }
    }
    let mut velocities: Array2<f64> = Array2::zeros((n, ndim));

    let mut best_positions = positions.to_owned();
    let mut best_costs = evaluate(&fun, &positions);
    let (mut leader, mut leader_cost) = swarm_best(&best_costs);

    for _ in 0..params.max_iters {
        let leader_position = best_positions.row(leader).to_owned();
        for i in 0..n {
            for j in 0..ndim {
                let r1 = rng.gen::<f64>();
                let r2 = rng.gen::<f64>();
                velocities[(i, j)] = params.inertia * velocities[(i, j)]
                    + params.cognitive * r1 * (best_positions[(i, j)] - positions[(i, j)])
                    + params.social * r2 * (leader_position[j] - positions[(i, j)]);
                positions[(i, j)] = (positions[(i, j)] + velocities[(i, j)])
                    .max(bounds.lower[j])
                    .min(bounds.upper[j]);
            }
        }

        let costs = evaluate(&fun, &positions);
        for i in 0..n {
            if costs[i] < best_costs[i] {
                best_costs[i] = costs[i];
                best_positions.row_mut(i).assign(&positions.row(i));
            }
        }
        let (i_best, f_best) = swarm_best(&best_costs);
        if f_best < leader_cost {
            leader = i_best;
            leader_cost = f_best;
        }
    }

    (leader_cost, best_positions.row(leader).to_owned())
}

fn evaluate<F>(fun: &F, positions: &Array2<f64>) -> Array1<f64>
where
    F: Fn(&Location) -> f64 + Sync,
{
    let costs: Vec<f64> = positions
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|row| fun(&row.to_owned()))
        .collect();
    Array1::from_vec(costs)
}

fn swarm_best(costs: &Array1<f64>) -> (usize, f64) {
    let mut i_best = 0;
    let mut f_best = costs[0];
    for (i, &f) in costs.iter().enumerate().skip(1) {
        if f < f_best {
            i_best = i;
            f_best = f;
        }
    }
    (i_best, f_best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;

    fn unit_bounds() -> Bounds {
        Bounds::unit(2)
    }

    #[test]
    fn test_swarm_finds_quadratic_minimum() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let fun = |x: &Location| (x[0] - 0.3).powi(2) + (x[1] - 0.7).powi(2);
        let (fval, x) = minimize_swarm(fun, &unit_bounds(), &SwarmParams::default(), &mut rng);
        assert!(fval < 1e-4);
        assert_abs_diff_eq!(x, array![0.3, 0.7], epsilon = 1e-2);
    }

    #[test]
    fn test_first_particle_sits_at_midpoint() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let fun = |x: &Location| (x[0] - 0.5).powi(2) + (x[1] - 0.5).powi(2);
        let (fval, x) = minimize_swarm(fun, &unit_bounds(), &SwarmParams::default(), &mut rng);
        // the midpoint particle already sits on the optimum
        assert_abs_diff_eq!(fval, 0., epsilon = 1e-12);
        assert_abs_diff_eq!(x, array![0.5, 0.5], epsilon = 1e-12);
    }

    #[test]
    fn test_swarm_escapes_infinite_plateau() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let fun = |x: &Location| {
            if x[0] < 0.5 {
                f64::INFINITY
            } else {
                (x[0] - 0.7).powi(2) + (x[1] - 0.4).powi(2)
            }
        };
        let (fval, x) = minimize_swarm(fun, &unit_bounds(), &SwarmParams::default(), &mut rng);
        assert!(fval.is_finite());
        assert_abs_diff_eq!(x, array![0.7, 0.4], epsilon = 5e-2);
    }

    #[test]
    fn test_swarm_survives_all_infinite_costs() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let fun = |_: &Location| f64::INFINITY;
        let bounds = unit_bounds();
        let (fval, x) = minimize_swarm(fun, &bounds, &SwarmParams::default(), &mut rng);
        assert!(fval.is_infinite());
        assert!(bounds.contains(&x));
    }
}
