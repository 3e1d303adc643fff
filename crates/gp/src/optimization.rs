use ndarray::{s, Array1, Array2, Axis};

pub(crate) struct NelderMeadParams {
    /// Initial simplex edge scale
    pub step: f64,
    /// Reflection coefficient
    pub alpha: f64,
    /// Contraction coefficient
    pub beta: f64,
    /// Expansion coefficient
    pub gamma: f64,
    /// Termination threshold on the spread of simplex objective values
    pub ftol: f64,
    /// Termination threshold on the largest per-axis simplex extent
    pub xtol: f64,
    /// Max number of iterations
    pub max_iters: usize,
}

impl Default for NelderMeadParams {
    fn default() -> Self {
        NelderMeadParams {
            step: 0.5,
            alpha: 1.0,
            beta: 0.5,
            gamma: 2.0,
            ftol: 1e-8,
            xtol: 1e-6,
            max_iters: 1000,
        }
    }
}

/// Minimize `objfn` with an unconstrained Nelder-Mead simplex search started
/// at `param0`, returning the best objective value and its argument.
///
/// Callers optimize on a log10 scale, which keeps the underlying
/// hyperparameters positive without any bound handling here.
pub(crate) fn optimize_theta<ObjF>(
    objfn: ObjF,
    param0: &Array1<f64>,
    options: &NelderMeadParams,
) -> (f64, Array1<f64>)
where
    ObjF: Fn(&[f64], Option<&mut [f64]>, &mut ()) -> f64,
{
    let ndim = param0.len();
    let mut splx = init_simplex(param0, options.step);
    let mut fval: Vec<f64> = (0..=ndim).map(|j| evaluate(&objfn, &splx, j)).collect();

    for _ in 0..options.max_iters {
        sort_columns(&mut splx, &mut fval);
        // similar objective values alone do not mean convergence: vertices
        // can straddle a minimum with equal values, so the simplex must also
        // have collapsed
        if spread(&fval) < options.ftol && simplex_size(&splx) < options.xtol {
            break;
        }

        // centroid of all points but the worst
        let x_cent = splx.slice(s![.., ..ndim]).sum_axis(Axis(1)) / ndim as f64;
        let x_worst = splx.column(ndim).to_owned();

        let x_refl = &x_cent + &((&x_cent - &x_worst) * options.alpha);
        let f_refl = evaluate_point(&objfn, &x_refl);

        if f_refl < fval[0] {
            let x_exp = &x_cent + &((&x_refl - &x_cent) * options.gamma);
            let f_exp = evaluate_point(&objfn, &x_exp);
            if f_exp < f_refl {
                splx.column_mut(ndim).assign(&x_exp);
                fval[ndim] = f_exp;
            } else {
                splx.column_mut(ndim).assign(&x_refl);
                fval[ndim] = f_refl;
            }
        } else if f_refl <= fval[ndim - 1] {
            splx.column_mut(ndim).assign(&x_refl);
            fval[ndim] = f_refl;
        } else {
            let x_cont = &x_cent + &((&x_worst - &x_cent) * options.beta);
            let f_cont = evaluate_point(&objfn, &x_cont);
            if f_cont < fval[ndim] {
                splx.column_mut(ndim).assign(&x_cont);
                fval[ndim] = f_cont;
            } else {
                // shrink every point towards the best one
                let x_best = splx.column(0).to_owned();
                for j in 1..=ndim {
                    let shrunk = (&x_best + &splx.column(j)) * 0.5;
                    splx.column_mut(j).assign(&shrunk);
                    fval[j] = evaluate(&objfn, &splx, j);
                }
            }
        }
    }

    sort_columns(&mut splx, &mut fval);
    (fval[0], splx.column(0).to_owned())
}

/// Regular simplex around `x0` with edge scale `a`, one column per point.
fn init_simplex(x0: &Array1<f64>, a: f64) -> Array2<f64> {
    let n = x0.len();
    let nf = n as f64;
    let p = a * ((nf + 1.).sqrt() + nf - 1.) / (nf * 2_f64.sqrt());
    let q = a * ((nf + 1.).sqrt() - 1.) / (nf * 2_f64.sqrt());
    let mut splx = Array2::zeros((n, n + 1));
    splx.column_mut(0).assign(x0);
    for k in 0..n {
        let mut col = x0.to_owned();
        for (i, v) in col.iter_mut().enumerate() {
            *v += if i == k { p } else { q };
        }
        splx.column_mut(k + 1).assign(&col);
    }
    splx
}

fn sort_columns(splx: &mut Array2<f64>, fval: &mut Vec<f64>) {
    let mut indices: Vec<usize> = (0..fval.len()).collect();
    indices.sort_by(|&a, &b| {
        fval[a]
            .partial_cmp(&fval[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    *splx = splx.select(Axis(1), &indices);
    *fval = indices.iter().map(|&i| fval[i]).collect();
}

fn evaluate<ObjF>(objfn: &ObjF, splx: &Array2<f64>, j: usize) -> f64
where
    ObjF: Fn(&[f64], Option<&mut [f64]>, &mut ()) -> f64,
{
    let x = splx.column(j).to_vec();
    let f = objfn(&x, None, &mut ());
    if f.is_nan() {
        f64::INFINITY
    } else {
        f
    }
}

fn evaluate_point<ObjF>(objfn: &ObjF, x: &Array1<f64>) -> f64
where
    ObjF: Fn(&[f64], Option<&mut [f64]>, &mut ()) -> f64,
{
    let f = objfn(&x.to_vec(), None, &mut ());
    if f.is_nan() {
        f64::INFINITY
    } else {
        f
    }
}

fn spread(fval: &[f64]) -> f64 {
    let n = fval.len() as f64;
    let mean = fval.iter().sum::<f64>() / n;
    (fval.iter().map(|f| (f - mean) * (f - mean)).sum::<f64>() / n).sqrt()
}

/// Largest per-axis extent spanned by the simplex vertices.
fn simplex_size(splx: &Array2<f64>) -> f64 {
    let max_vals = splx.fold_axis(Axis(1), f64::MIN, |a, &b| a.max(b));
    let min_vals = splx.fold_axis(Axis(1), f64::MAX, |a, &b| a.min(b));
    max_vals
        .iter()
        .zip(min_vals.iter())
        .map(|(&max, &min)| max - min)
        .fold(0.0, |a, b| a.max(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_converges_on_quadratic_bowl() {
        let objfn =
            |x: &[f64], _: Option<&mut [f64]>, _: &mut ()| (x[0] - 2.) * (x[0] - 2.) + (x[1] + 1.) * (x[1] + 1.);
        let (fmin, xmin) = optimize_theta(
            objfn,
            &array![0., 0.],
            &NelderMeadParams {
                max_iters: 500,
                ..Default::default()
            },
        );
        assert!(fmin < 1e-6);
        assert_abs_diff_eq!(xmin, array![2., -1.], epsilon = 1e-2);
    }

    #[test]
    fn test_converges_in_one_dimension() {
        let objfn = |x: &[f64], _: Option<&mut [f64]>, _: &mut ()| (x[0] - 0.5).powi(2);
        let (fmin, xmin) = optimize_theta(objfn, &array![3.], &NelderMeadParams::default());
        assert!(fmin < 1e-6);
        assert_abs_diff_eq!(xmin[0], 0.5, epsilon = 1e-2);
    }

    #[test]
    fn test_straddling_vertices_with_equal_values_keep_searching() {
        // with the default step the initial simplex is {0.25, 0.75}, two
        // vertices with identical objective values on either side of the
        // minimum at 0.5
        let objfn = |x: &[f64], _: Option<&mut [f64]>, _: &mut ()| (x[0] - 0.5).powi(2);
        let (fmin, xmin) = optimize_theta(objfn, &array![0.25], &NelderMeadParams::default());
        assert!(fmin < 1e-6);
        assert_abs_diff_eq!(xmin[0], 0.5, epsilon = 1e-2);
    }

    #[test]
    fn test_never_worse_than_start() {
        // objective with a deep narrow valley away from the start
        let objfn =
            |x: &[f64], _: Option<&mut [f64]>, _: &mut ()| x.iter().map(|v| v.abs()).sum::<f64>();
        let x0 = array![1., 1., 1.];
        let f0 = 3.;
        let (fmin, _) = optimize_theta(objfn, &x0, &NelderMeadParams::default());
        assert!(fmin <= f0);
    }

    #[test]
    fn test_survives_infinite_objective() {
        let objfn = |_: &[f64], _: Option<&mut [f64]>, _: &mut ()| f64::INFINITY;
        let (fmin, xmin) = optimize_theta(
            objfn,
            &array![0., 0.],
            &NelderMeadParams {
                max_iters: 10,
                ..Default::default()
            },
        );
        assert!(fmin.is_infinite());
        assert_eq!(xmin.len(), 2);
    }
}
