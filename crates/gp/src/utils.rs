use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2};

/// Squared euclidean distances between two sets of points as an (nx, ny) matrix.
pub(crate) fn pairwise_sq_dists<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    let mut dists = Array2::zeros((x.nrows(), y.nrows()));
    for (i, xi) in x.rows().into_iter().enumerate() {
        for (j, yj) in y.rows().into_iter().enumerate() {
            let mut d = F::zero();
            for (a, b) in xi.iter().zip(yj.iter()) {
                let diff = *a - *b;
                d = d + diff * diff;
            }
            dists[(i, j)] = d;
        }
    }
    dists
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_pairwise_sq_dists() {
        let x = array![[1., 0.], [1., 1.]];
        let y = array![[1., 0.], [4., 4.], [1., 2.]];
        let expected = array![[0., 25., 4.], [1., 18., 1.]];
        assert_abs_diff_eq!(pairwise_sq_dists(&x, &y), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_pairwise_sq_dists_self_diagonal_is_zero() {
        let x = array![[0.3, 0.7], [0.1, 0.2], [0.9, 0.4]];
        let d = pairwise_sq_dists(&x, &x);
        for i in 0..x.nrows() {
            assert_abs_diff_eq!(d[(i, i)], 0.);
        }
        assert_abs_diff_eq!(d.clone().reversed_axes(), d, epsilon = 1e-12);
    }
}
