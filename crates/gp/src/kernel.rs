use linfa::Float;
use ndarray::{s, Array1, Array2, ArrayBase, ArrayView1, Data, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::pairwise_sq_dists;

/// Squared exponential kernel over locations coupled with an intrinsic
/// coregionalization matrix over quantity indices.
///
/// Inputs are augmented rows `[location..., quantity]` where the last column
/// holds the index of the measured quantity. For inputs measuring quantities
/// `i` and `j` at locations `p` and `p'`:
///
/// `k((p, i), (p', j)) = A[i, j] * exp(-|p - p'|^2 / (2 l^2))`
///
/// with `A = L Lt + sqrt(eps) I` where `L` is lower triangular, filled row by
/// row from the `sigma` hyperparameters. The diagonal of `A` scales each
/// quantity's prior variance while its off-diagonal entries let observations
/// of one quantity inform the posterior of the others.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct CoregionalKernel {
    n_outputs: usize,
}

impl CoregionalKernel {
    /// A kernel coupling the given number of quantities.
    pub fn new(n_outputs: usize) -> CoregionalKernel {
        CoregionalKernel { n_outputs }
    }

    /// Number of coupled quantities
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Number of `sigma` hyperparameters, one per lower triangular entry of `L`
    pub fn n_sigma(&self) -> usize {
        self.n_outputs * (self.n_outputs + 1) / 2
    }

    /// Build the coregionalization matrix `A` from the flattened lower triangle.
    pub fn coregionalization<F: Float>(&self, sigma: &ArrayView1<F>) -> Array2<F> {
        let t = self.n_outputs;
        let mut lower = Array2::zeros((t, t));
        let mut k = 0;
        for i in 0..t {
            for j in 0..=i {
                lower[(i, j)] = sigma[k];
                k += 1;
            }
        }
        let mut a = lower.dot(&lower.t());
        // keep A invertible when a row of L degenerates to zero
        let jitter = F::epsilon().sqrt();
        for i in 0..t {
            a[(i, i)] = a[(i, i)] + jitter;
        }
        a
    }

    /// Cross covariance matrix between two sets of augmented inputs.
    pub fn value<F: Float>(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
        sigma: &ArrayView1<F>,
        length_scale: F,
    ) -> Array2<F> {
        let d = x.ncols() - 1;
        let a = self.coregionalization(sigma);
        let sq = pairwise_sq_dists(&x.slice(s![.., ..d]), &y.slice(s![.., ..d]));
        let denom = F::cast(2.) * length_scale * length_scale;
        let mut k = sq.mapv(|v| (-v / denom).exp());
        for (i, xi) in x.rows().into_iter().enumerate() {
            let qi = self.quantity_of(&xi);
            for (j, yj) in y.rows().into_iter().enumerate() {
                let qj = self.quantity_of(&yj);
                k[(i, j)] = k[(i, j)] * a[(qi, qj)];
            }
        }
        k
    }

    /// Prior variance `A[q, q]` of each augmented input row.
    pub fn prior_variance<F: Float>(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        sigma: &ArrayView1<F>,
    ) -> Array1<F> {
        let a = self.coregionalization(sigma);
        let mut var = Array1::zeros(x.nrows());
        for (i, xi) in x.rows().into_iter().enumerate() {
            let q = self.quantity_of(&xi);
            var[i] = a[(q, q)];
        }
        var
    }

    /// Quantity index encoded in the last column of an augmented row.
    pub(crate) fn quantity_of<F: Float>(&self, row: &ArrayView1<F>) -> usize {
        let q = row[row.len() - 1].to_usize().unwrap_or(0);
        q.min(self.n_outputs - 1)
    }
}

impl fmt::Display for CoregionalKernel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CoregionalRBF(outputs={})", self.n_outputs)
    }
}
