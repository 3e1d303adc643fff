use crate::errors::{MapError, Result};
use ndarray::Array1;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A point of the continuous domain.
pub type Location = Array1<f64>;

/// Inclusive lower/upper corners of a rectangular domain.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Bounds {
    /// Lower corner
    pub lower: Array1<f64>,
    /// Upper corner
    pub upper: Array1<f64>,
}

impl Bounds {
    /// Build bounds from corner vectors. Corners must have the same non-zero
    /// dimension, be finite and satisfy `lower[i] < upper[i]` componentwise.
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> Result<Bounds> {
        if lower.is_empty() || lower.len() != upper.len() {
            return Err(MapError::InvalidBoundsError(format!(
                "corners should have the same non-zero dimension, got {} and {}",
                lower.len(),
                upper.len()
            )));
        }
        for (l, u) in lower.iter().zip(upper.iter()) {
            if !l.is_finite() || !u.is_finite() || l >= u {
                return Err(MapError::InvalidBoundsError(format!(
                    "expected finite lower < upper, got [{l}, {u}]"
                )));
            }
        }
        Ok(Bounds { lower, upper })
    }

    /// The unit domain `[0, 1]^ndim`.
    pub fn unit(ndim: usize) -> Bounds {
        Bounds {
            lower: Array1::zeros(ndim),
            upper: Array1::ones(ndim),
        }
    }

    /// Domain dimension
    pub fn ndim(&self) -> usize {
        self.lower.len()
    }

    /// Per-axis side lengths
    pub fn extents(&self) -> Array1<f64> {
        &self.upper - &self.lower
    }

    /// Center of the domain
    pub fn midpoint(&self) -> Location {
        (&self.lower + &self.upper) / 2.
    }

    /// Whether `x` lies within the bounds (inclusive)
    pub fn contains(&self, x: &Location) -> bool {
        x.len() == self.ndim()
            && x.iter()
                .zip(self.lower.iter())
                .zip(self.upper.iter())
                .all(|((&v, &l), &u)| v >= l && v <= u)
    }

    /// Project `x` componentwise onto the bounds
    pub fn clamp(&self, x: &Location) -> Location {
        x.iter()
            .zip(self.lower.iter())
            .zip(self.upper.iter())
            .map(|((&v, &l), &u)| v.max(l).min(u))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_bounds_validation() {
        assert!(Bounds::new(array![0., 0.], array![1., 1.]).is_ok());
        assert!(Bounds::new(array![0.], array![1., 1.]).is_err());
        assert!(Bounds::new(array![1., 0.], array![0., 1.]).is_err());
        assert!(Bounds::new(array![0., 0.], array![0., 1.]).is_err());
        assert!(Bounds::new(array![0., f64::NAN], array![1., 1.]).is_err());
    }

    #[test]
    fn test_bounds_geometry() {
        let bounds = Bounds::new(array![0., -1.], array![2., 3.]).unwrap();
        assert_abs_diff_eq!(bounds.extents(), array![2., 4.]);
        assert_abs_diff_eq!(bounds.midpoint(), array![1., 1.]);
        assert!(bounds.contains(&array![0., 3.]));
        assert!(!bounds.contains(&array![0., 3.1]));
        assert_abs_diff_eq!(bounds.clamp(&array![-5., 1.]), array![0., 1.]);
    }

    #[test]
    fn test_unit_bounds() {
        let bounds = Bounds::unit(2);
        assert_eq!(bounds.ndim(), 2);
        assert!(bounds.contains(&array![0.5, 0.5]));
    }
}
