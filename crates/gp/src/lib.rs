//! This library implements multi-output [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process)
//! regression for adaptive sampling missions, where several correlated physical
//! quantities are measured at the same locations and each observation should
//! sharpen the estimate of all of them.
//!
//! Training points are locations augmented with a quantity index and the kernel
//! couples quantities through a coregionalization matrix, following the
//! intrinsic coregionalization model. Hyperparameters are tuned by likelihood
//! maximization with a Nelder-Mead simplex running in log10 space.
//!
//! The GP itself is implemented by [MultiGp] parameterized by [MultiGpParams].
//! [BeliefModel] wraps one or two fitted models behind a sample-oriented
//! interface for mission planning, with data-driven initial hyperparameter
//! guesses and a choice of how prior knowledge feeds the spread estimate.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
mod belief;
mod errors;
mod kernel;
mod parameters;
mod utils;

mod optimization;

pub use algorithm::*;
pub use belief::*;
pub use errors::*;
pub use kernel::*;
pub use parameters::*;
