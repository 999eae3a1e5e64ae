pub use crate::functions::{ParametricFunction, PeakFunction};
pub use crate::solver::LeastSquaresSolver;
pub use crate::spectrum::SpectrumSource;
