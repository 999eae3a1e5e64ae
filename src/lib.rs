//! `fitpeaks` fits a known list of expected peaks in every spectrum of a
//! collection of 1-D spectra, such as the diffraction patterns of a detector bank.
//!
//! For each spectrum and each expected peak it picks a fit window, estimates the
//! background and the peak's starting values, screens out peaks that are not worth
//! fitting, runs a least squares fit of a peak shape plus a polynomial background,
//! and screens the result. The outcome of every (spectrum, peak) pair lands in
//! rectangular output tables, with a negative sentinel in place of the position
//! when the peak was rejected:
//!
//! - `-1`: the spectrum held too few counts over all of its windows, nothing was fit
//! - `-3`: the fitted peak's height was too low
//! - `-4`: any other rejection or failure
//!
//! Spectra are fit in parallel with the `parallelism` feature, peaks within one
//! spectrum in sequence, each fit starting from its neighbor's result.
//!
//! # Usage
//! ```
//! use fitpeaks::{FitPeaksConfig, FitWindows, PeakCenters, PeakFitter};
//! use fitpeaks::synthetic::SyntheticSpectrum;
//!
//! let spectra = SyntheticSpectrum::default()
//!     .background([1.0, 0.0, 0.0])
//!     .peak(3.0, 4.0, 0.12)
//!     .peak(7.0, 2.0, 0.15)
//!     .generate_many(4, 0.01);
//!
//! let config = FitPeaksConfig::new(
//!     PeakCenters::Uniform(vec![3.0, 7.0]),
//!     FitWindows::HalfWidth(1.0),
//! )
//! .peak_function("Gaussian")
//! .background_function("Linear");
//!
//! let fitter = PeakFitter::new(config).unwrap();
//! let output = fitter.fit(&spectra).unwrap();
//! for row in output.positions.rows() {
//!     assert!((row[0] - 3.0).abs() < 0.05);
//! }
//! println!("{}", output.summary);
//! ```
pub mod arrayops;
pub mod background;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod estimate;
pub mod fitter;
pub mod functions;
pub mod output;
pub mod peak;
pub mod peak_statistics;
pub mod prelude;
pub mod search;
pub mod solver;
pub mod spectrum;
pub mod synthetic;
pub mod validate;
pub mod window;

pub use crate::config::{
    BackgroundMode, FitOrder, FitPeaksConfig, FitWindows, PeakCenters, WidthEstimate,
};
pub use crate::coordinator::{fit_peaks, FitSummary};
pub use crate::error::FitPeaksError;
pub use crate::fitter::{PeakFitter, SpectrumFit};
pub use crate::functions::{BackgroundKind, CompositeFunction, PeakShapeKind};
pub use crate::output::{ErrorTable, FitPeaksOutput, ModelWorkspace, ParametersTable, PositionsTable};
pub use crate::peak::{PeakFitOutcome, PeakStatus};
pub use crate::solver::{CostFunction, LevenbergMarquardt, Minimizer};
pub use crate::spectrum::Spectrum;
