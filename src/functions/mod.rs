//! Peak and background function descriptors.
//!
//! The fitting pipeline never works with a concrete shape directly. It resolves a
//! peak shape and a background shape by name once, when the fitter is configured,
//! and from then on manipulates them through two capability sets:
//!
//! - [`ParametricFunction`]: evaluation and get/set access to the parameter vector,
//!   by index or by name. This is all a least squares solver needs.
//! - [`PeakFunction`]: the physically meaningful handles on a peak, its center, height,
//!   full width at half max and integrated intensity.
//!
//! The supported peak shapes:
//! - [`Gaussian`]
//! - [`BackToBackExponential`]
//! - [`Lorentzian`]
//!
//! and the background shapes are the polynomials of [`BackgroundShape`].
//!
//! A [`CompositeFunction`] joins one of each and is the unit that actually gets fit.
//!
//! # Example
//!
//! ```rust
//! use fitpeaks::functions::{BackgroundKind, CompositeFunction, PeakFunction, PeakShapeKind, ParametricFunction};
//!
//! let peak_kind: PeakShapeKind = "Gaussian".parse().unwrap();
//! let background_kind: BackgroundKind = "Linear".parse().unwrap();
//! let mut function = CompositeFunction::new(peak_kind.create(), background_kind.create());
//! function.peak.set_centre(5.0);
//! function.peak.set_height(2.0);
//! function.set_parameter_by_name("A0", 1.0).unwrap();
//! assert!((function.evaluate(5.0) - 3.0).abs() < 1e-12);
//! ```
use std::fmt::Debug;

use crate::error::FitPeaksError;

mod back_to_back;
mod composite;
mod gaussian;
mod lorentzian;
mod polynomial;
mod shape;

pub use back_to_back::BackToBackExponential;
pub use composite::CompositeFunction;
pub use gaussian::Gaussian;
pub use lorentzian::Lorentzian;
pub use polynomial::{BackgroundKind, BackgroundShape};
pub use shape::{PeakShape, PeakShapeKind};

pub(crate) use shape::dispatch_peak;

/// The column names of the effective peak parameters, see [`PeakFunction::effective_parameters`]
pub const EFFECTIVE_PEAK_PARAMETERS: [&str; 4] = ["PeakCentre", "Height", "FWHM", "Intensity"];

/// The column names of the effective background parameters, see [`BackgroundShape::coefficients`]
pub const EFFECTIVE_BACKGROUND_PARAMETERS: [&str; 3] = ["A0", "A1", "A2"];

/// A function of one variable with a vector of named, adjustable parameters
pub trait ParametricFunction: Debug + Send + Sync {
    /// The names of the parameters, in index order
    fn parameter_names(&self) -> Vec<&'static str>;

    /// Read the parameter at `index`.
    ///
    /// # Panics
    /// If `index` is not less than [`ParametricFunction::parameter_count`]
    fn parameter(&self, index: usize) -> f64;

    /// Write the parameter at `index`.
    ///
    /// # Panics
    /// If `index` is not less than [`ParametricFunction::parameter_count`]
    fn set_parameter(&mut self, index: usize, value: f64);

    /// Compute the function's value at `x`
    fn evaluate(&self, x: f64) -> f64;

    fn parameter_count(&self) -> usize {
        self.parameter_names().len()
    }

    /// Copy out the parameter vector
    fn parameters(&self) -> Vec<f64> {
        (0..self.parameter_count())
            .map(|i| self.parameter(i))
            .collect()
    }

    /// Overwrite the leading parameters with `values`
    fn set_parameters(&mut self, values: &[f64]) {
        for (i, v) in values.iter().copied().enumerate().take(self.parameter_count()) {
            self.set_parameter(i, v);
        }
    }

    fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameter_names().iter().position(|n| *n == name)
    }

    fn parameter_by_name(&self, name: &str) -> Option<f64> {
        self.parameter_index(name).map(|i| self.parameter(i))
    }

    fn set_parameter_by_name(&mut self, name: &str, value: f64) -> Result<(), FitPeaksError> {
        match self.parameter_index(name) {
            Some(i) => {
                self.set_parameter(i, value);
                Ok(())
            }
            None => Err(FitPeaksError::UnknownParameter(name.to_string())),
        }
    }

    /// Given a coordinate sequence, produce the complementary sequence of function values
    fn predict(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|x| self.evaluate(*x)).collect()
    }
}

/// The physically meaningful capabilities of a peak shape
pub trait PeakFunction: ParametricFunction {
    fn centre(&self) -> f64;
    fn set_centre(&mut self, centre: f64);

    /// The peak's maximum value above its background
    fn height(&self) -> f64;
    fn set_height(&mut self, height: f64);

    /// The full width at half max
    fn fwhm(&self) -> f64;
    fn set_fwhm(&mut self, fwhm: f64);

    /// The integrated area under the peak
    fn intensity(&self) -> f64;

    /// The parameters named by [`EFFECTIVE_PEAK_PARAMETERS`]
    fn effective_parameters(&self) -> [f64; 4] {
        [self.centre(), self.height(), self.fwhm(), self.intensity()]
    }
}
