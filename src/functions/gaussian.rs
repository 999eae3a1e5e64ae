use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peak_statistics::SIGMA_TO_FWHM;

use super::{ParametricFunction, PeakFunction};

/// Gaussian peak shape model
///
/// ```math
/// y = h\exp\left({\frac{-(x - \mu)^2}{2\sigma^2}}\right)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gaussian {
    pub height: f64,
    pub centre: f64,
    pub sigma: f64,
}

impl Default for Gaussian {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

impl Gaussian {
    pub const PARAMETERS: [&'static str; 3] = ["Height", "PeakCentre", "Sigma"];

    pub fn new(height: f64, centre: f64, sigma: f64) -> Self {
        Self {
            height,
            centre,
            sigma,
        }
    }

    pub fn density(&self, x: f64) -> f64 {
        self.height * (-0.5 * (x - self.centre).powi(2) / self.sigma.powi(2)).exp()
    }
}

impl ParametricFunction for Gaussian {
    fn parameter_names(&self) -> Vec<&'static str> {
        Self::PARAMETERS.to_vec()
    }

    fn parameter_count(&self) -> usize {
        Self::PARAMETERS.len()
    }

    fn parameter(&self, index: usize) -> f64 {
        match index {
            0 => self.height,
            1 => self.centre,
            2 => self.sigma,
            _ => panic!("Gaussian has no parameter {index}"),
        }
    }

    fn set_parameter(&mut self, index: usize, value: f64) {
        match index {
            0 => self.height = value,
            1 => self.centre = value,
            2 => self.sigma = value,
            _ => panic!("Gaussian has no parameter {index}"),
        }
    }

    fn evaluate(&self, x: f64) -> f64 {
        self.density(x)
    }
}

impl PeakFunction for Gaussian {
    fn centre(&self) -> f64 {
        self.centre
    }

    fn set_centre(&mut self, centre: f64) {
        self.centre = centre;
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn set_height(&mut self, height: f64) {
        self.height = height;
    }

    fn fwhm(&self) -> f64 {
        SIGMA_TO_FWHM * self.sigma.abs()
    }

    fn set_fwhm(&mut self, fwhm: f64) {
        self.sigma = fwhm / SIGMA_TO_FWHM;
    }

    fn intensity(&self) -> f64 {
        self.height * self.sigma.abs() * (2.0 * PI).sqrt()
    }
}
