use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{ParametricFunction, PeakFunction};

/// Lorentzian (Cauchy) peak shape model, parameterized by its integrated area
///
/// ```math
/// y = \frac{A}{\pi}\frac{\Gamma/2}{(x - x_0)^2 + (\Gamma/2)^2}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Lorentzian {
    pub amplitude: f64,
    pub centre: f64,
    pub fwhm: f64,
}

impl Default for Lorentzian {
    fn default() -> Self {
        Self::new(1.0, 0.0, 1.0)
    }
}

impl Lorentzian {
    pub const PARAMETERS: [&'static str; 3] = ["Amplitude", "PeakCentre", "FWHM"];

    pub fn new(amplitude: f64, centre: f64, fwhm: f64) -> Self {
        Self {
            amplitude,
            centre,
            fwhm,
        }
    }

    pub fn density(&self, x: f64) -> f64 {
        let half_width = self.fwhm / 2.0;
        self.amplitude / PI * half_width / ((x - self.centre).powi(2) + half_width.powi(2))
    }
}

impl ParametricFunction for Lorentzian {
    fn parameter_names(&self) -> Vec<&'static str> {
        Self::PARAMETERS.to_vec()
    }

    fn parameter_count(&self) -> usize {
        Self::PARAMETERS.len()
    }

    fn parameter(&self, index: usize) -> f64 {
        match index {
            0 => self.amplitude,
            1 => self.centre,
            2 => self.fwhm,
            _ => panic!("Lorentzian has no parameter {index}"),
        }
    }

    fn set_parameter(&mut self, index: usize, value: f64) {
        match index {
            0 => self.amplitude = value,
            1 => self.centre = value,
            2 => self.fwhm = value,
            _ => panic!("Lorentzian has no parameter {index}"),
        }
    }

    fn evaluate(&self, x: f64) -> f64 {
        self.density(x)
    }
}

impl PeakFunction for Lorentzian {
    fn centre(&self) -> f64 {
        self.centre
    }

    fn set_centre(&mut self, centre: f64) {
        self.centre = centre;
    }

    fn height(&self) -> f64 {
        2.0 * self.amplitude / (PI * self.fwhm)
    }

    fn set_height(&mut self, height: f64) {
        self.amplitude = height * PI * self.fwhm / 2.0;
    }

    fn fwhm(&self) -> f64 {
        self.fwhm.abs()
    }

    fn set_fwhm(&mut self, fwhm: f64) {
        // keep the height fixed while the width changes
        let height = self.height();
        self.fwhm = fwhm;
        self.set_height(height);
    }

    fn intensity(&self) -> f64 {
        self.amplitude
    }
}
