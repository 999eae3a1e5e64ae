use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{
    dispatch_peak, BackgroundShape, ParametricFunction, PeakFunction, PeakShape,
    EFFECTIVE_BACKGROUND_PARAMETERS, EFFECTIVE_PEAK_PARAMETERS,
};

/// A peak on top of a background. The parameter vector is the peak's parameters
/// followed by the background's.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompositeFunction {
    pub peak: PeakShape,
    pub background: BackgroundShape,
}

impl CompositeFunction {
    pub fn new(peak: PeakShape, background: BackgroundShape) -> Self {
        Self { peak, background }
    }

    /// The number of leading parameters that belong to the peak
    pub fn peak_parameter_count(&self) -> usize {
        self.peak.parameter_count()
    }

    pub fn density(&self, x: f64) -> f64 {
        let peak = &self.peak;
        dispatch_peak!(peak, p, p.density(x)) + self.background.density(x)
    }

    /// The column names of [`CompositeFunction::effective_parameters`]
    pub fn effective_parameter_names() -> Vec<&'static str> {
        EFFECTIVE_PEAK_PARAMETERS
            .iter()
            .chain(EFFECTIVE_BACKGROUND_PARAMETERS.iter())
            .copied()
            .collect()
    }

    /// The peak's center, height, FWHM and intensity followed by all three
    /// background coefficients, independent of which shapes were chosen
    pub fn effective_parameters(&self) -> [f64; 7] {
        let [c, h, w, i] = self.peak.effective_parameters();
        let [a0, a1, a2] = self.background.coefficients();
        [c, h, w, i, a0, a1, a2]
    }
}

impl ParametricFunction for CompositeFunction {
    fn parameter_names(&self) -> Vec<&'static str> {
        let mut names = self.peak.parameter_names();
        names.extend(self.background.parameter_names());
        names
    }

    fn parameter_count(&self) -> usize {
        self.peak.parameter_count() + self.background.parameter_count()
    }

    fn parameter(&self, index: usize) -> f64 {
        let n = self.peak_parameter_count();
        if index < n {
            self.peak.parameter(index)
        } else {
            self.background.parameter(index - n)
        }
    }

    fn set_parameter(&mut self, index: usize, value: f64) {
        let n = self.peak_parameter_count();
        if index < n {
            self.peak.set_parameter(index, value)
        } else {
            self.background.set_parameter(index - n, value)
        }
    }

    fn evaluate(&self, x: f64) -> f64 {
        self.density(x)
    }
}

impl Display for CompositeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.peak.kind())?;
        for (i, name) in self.peak.parameter_names().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={}", self.peak.parameter(i))?;
        }
        write!(f, ") + {}(", self.background.kind())?;
        for (i, name) in self.background.parameter_names().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={}", self.background.parameter(i))?;
        }
        f.write_str(")")
    }
}
