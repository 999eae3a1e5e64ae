use std::fmt::Display;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::FitPeaksError;

use super::{BackToBackExponential, Gaussian, Lorentzian, ParametricFunction, PeakFunction};

/// A dispatching peak shape model over the supported shapes
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeakShape {
    Gaussian(Gaussian),
    BackToBackExponential(BackToBackExponential),
    Lorentzian(Lorentzian),
}

macro_rules! dispatch_peak {
    ($d:ident, $r:ident, $e:expr) => {
        match $d {
            PeakShape::Gaussian($r) => $e,
            PeakShape::BackToBackExponential($r) => $e,
            PeakShape::Lorentzian($r) => $e,
        }
    };
}

pub(crate) use dispatch_peak;

impl From<Gaussian> for PeakShape {
    fn from(value: Gaussian) -> Self {
        Self::Gaussian(value)
    }
}

impl From<BackToBackExponential> for PeakShape {
    fn from(value: BackToBackExponential) -> Self {
        Self::BackToBackExponential(value)
    }
}

impl From<Lorentzian> for PeakShape {
    fn from(value: Lorentzian) -> Self {
        Self::Lorentzian(value)
    }
}

impl Default for PeakShape {
    fn default() -> Self {
        Self::Gaussian(Gaussian::default())
    }
}

impl PeakShape {
    pub fn kind(&self) -> PeakShapeKind {
        match self {
            Self::Gaussian(_) => PeakShapeKind::Gaussian,
            Self::BackToBackExponential(_) => PeakShapeKind::BackToBackExponential,
            Self::Lorentzian(_) => PeakShapeKind::Lorentzian,
        }
    }

    /// Compute the theoretical intensity at a specified coordinate
    pub fn density(&self, x: f64) -> f64 {
        dispatch_peak!(self, p, p.density(x))
    }
}

impl ParametricFunction for PeakShape {
    fn parameter_names(&self) -> Vec<&'static str> {
        self.kind().parameter_names().to_vec()
    }

    fn parameter_count(&self) -> usize {
        self.kind().parameter_names().len()
    }

    fn parameter(&self, index: usize) -> f64 {
        dispatch_peak!(self, p, p.parameter(index))
    }

    fn set_parameter(&mut self, index: usize, value: f64) {
        dispatch_peak!(self, p, p.set_parameter(index, value))
    }

    fn evaluate(&self, x: f64) -> f64 {
        self.density(x)
    }
}

impl PeakFunction for PeakShape {
    fn centre(&self) -> f64 {
        dispatch_peak!(self, p, p.centre())
    }

    fn set_centre(&mut self, centre: f64) {
        dispatch_peak!(self, p, p.set_centre(centre))
    }

    fn height(&self) -> f64 {
        dispatch_peak!(self, p, p.height())
    }

    fn set_height(&mut self, height: f64) {
        dispatch_peak!(self, p, p.set_height(height))
    }

    fn fwhm(&self) -> f64 {
        dispatch_peak!(self, p, p.fwhm())
    }

    fn set_fwhm(&mut self, fwhm: f64) {
        dispatch_peak!(self, p, p.set_fwhm(fwhm))
    }

    fn intensity(&self) -> f64 {
        dispatch_peak!(self, p, p.intensity())
    }
}

/// The name of a peak shape, resolved once when a fitter is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeakShapeKind {
    #[default]
    Gaussian,
    BackToBackExponential,
    Lorentzian,
}

impl PeakShapeKind {
    pub const fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            Self::Gaussian => &Gaussian::PARAMETERS,
            Self::BackToBackExponential => &BackToBackExponential::PARAMETERS,
            Self::Lorentzian => &Lorentzian::PARAMETERS,
        }
    }

    /// A peak of this kind with its default parameters
    pub fn create(&self) -> PeakShape {
        match self {
            Self::Gaussian => Gaussian::default().into(),
            Self::BackToBackExponential => BackToBackExponential::default().into(),
            Self::Lorentzian => Lorentzian::default().into(),
        }
    }
}

impl Display for PeakShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Gaussian => "Gaussian",
            Self::BackToBackExponential => "BackToBackExponential",
            Self::Lorentzian => "Lorentzian",
        };
        f.write_str(name)
    }
}

impl FromStr for PeakShapeKind {
    type Err = FitPeaksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Gaussian" => Ok(Self::Gaussian),
            "BackToBackExponential" => Ok(Self::BackToBackExponential),
            "Lorentzian" => Ok(Self::Lorentzian),
            _ => Err(FitPeaksError::UnknownPeakFunction(s.to_string())),
        }
    }
}
