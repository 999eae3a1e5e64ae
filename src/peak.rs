//! The outcome of fitting one expected peak.
use std::fmt;
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::functions::{CompositeFunction, ParametricFunction, PeakFunction};

/// Which count total fell short for a [`PeakStatus::LowTotalCount`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CountScope {
    /// The sum over every window of the spectrum
    Spectrum,
    /// The sum over the peak's own window
    Peak,
}

/// Why a peak slot holds what it holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeakStatus {
    Good,
    /// The estimated height was not positive or below the minimum
    LowHeightPreFit,
    /// The fitted height was not positive or below the minimum
    LowHeightPostFit,
    /// The window lies outside the spectrum or the expected center is not inside it
    OutOfWindow,
    NotEnoughPoints,
    LowSignalToNoise,
    LowTotalCount(CountScope),
    /// The solver failed or the fitted center left the window
    FitFailed,
}

impl PeakStatus {
    pub fn is_good(&self) -> bool {
        matches!(self, Self::Good)
    }

    /// The value written into the positions table in place of a center
    pub fn sentinel(&self) -> Option<f64> {
        match self {
            Self::Good => None,
            Self::LowTotalCount(CountScope::Spectrum) => Some(-1.0),
            Self::LowHeightPostFit => Some(-3.0),
            _ => Some(-4.0),
        }
    }
}

impl fmt::Display for PeakStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Self::Good => "good",
            Self::LowHeightPreFit => "estimated height too low",
            Self::LowHeightPostFit => "fitted height too low",
            Self::OutOfWindow => "out of window",
            Self::NotEnoughPoints => "not enough points in window",
            Self::LowSignalToNoise => "signal to noise too low",
            Self::LowTotalCount(CountScope::Spectrum) => "spectrum total count too low",
            Self::LowTotalCount(CountScope::Peak) => "peak total count too low",
            Self::FitFailed => "fit failed",
        };
        f.write_str(label)
    }
}

/// What the pipeline concluded about one (spectrum, peak) slot
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakFitOutcome {
    pub peak_index: usize,
    pub status: PeakStatus,
    pub expected_center: f64,
    /// The index range of the spectrum points in the fit window, when it was resolved
    pub window: Option<Range<usize>>,
    /// The fitted function, or the last attempted one when a rejected peak reached the solver
    pub function: Option<CompositeFunction>,
    /// The parameter standard errors reported by the solver, in parameter order
    pub errors: Vec<f64>,
    /// The goodness of fit, `+inf` unless the peak is [`PeakStatus::Good`]
    pub cost: f64,
}

impl PeakFitOutcome {
    /// A slot rejected before any fit was attempted
    pub fn rejected(peak_index: usize, expected_center: f64, status: PeakStatus) -> Self {
        Self {
            peak_index,
            status,
            expected_center,
            window: None,
            function: None,
            errors: Vec::new(),
            cost: f64::INFINITY,
        }
    }

    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }

    /// The fitted center, only defined for good peaks
    pub fn center(&self) -> Option<f64> {
        if self.is_good() {
            self.function.as_ref().map(|f| f.peak.centre())
        } else {
            None
        }
    }

    /// The value written into the positions table, the fitted center or a sentinel
    pub fn position(&self) -> f64 {
        self.status
            .sentinel()
            .or_else(|| self.center())
            .unwrap_or(-4.0)
    }

    /// The raw parameter vector, empty when no fit was attempted
    pub fn parameters(&self) -> Vec<f64> {
        self.function
            .as_ref()
            .map(|f| f.parameters())
            .unwrap_or_default()
    }
}

impl fmt::Display for PeakFitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PeakFitOutcome({}, {}, {}, {}, {})",
            self.peak_index,
            self.expected_center,
            self.position(),
            self.status,
            self.cost
        )
    }
}
