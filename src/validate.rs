//! Acceptance checks run before and after the solver.
//!
//! [`PreFitValidator`] guards the solver. Its data checks need nothing but the
//! window and run before any background work, the estimate checks run once the
//! starting values are known. The first failing check decides the status.
//!
//! [`PostFitValidator`] decides whether a converged fit is believable.
use crate::estimate::PeakEstimate;
use crate::functions::{CompositeFunction, PeakFunction};
use crate::peak::{CountScope, PeakStatus};
use crate::peak_statistics::signal_to_noise;
use crate::spectrum::Spectrum;
use crate::window::PeakWindow;

/// The fewest points any fit window may hold
pub const MIN_WINDOW_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreFitValidator {
    pub min_peak_total_count: f64,
    pub min_signal_to_noise: f64,
    pub min_signal_to_sigma: Option<f64>,
    pub min_peak_height: f64,
}

impl PreFitValidator {
    /// Check the window holds enough counts and enough points to fit
    /// `parameter_count` free parameters
    pub fn check_data(
        &self,
        spectrum: &Spectrum,
        window: &PeakWindow,
        parameter_count: usize,
    ) -> Result<(), PeakStatus> {
        if spectrum.total_count(window.range.clone()) < self.min_peak_total_count {
            return Err(PeakStatus::LowTotalCount(CountScope::Peak));
        }
        if window.len() < MIN_WINDOW_POINTS.max(parameter_count) {
            return Err(PeakStatus::NotEnoughPoints);
        }
        Ok(())
    }

    /// Check the estimated peak stands out from its noise and its uncertainty,
    /// and is tall enough
    pub fn check_estimate(
        &self,
        spectrum: &Spectrum,
        estimate: &PeakEstimate,
    ) -> Result<(), PeakStatus> {
        if signal_to_noise(estimate.height, estimate.noise) < self.min_signal_to_noise {
            return Err(PeakStatus::LowSignalToNoise);
        }
        if let Some(threshold) = self.min_signal_to_sigma {
            let i = estimate.center_index;
            let sigma = if spectrum.e[i] > 0.0 {
                spectrum.e[i]
            } else {
                spectrum.y[i].abs().sqrt()
            };
            if signal_to_noise(estimate.height, sigma) < threshold {
                return Err(PeakStatus::LowSignalToNoise);
            }
        }
        if estimate.height < self.min_peak_height {
            return Err(PeakStatus::LowHeightPreFit);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostFitValidator {
    pub min_peak_height: f64,
    pub peak_position_tolerance: Option<f64>,
}

impl PostFitValidator {
    /// Check the fitted peak stayed in its window, near its expected center when a
    /// tolerance is set, and kept a positive height
    pub fn check(&self, window: &PeakWindow, function: &CompositeFunction) -> Result<(), PeakStatus> {
        let centre = function.peak.centre();
        if !centre.is_finite() || !window.contains(centre) {
            return Err(PeakStatus::FitFailed);
        }
        if let Some(tolerance) = self.peak_position_tolerance {
            if (centre - window.expected_center).abs() > tolerance {
                return Err(PeakStatus::FitFailed);
            }
        }
        let height = function.peak.height();
        if !height.is_finite() || height <= 0.0 || height < self.min_peak_height {
            return Err(PeakStatus::LowHeightPostFit);
        }
        Ok(())
    }
}
