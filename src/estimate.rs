//! Starting values for a peak fit from the background-subtracted window.
use std::ops::Range;

use log::trace;

use crate::arrayops::trapz;
use crate::config::WidthEstimate;
use crate::functions::{BackgroundShape, ParametricFunction};
use crate::peak::PeakStatus;
use crate::peak_statistics::{estimate_noise, observed_fwhm};
use crate::search::nearest;
use crate::spectrum::Spectrum;
use crate::window::PeakWindow;

/// The share of the window's points the center search box spans
pub const SEARCH_BOX_FRACTION: f64 = 0.3;
/// The fewest bins the center search box spans
pub const MIN_SEARCH_BOX_BINS: usize = 5;

/// Locate the index range searched for the peak's maximum, centered on the point
/// nearest the expected center.
///
/// The lower edge is clamped to the start of the window while the upper edge is
/// only clamped to the end of the spectrum, so the box may reach past the window's
/// right edge.
pub fn search_range(spectrum: &Spectrum, window: &PeakWindow) -> Result<Range<usize>, PeakStatus> {
    if spectrum.is_empty() || window.is_empty() {
        return Err(PeakStatus::OutOfWindow);
    }
    let guess = nearest(&spectrum.x, window.expected_center);
    if !window.range.contains(&guess) {
        return Err(PeakStatus::OutOfWindow);
    }
    let width = ((SEARCH_BOX_FRACTION * window.len() as f64).round() as usize).max(MIN_SEARCH_BOX_BINS);
    let half = width / 2;
    let lower = guess.saturating_sub(half).max(window.range.start);
    let upper = (guess + half).min(spectrum.len() - 1);
    Ok(lower..upper + 1)
}

/// The starting values of one peak
#[derive(Debug, Clone, PartialEq)]
pub struct PeakEstimate {
    pub center_index: usize,
    pub center: f64,
    /// The background-subtracted signal at the center
    pub height: f64,
    /// The estimated full width at half max, `None` to keep the function's own width
    pub fwhm: Option<f64>,
    /// The noise level of the background-subtracted signal around the peak
    pub noise: f64,
    pub search: Range<usize>,
}

/// Estimates the center, height and width of a peak over its background
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakParameterEstimator {
    pub width_estimate: WidthEstimate,
}

impl PeakParameterEstimator {
    pub fn new(width_estimate: WidthEstimate) -> Self {
        Self { width_estimate }
    }

    /// Estimate the peak of `window` over `background`, searching for the maximum in `search`.
    ///
    /// A peak whose height is not a positive, finite number is [`PeakStatus::LowHeightPreFit`].
    pub fn estimate(
        &self,
        spectrum: &Spectrum,
        window: &PeakWindow,
        search: Range<usize>,
        background: &BackgroundShape,
    ) -> Result<PeakEstimate, PeakStatus> {
        let residual_at = |i: usize| spectrum.y[i] - background.evaluate(spectrum.x[i]);

        let mut center_index = search.start;
        let mut height = f64::NEG_INFINITY;
        for i in search.clone() {
            let r = residual_at(i);
            if r > height {
                height = r;
                center_index = i;
            }
        }
        if !height.is_finite() || height <= 0.0 {
            trace!(
                "Peak {} has estimated height {height} at index {center_index}",
                window.peak_index
            );
            return Err(PeakStatus::LowHeightPreFit);
        }
        let center = spectrum.x[center_index];

        let residuals: Vec<f64> = window.range.clone().map(residual_at).collect();
        let fwhm = match self.width_estimate {
            WidthEstimate::ResolutionFraction(fraction) => Some(fraction * center.abs()),
            WidthEstimate::Observe => {
                let area = trapz(&spectrum.x[window.range.clone()], &residuals);
                observed_fwhm(area, height)
            }
        };

        let outside: Vec<f64> = window
            .range
            .clone()
            .zip(residuals.iter().copied())
            .filter(|(i, _)| !search.contains(i))
            .map(|(_, r)| r)
            .collect();
        let noise = if outside.len() >= 3 {
            estimate_noise(&outside)
        } else {
            estimate_noise(&residuals)
        };

        trace!(
            "Peak {} estimated at {center} with height {height}, width {fwhm:?} and noise {noise}",
            window.peak_index
        );
        Ok(PeakEstimate {
            center_index,
            center,
            height,
            fwhm,
            noise,
            search,
        })
    }
}
