//! Resolving the x-range each expected peak is fit over.
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{FitWindows, PeakCenters};
use crate::peak::PeakStatus;
use crate::spectrum::Spectrum;

/// A fit window clipped to the spectrum it applies to
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakWindow {
    pub peak_index: usize,
    /// The a-priori center of the peak
    pub expected_center: f64,
    pub xmin: f64,
    pub xmax: f64,
    /// The indices of the spectrum points with `xmin <= x <= xmax`
    pub range: Range<usize>,
}

impl PeakWindow {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn contains(&self, x: f64) -> bool {
        self.xmin <= x && x <= self.xmax
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.xmin, self.xmax)
    }
}

/// Turns the configured centers and windows into [`PeakWindow`]s for one spectrum
#[derive(Debug, Clone, Copy)]
pub struct WindowResolver<'a> {
    centers: &'a PeakCenters,
    windows: &'a FitWindows,
}

impl<'a> WindowResolver<'a> {
    pub fn new(centers: &'a PeakCenters, windows: &'a FitWindows) -> Self {
        Self { centers, windows }
    }

    /// The expected center of `peak` in range row `row`, NaN when the tables hold no such peak
    pub fn expected_center(&self, row: usize, peak: usize) -> f64 {
        self.centers
            .row(row)
            .and_then(|centers| centers.get(peak))
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// Whether the center and window tables both have an entry for range row `row`
    pub fn covers(&self, row: usize) -> bool {
        self.centers.row(row).is_some() && self.windows.covers(row)
    }

    /// Resolve the window of `peak` in range row `row`, clipped to the domain of
    /// `spectrum`.
    ///
    /// A window with no overlap with the spectrum's domain is [`PeakStatus::OutOfWindow`],
    /// as is a row or peak the configured tables do not reach.
    pub fn resolve(
        &self,
        row: usize,
        peak: usize,
        spectrum: &Spectrum,
    ) -> Result<PeakWindow, PeakStatus> {
        let expected_center = self.expected_center(row, peak);
        if expected_center.is_nan() {
            return Err(PeakStatus::OutOfWindow);
        }
        let (lo, hi) = self
            .windows
            .window(row, peak, expected_center)
            .ok_or(PeakStatus::OutOfWindow)?;
        let (start, end) = spectrum.domain().ok_or(PeakStatus::OutOfWindow)?;
        if hi < start || lo > end {
            return Err(PeakStatus::OutOfWindow);
        }
        let xmin = lo.max(start);
        let xmax = hi.min(end);
        Ok(PeakWindow {
            peak_index: peak,
            expected_center,
            xmin,
            xmax,
            range: spectrum.index_range(xmin, xmax),
        })
    }

    /// Resolve every peak window of range row `row`
    pub fn resolve_all(
        &self,
        row: usize,
        spectrum: &Spectrum,
    ) -> Vec<Result<PeakWindow, PeakStatus>> {
        (0..self.centers.peak_count())
            .map(|peak| self.resolve(row, peak, spectrum))
            .collect()
    }
}
