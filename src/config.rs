//! Settings for a fitting run.
//!
//! [`FitPeaksConfig`] is a plain value with a [`Default`] and consuming
//! builder-style setters. Function, minimizer and cost function names are kept
//! as strings here and resolved once when a [`PeakFitter`](crate::fitter::PeakFitter)
//! is created.
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::FitPeaksError;
use crate::search::is_strictly_increasing;

/// The a-priori peak centers
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeakCenters {
    /// The same centers for every spectrum
    Uniform(Vec<f64>),
    /// One row of centers per spectrum in the fitted range
    PerSpectrum(Vec<Vec<f64>>),
}

impl Default for PeakCenters {
    fn default() -> Self {
        Self::Uniform(Vec::new())
    }
}

impl PeakCenters {
    /// The number of peaks fit in every spectrum
    pub fn peak_count(&self) -> usize {
        match self {
            Self::Uniform(centers) => centers.len(),
            Self::PerSpectrum(rows) => rows.first().map(|r| r.len()).unwrap_or_default(),
        }
    }

    /// The centers of range row `row`, `None` past the end of a per-spectrum table
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        match self {
            Self::Uniform(centers) => Some(centers),
            Self::PerSpectrum(rows) => rows.get(row).map(|r| r.as_slice()),
        }
    }

    fn rows(&self) -> Vec<&[f64]> {
        match self {
            Self::Uniform(centers) => vec![centers.as_slice()],
            Self::PerSpectrum(rows) => rows.iter().map(|r| r.as_slice()).collect(),
        }
    }

    fn row_count(&self) -> Option<usize> {
        match self {
            Self::Uniform(_) => None,
            Self::PerSpectrum(rows) => Some(rows.len()),
        }
    }
}

/// How the fit window of each peak is chosen
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitWindows {
    /// `[center - h, center + h]` around every expected center
    HalfWidth(f64),
    /// One `(xmin, xmax)` per peak shared by every spectrum
    Uniform(Vec<(f64, f64)>),
    /// One row of `(xmin, xmax)` per spectrum in the fitted range
    PerSpectrum(Vec<Vec<(f64, f64)>>),
}

impl Default for FitWindows {
    fn default() -> Self {
        Self::HalfWidth(1.0)
    }
}

impl FitWindows {
    /// The configured window of peak `peak` in range row `row` expected at `center`,
    /// `None` when the tables hold no such entry
    pub fn window(&self, row: usize, peak: usize, center: f64) -> Option<(f64, f64)> {
        match self {
            Self::HalfWidth(h) => Some((center - h, center + h)),
            Self::Uniform(windows) => windows.get(peak).copied(),
            Self::PerSpectrum(rows) => rows.get(row).and_then(|r| r.get(peak)).copied(),
        }
    }

    /// Whether the tables hold a window for range row `row`
    pub fn covers(&self, row: usize) -> bool {
        match self {
            Self::PerSpectrum(rows) => row < rows.len(),
            _ => true,
        }
    }

    fn row_count(&self) -> Option<usize> {
        match self {
            Self::PerSpectrum(rows) => Some(rows.len()),
            _ => None,
        }
    }
}

/// The order peaks within one spectrum are fit in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitOrder {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl FitOrder {
    /// The peak indices in the order they are visited
    pub fn peak_order(&self, peak_count: usize) -> Vec<usize> {
        match self {
            Self::LeftToRight => (0..peak_count).collect(),
            Self::RightToLeft => (0..peak_count).rev().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BackgroundMode {
    /// Estimate the background from the window edges and fit it jointly with the peak
    #[default]
    Simple,
    /// Fit and remove the background separately before fitting the peak
    HighBackground,
}

/// How the starting peak width is chosen
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WidthEstimate {
    /// Derive the width from the observed area and height of the peak
    #[default]
    Observe,
    /// A fixed fraction of the peak position, for instruments with constant relative resolution
    ResolutionFraction(f64),
}

/// Every setting of a fitting run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitPeaksConfig {
    /// The name of the peak shape, see [`PeakShapeKind`](crate::functions::PeakShapeKind)
    pub peak_function: String,
    /// The name of the background shape, see [`BackgroundKind`](crate::functions::BackgroundKind)
    pub background_function: String,
    pub centers: PeakCenters,
    pub windows: FitWindows,
    /// The spectra to fit, all of them when `None`
    pub spectrum_range: Option<Range<usize>>,
    pub fit_order: FitOrder,
    pub background_mode: BackgroundMode,
    pub width_estimate: WidthEstimate,
    /// Peaks whose estimated or fitted height is below this value are rejected.
    /// Heights that are not positive are always rejected.
    pub min_peak_height: f64,
    /// The minimum sum of counts, checked over all windows of a spectrum and over each window
    pub min_peak_total_count: f64,
    pub min_signal_to_noise: f64,
    /// The minimum ratio of the estimated height to the uncertainty at the estimated center
    pub min_signal_to_sigma: Option<f64>,
    /// The furthest a fitted center may move from its expected center
    pub peak_position_tolerance: Option<f64>,
    /// Report the peak shape's own parameters instead of center, height, width and intensity
    pub raw_parameters: bool,
    pub minimizer: String,
    pub cost_function: String,
    pub max_iterations: usize,
    pub record_errors: bool,
    pub record_model: bool,
    /// Starting values applied by name to the template function
    pub initial_parameters: Vec<(String, f64)>,
    /// The size of the worker pool, the global pool when `None`
    pub worker_threads: Option<usize>,
}

impl Default for FitPeaksConfig {
    fn default() -> Self {
        Self {
            peak_function: "Gaussian".to_string(),
            background_function: "Linear".to_string(),
            centers: PeakCenters::default(),
            windows: FitWindows::default(),
            spectrum_range: None,
            fit_order: FitOrder::default(),
            background_mode: BackgroundMode::default(),
            width_estimate: WidthEstimate::default(),
            min_peak_height: 0.0,
            min_peak_total_count: 10.0,
            min_signal_to_noise: 0.0,
            min_signal_to_sigma: None,
            peak_position_tolerance: None,
            raw_parameters: true,
            minimizer: "Levenberg-Marquardt".to_string(),
            cost_function: "Least squares".to_string(),
            max_iterations: 50,
            record_errors: false,
            record_model: false,
            initial_parameters: Vec::new(),
            worker_threads: None,
        }
    }
}

impl FitPeaksConfig {
    pub fn new(centers: PeakCenters, windows: FitWindows) -> Self {
        Self::default().centers(centers).windows(windows)
    }

    pub fn peak_function(mut self, name: impl Into<String>) -> Self {
        self.peak_function = name.into();
        self
    }

    pub fn background_function(mut self, name: impl Into<String>) -> Self {
        self.background_function = name.into();
        self
    }

    pub fn centers(mut self, centers: PeakCenters) -> Self {
        self.centers = centers;
        self
    }

    pub fn windows(mut self, windows: FitWindows) -> Self {
        self.windows = windows;
        self
    }

    pub fn spectrum_range(mut self, range: Range<usize>) -> Self {
        self.spectrum_range = Some(range);
        self
    }

    pub fn fit_order(mut self, order: FitOrder) -> Self {
        self.fit_order = order;
        self
    }

    pub fn background_mode(mut self, mode: BackgroundMode) -> Self {
        self.background_mode = mode;
        self
    }

    pub fn width_estimate(mut self, estimate: WidthEstimate) -> Self {
        self.width_estimate = estimate;
        self
    }

    pub fn min_peak_height(mut self, value: f64) -> Self {
        self.min_peak_height = value;
        self
    }

    pub fn min_peak_total_count(mut self, value: f64) -> Self {
        self.min_peak_total_count = value;
        self
    }

    pub fn min_signal_to_noise(mut self, value: f64) -> Self {
        self.min_signal_to_noise = value;
        self
    }

    pub fn min_signal_to_sigma(mut self, value: f64) -> Self {
        self.min_signal_to_sigma = Some(value);
        self
    }

    pub fn peak_position_tolerance(mut self, value: f64) -> Self {
        self.peak_position_tolerance = Some(value);
        self
    }

    pub fn raw_parameters(mut self, value: bool) -> Self {
        self.raw_parameters = value;
        self
    }

    pub fn minimizer(mut self, name: impl Into<String>) -> Self {
        self.minimizer = name.into();
        self
    }

    pub fn cost_function(mut self, name: impl Into<String>) -> Self {
        self.cost_function = name.into();
        self
    }

    pub fn max_iterations(mut self, value: usize) -> Self {
        self.max_iterations = value;
        self
    }

    pub fn record_errors(mut self, value: bool) -> Self {
        self.record_errors = value;
        self
    }

    pub fn record_model(mut self, value: bool) -> Self {
        self.record_model = value;
        self
    }

    pub fn initial_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.initial_parameters.push((name.into(), value));
        self
    }

    pub fn worker_threads(mut self, value: usize) -> Self {
        self.worker_threads = Some(value);
        self
    }

    /// The number of peak slots in every spectrum
    pub fn peak_count(&self) -> usize {
        self.centers.peak_count()
    }

    fn check_setting(name: &'static str, value: f64, valid: bool) -> Result<(), FitPeaksError> {
        if valid {
            Ok(())
        } else {
            Err(FitPeaksError::InvalidSetting { name, value })
        }
    }

    /// Check the settings that do not depend on the data source: thresholds, and the
    /// shape and ordering of the center and window tables
    pub fn validate(&self) -> Result<(), FitPeaksError> {
        let n_peaks = self.peak_count();
        if n_peaks == 0 {
            return Err(FitPeaksError::NoPeaks);
        }

        Self::check_setting(
            "min_peak_height",
            self.min_peak_height,
            self.min_peak_height.is_finite(),
        )?;
        Self::check_setting(
            "min_peak_total_count",
            self.min_peak_total_count,
            self.min_peak_total_count.is_finite() && self.min_peak_total_count >= 0.0,
        )?;
        Self::check_setting(
            "min_signal_to_noise",
            self.min_signal_to_noise,
            self.min_signal_to_noise.is_finite() && self.min_signal_to_noise >= 0.0,
        )?;
        if let Some(value) = self.min_signal_to_sigma {
            Self::check_setting("min_signal_to_sigma", value, value.is_finite() && value >= 0.0)?;
        }
        if let Some(value) = self.peak_position_tolerance {
            Self::check_setting("peak_position_tolerance", value, value > 0.0)?;
        }
        if let WidthEstimate::ResolutionFraction(value) = self.width_estimate {
            Self::check_setting("width_estimate", value, value.is_finite() && value > 0.0)?;
        }
        if let FitWindows::HalfWidth(value) = self.windows {
            Self::check_setting("windows", value, value.is_finite() && value > 0.0)?;
        }
        Self::check_setting(
            "max_iterations",
            self.max_iterations as f64,
            self.max_iterations > 0,
        )?;
        if let Some(value) = self.worker_threads {
            Self::check_setting("worker_threads", value as f64, value > 0)?;
        }

        for (row, centers) in self.centers.rows().into_iter().enumerate() {
            if centers.len() != n_peaks {
                return Err(FitPeaksError::PeakCountMismatch {
                    row,
                    expected: n_peaks,
                    found: centers.len(),
                });
            }
            if !is_strictly_increasing(centers) {
                return Err(FitPeaksError::UnsortedPeakCenters { row });
            }
        }

        match &self.windows {
            FitWindows::HalfWidth(_) => {}
            FitWindows::Uniform(windows) => {
                if windows.len() != n_peaks {
                    return Err(FitPeaksError::WindowCountMismatch {
                        row: 0,
                        expected: n_peaks,
                        found: windows.len(),
                    });
                }
            }
            FitWindows::PerSpectrum(rows) => {
                for (row, windows) in rows.iter().enumerate() {
                    if windows.len() != n_peaks {
                        return Err(FitPeaksError::WindowCountMismatch {
                            row,
                            expected: n_peaks,
                            found: windows.len(),
                        });
                    }
                }
            }
        }

        if let (Some(n_centers), Some(n_windows)) =
            (self.centers.row_count(), self.windows.row_count())
        {
            if n_centers != n_windows {
                return Err(FitPeaksError::SpectrumTableMismatch {
                    expected: n_centers,
                    found: n_windows,
                });
            }
        }

        let n_rows = self
            .centers
            .row_count()
            .or(self.windows.row_count())
            .unwrap_or(1);
        for row in 0..n_rows {
            let centers = self.centers.row(row).unwrap_or_default();
            for (peak, center) in centers.iter().copied().enumerate() {
                let (xmin, xmax) = self
                    .windows
                    .window(row, peak, center)
                    .unwrap_or((f64::NAN, f64::NAN));
                if !(xmin.is_finite() && xmax.is_finite() && xmin < xmax) {
                    return Err(FitPeaksError::InvalidWindow {
                        row,
                        peak,
                        xmin,
                        xmax,
                    });
                }
                if center < xmin || center > xmax {
                    return Err(FitPeaksError::CenterOutsideWindow {
                        row,
                        peak,
                        center,
                        xmin,
                        xmax,
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve the spectra to fit from a source holding `spectrum_count` spectra, checking
    /// that any per-spectrum table has one row per spectrum in the range
    pub fn resolve_spectrum_range(
        &self,
        spectrum_count: usize,
    ) -> Result<Range<usize>, FitPeaksError> {
        let range = self.spectrum_range.clone().unwrap_or(0..spectrum_count);
        if range.start > range.end || range.end > spectrum_count {
            return Err(FitPeaksError::InvalidSpectrumRange {
                start: range.start,
                stop: range.end,
                count: spectrum_count,
            });
        }
        let n_rows = range.len();
        if let Some(found) = self.centers.row_count().or(self.windows.row_count()) {
            if found != n_rows {
                return Err(FitPeaksError::SpectrumTableMismatch {
                    expected: n_rows,
                    found,
                });
            }
        }
        Ok(range)
    }
}
