//! Errors that abort a fitting run before any peak is fit.
//!
//! Per-peak rejections are *not* errors, they are recorded as a
//! [`PeakStatus`](crate::peak::PeakStatus) in the output tables.
use thiserror::Error;

/// All the ways configuring or starting a fitting run can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitPeaksError {
    #[error("Unknown peak function {0:?}")]
    UnknownPeakFunction(String),
    #[error("Unknown background function {0:?}")]
    UnknownBackgroundFunction(String),
    #[error("Unknown minimizer {0:?}")]
    UnknownMinimizer(String),
    #[error("Unknown cost function {0:?}")]
    UnknownCostFunction(String),
    #[error("The fit function has no parameter named {0:?}")]
    UnknownParameter(String),
    #[error("No expected peak centers were configured")]
    NoPeaks,
    #[error("Spectrum row {row} lists {found} peak centers, expected {expected}")]
    PeakCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Spectrum row {row} lists {found} fit windows for {expected} peaks")]
    WindowCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Per-spectrum table has {found} rows but the spectrum range covers {expected}")]
    SpectrumTableMismatch { expected: usize, found: usize },
    #[error("Peak centers of spectrum row {row} are not strictly increasing")]
    UnsortedPeakCenters { row: usize },
    #[error("Peak {peak} of spectrum row {row} has an invalid fit window [{xmin}, {xmax}]")]
    InvalidWindow {
        row: usize,
        peak: usize,
        xmin: f64,
        xmax: f64,
    },
    #[error("Expected center {center} of peak {peak} in spectrum row {row} lies outside its fit window [{xmin}, {xmax}]")]
    CenterOutsideWindow {
        row: usize,
        peak: usize,
        center: f64,
        xmin: f64,
        xmax: f64,
    },
    #[error("Spectrum range {start}..{stop} is invalid for a source of {count} spectra")]
    InvalidSpectrumRange {
        start: usize,
        stop: usize,
        count: usize,
    },
    #[error("Spectrum {index} has x, y and e arrays of different lengths")]
    ArrayLengthMismatch { index: usize },
    #[error("The x array of spectrum {index} is not strictly increasing")]
    XNotSorted { index: usize },
    #[error("Invalid value {value} for setting {name}")]
    InvalidSetting { name: &'static str, value: f64 },
    #[error("Could not allocate {size} cells for the {table} table")]
    Allocation { table: &'static str, size: usize },
    #[error("Failed to build the worker pool: {0}")]
    WorkerPool(String),
}
