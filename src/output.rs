//! The rectangular result tables of a fitting run.
//!
//! Every table is allocated in full before fitting starts, with one slot for every
//! (spectrum, peak) pair. [`FitPeaksOutput::slots_mut`] then splits the tables into
//! one [`SpectrumSlot`] per spectrum, a set of disjoint mutable row views that a
//! worker fills through the [`ResultRecorder`] without coordinating with any other.
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coordinator::FitSummary;
use crate::error::FitPeaksError;
use crate::fitter::SpectrumFit;
use crate::functions::{CompositeFunction, ParametricFunction};
use crate::spectrum::Spectrum;

fn allocate<T: Clone>(table: &'static str, size: usize, fill: T) -> Result<Vec<T>, FitPeaksError> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(size)
        .map_err(|_| FitPeaksError::Allocation { table, size })?;
    values.resize(size, fill);
    Ok(values)
}

/// The fitted center of every peak, one row per spectrum and one column per peak.
/// Peaks that were not fit hold a negative sentinel, see [`PeakStatus::sentinel`](crate::peak::PeakStatus::sentinel).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionsTable {
    pub spectrum_indices: Vec<usize>,
    pub peak_count: usize,
    /// Row-major `spectrum_indices.len() x peak_count` values
    pub values: Vec<f64>,
}

impl PositionsTable {
    pub fn len(&self) -> usize {
        self.spectrum_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum_indices.is_empty()
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.peak_count..(row + 1) * self.peak_count]
    }

    pub fn get(&self, row: usize, peak: usize) -> Option<f64> {
        if peak >= self.peak_count {
            return None;
        }
        self.values.get(row * self.peak_count + peak).copied()
    }

    pub fn rows(&self) -> std::slice::Chunks<'_, f64> {
        self.values.chunks(self.peak_count)
    }
}

/// The parameters of every (spectrum, peak) pair, one row each, with the cost of the fit
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParametersTable {
    pub column_names: Vec<String>,
    pub spectrum_indices: Vec<usize>,
    pub peak_indices: Vec<usize>,
    /// Row-major `len() x column_names.len()` values
    pub values: Vec<f64>,
    /// The goodness of fit of each row, `+inf` when the peak was not fit
    pub chi2: Vec<f64>,
}

impl ParametersTable {
    pub fn len(&self) -> usize {
        self.peak_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peak_indices.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.column_names.len()
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let n = self.column_count();
        &self.values[row * n..(row + 1) * n]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    /// The value of column `name` in row `row`
    pub fn get(&self, row: usize, name: &str) -> Option<f64> {
        let column = self.column_index(name)?;
        self.values.get(row * self.column_count() + column).copied()
    }
}

/// The standard errors matching a [`ParametersTable`], cell for cell
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ErrorTable {
    pub column_names: Vec<String>,
    pub spectrum_indices: Vec<usize>,
    pub peak_indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl ErrorTable {
    pub fn row(&self, row: usize) -> &[f64] {
        let n = self.column_names.len();
        &self.values[row * n..(row + 1) * n]
    }

    pub fn get(&self, row: usize, name: &str) -> Option<f64> {
        let column = self.column_names.iter().position(|c| c == name)?;
        self.values.get(row * self.column_names.len() + column).copied()
    }
}

/// The fitted model evaluated on each input spectrum's own x values, inside each
/// good peak's window and zero everywhere else
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModelWorkspace {
    pub spectrum_indices: Vec<usize>,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<Vec<f64>>,
}

/// Everything a fitting run produces
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitPeaksOutput {
    pub positions: PositionsTable,
    pub parameters: ParametersTable,
    pub errors: Option<ErrorTable>,
    pub model: Option<ModelWorkspace>,
    pub summary: FitSummary,
}

/// The shape of the tables of one run
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub spectrum_indices: Range<usize>,
    pub peak_count: usize,
    pub column_names: Vec<String>,
    pub record_errors: bool,
    pub record_model: bool,
}

impl FitPeaksOutput {
    /// Allocate every table for `layout`, where `spectra` are the spectra of
    /// `layout.spectrum_indices` in order
    pub fn allocate(layout: &TableLayout, spectra: &[Spectrum]) -> Result<Self, FitPeaksError> {
        let n_rows = layout.spectrum_indices.len();
        let n_peaks = layout.peak_count;
        let n_columns = layout.column_names.len();
        let n_cells = n_rows * n_peaks;

        let mut spectrum_indices = allocate("positions", n_rows, 0usize)?;
        for (slot, index) in spectrum_indices.iter_mut().zip(layout.spectrum_indices.clone()) {
            *slot = index;
        }
        let positions = PositionsTable {
            spectrum_indices: spectrum_indices.clone(),
            peak_count: n_peaks,
            values: allocate("positions", n_cells, 0.0)?,
        };

        let mut row_spectra = allocate("parameters", n_cells, 0usize)?;
        let mut row_peaks = allocate("parameters", n_cells, 0usize)?;
        for (i, (spectrum, peak)) in row_spectra.iter_mut().zip(row_peaks.iter_mut()).enumerate() {
            *spectrum = spectrum_indices[i / n_peaks];
            *peak = i % n_peaks;
        }
        let parameters = ParametersTable {
            column_names: layout.column_names.clone(),
            spectrum_indices: row_spectra.clone(),
            peak_indices: row_peaks.clone(),
            values: allocate("parameters", n_cells * n_columns, 0.0)?,
            chi2: allocate("parameters", n_cells, f64::INFINITY)?,
        };

        let errors = if layout.record_errors {
            Some(ErrorTable {
                column_names: layout.column_names.clone(),
                spectrum_indices: row_spectra,
                peak_indices: row_peaks,
                values: allocate("errors", n_cells * n_columns, 0.0)?,
            })
        } else {
            None
        };

        let model = if layout.record_model {
            let mut x = Vec::new();
            x.try_reserve_exact(n_rows)
                .map_err(|_| FitPeaksError::Allocation { table: "model", size: n_rows })?;
            let mut y = Vec::new();
            y.try_reserve_exact(n_rows)
                .map_err(|_| FitPeaksError::Allocation { table: "model", size: n_rows })?;
            for spectrum in spectra.iter() {
                let mut xs = allocate("model", spectrum.len(), 0.0)?;
                xs.copy_from_slice(&spectrum.x);
                x.push(xs);
                y.push(allocate("model", spectrum.len(), 0.0)?);
            }
            Some(ModelWorkspace {
                spectrum_indices,
                x,
                y,
            })
        } else {
            None
        };

        Ok(Self {
            positions,
            parameters,
            errors,
            model,
            summary: FitSummary::default(),
        })
    }

    /// Split the tables into one exclusive [`SpectrumSlot`] per spectrum row
    pub fn slots_mut(&mut self) -> Vec<SpectrumSlot<'_>> {
        let Self {
            positions,
            parameters,
            errors,
            model,
            ..
        } = self;
        let n_peaks = positions.peak_count;
        let width = n_peaks * parameters.column_names.len();

        let mut error_rows = errors.as_mut().map(|t| t.values.chunks_mut(width));
        let mut model_rows = model.as_mut().map(|m| m.y.iter_mut());

        positions
            .values
            .chunks_mut(n_peaks)
            .zip(parameters.values.chunks_mut(width))
            .zip(parameters.chi2.chunks_mut(n_peaks))
            .zip(positions.spectrum_indices.iter().copied())
            .enumerate()
            .map(|(row, (((position, parameters), chi2), spectrum_index))| SpectrumSlot {
                row,
                spectrum_index,
                positions: position,
                parameters,
                chi2,
                errors: error_rows.as_mut().and_then(|rows| rows.next()),
                model: model_rows
                    .as_mut()
                    .and_then(|rows| rows.next())
                    .map(|y| y.as_mut_slice()),
            })
            .collect()
    }
}

/// The cells of the output tables belonging to one spectrum
#[derive(Debug)]
pub struct SpectrumSlot<'a> {
    /// The row of the spectrum within the fitted range
    pub row: usize,
    pub spectrum_index: usize,
    /// One position per peak
    pub positions: &'a mut [f64],
    /// One parameter row per peak
    pub parameters: &'a mut [f64],
    pub chi2: &'a mut [f64],
    pub errors: Option<&'a mut [f64]>,
    /// One model value per point of the spectrum
    pub model: Option<&'a mut [f64]>,
}

/// First-order propagation of the raw parameter `errors` of `function` onto its
/// effective parameters, treating the raw parameters as uncorrelated
pub fn effective_errors(function: &CompositeFunction, errors: &[f64]) -> [f64; 7] {
    let base = function.parameters();
    let mut variance = [0.0; 7];
    for (j, sigma) in errors.iter().copied().enumerate().take(base.len()) {
        if sigma == 0.0 || !sigma.is_finite() {
            continue;
        }
        let h = 1e-6 * base[j].abs().max(1e-2);
        let mut upper = *function;
        upper.set_parameter(j, base[j] + h);
        let mut lower = *function;
        lower.set_parameter(j, base[j] - h);
        let upper = upper.effective_parameters();
        let lower = lower.effective_parameters();
        for (k, v) in variance.iter_mut().enumerate() {
            let derivative = (upper[k] - lower[k]) / (2.0 * h);
            *v += (derivative * sigma).powi(2);
        }
    }
    variance.map(f64::sqrt)
}

/// Writes [`SpectrumFit`]s into their [`SpectrumSlot`]s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultRecorder {
    /// Record each peak shape's own parameters rather than the effective ones
    pub raw_parameters: bool,
    /// The number of parameter columns
    pub width: usize,
}

impl ResultRecorder {
    pub fn new(raw_parameters: bool, template: &CompositeFunction) -> Self {
        let width = if raw_parameters {
            template.parameter_count()
        } else {
            CompositeFunction::effective_parameter_names().len()
        };
        Self {
            raw_parameters,
            width,
        }
    }

    /// The parameter table's column names for functions shaped like `template`
    pub fn column_names(&self, template: &CompositeFunction) -> Vec<String> {
        let names = if self.raw_parameters {
            template.parameter_names()
        } else {
            CompositeFunction::effective_parameter_names()
        };
        names.into_iter().map(String::from).collect()
    }

    fn values(&self, function: &CompositeFunction) -> Vec<f64> {
        if self.raw_parameters {
            function.parameters()
        } else {
            function.effective_parameters().to_vec()
        }
    }

    fn errors(&self, function: &CompositeFunction, errors: &[f64]) -> Vec<f64> {
        if self.raw_parameters {
            errors.to_vec()
        } else {
            effective_errors(function, errors).to_vec()
        }
    }

    fn write_row(row: &mut [f64], values: Option<Vec<f64>>) {
        match values {
            Some(values) => {
                for (cell, value) in row.iter_mut().zip(values.into_iter().chain(std::iter::repeat(0.0))) {
                    *cell = value;
                }
            }
            None => row.fill(0.0),
        }
    }

    /// Write every outcome of `fit` into `slot`. `spectrum` supplies the x values the
    /// model is evaluated at.
    pub fn record(&self, fit: &SpectrumFit, spectrum: &Spectrum, slot: SpectrumSlot<'_>) {
        let SpectrumSlot {
            positions,
            parameters,
            chi2,
            mut errors,
            mut model,
            ..
        } = slot;
        let width = self.width;

        if let Some(model) = model.as_deref_mut() {
            model.fill(0.0);
        }

        for outcome in fit.outcomes.iter() {
            let peak = outcome.peak_index;
            positions[peak] = outcome.position();
            chi2[peak] = if outcome.is_good() {
                outcome.cost
            } else {
                f64::INFINITY
            };

            let row = &mut parameters[peak * width..(peak + 1) * width];
            Self::write_row(row, outcome.function.as_ref().map(|f| self.values(f)));

            if let Some(errors) = errors.as_deref_mut() {
                let row = &mut errors[peak * width..(peak + 1) * width];
                let values = match &outcome.function {
                    Some(f) if !outcome.errors.is_empty() => Some(self.errors(f, &outcome.errors)),
                    _ => None,
                };
                Self::write_row(row, values);
            }

            if let (Some(model), Some(function), Some(range), true) = (
                model.as_deref_mut(),
                outcome.function.as_ref(),
                outcome.window.as_ref(),
                outcome.is_good(),
            ) {
                let values = function.predict(&spectrum.x[range.clone()]);
                model[range.clone()].copy_from_slice(&values);
            }
        }
    }
}
