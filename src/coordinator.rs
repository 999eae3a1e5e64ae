//! Fan the spectra of a source out over a worker pool.
//!
//! The output tables are allocated up front and split into one
//! [`SpectrumSlot`](crate::output::SpectrumSlot) per spectrum before any work starts.
//! Each spectrum is an independent task that only touches its own slot, so the
//! tables need no locking. Peaks within one spectrum are always fit in sequence.
//!
//! With the `parallelism` feature the tasks run on [`rayon`], otherwise they run in
//! order on the calling thread and produce identical tables.
use std::fmt;
use std::ops::{Add, AddAssign};

use log::{debug, info};

#[cfg(feature = "parallelism")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::FitPeaksConfig;
use crate::error::FitPeaksError;
use crate::fitter::{PeakFitter, SpectrumFit};
use crate::output::{FitPeaksOutput, ResultRecorder, SpectrumSlot, TableLayout};
use crate::peak::{CountScope, PeakStatus};
use crate::solver::LeastSquaresSolver;
use crate::spectrum::{Spectrum, SpectrumSource};

/// How many peaks ended in each state over a run, and how much solver work it took
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitSummary {
    pub spectra: usize,
    pub good: usize,
    pub low_height_pre_fit: usize,
    pub low_height_post_fit: usize,
    pub out_of_window: usize,
    pub not_enough_points: usize,
    pub low_signal_to_noise: usize,
    pub low_spectrum_count: usize,
    pub low_peak_count: usize,
    pub fit_failed: usize,
    pub solver_calls: usize,
}

impl FitSummary {
    pub fn count(&mut self, status: PeakStatus) {
        let counter = match status {
            PeakStatus::Good => &mut self.good,
            PeakStatus::LowHeightPreFit => &mut self.low_height_pre_fit,
            PeakStatus::LowHeightPostFit => &mut self.low_height_post_fit,
            PeakStatus::OutOfWindow => &mut self.out_of_window,
            PeakStatus::NotEnoughPoints => &mut self.not_enough_points,
            PeakStatus::LowSignalToNoise => &mut self.low_signal_to_noise,
            PeakStatus::LowTotalCount(CountScope::Spectrum) => &mut self.low_spectrum_count,
            PeakStatus::LowTotalCount(CountScope::Peak) => &mut self.low_peak_count,
            PeakStatus::FitFailed => &mut self.fit_failed,
        };
        *counter += 1;
    }

    /// The number of peaks counted in any state
    pub fn peaks(&self) -> usize {
        self.good + self.rejected()
    }

    pub fn rejected(&self) -> usize {
        self.low_height_pre_fit
            + self.low_height_post_fit
            + self.out_of_window
            + self.not_enough_points
            + self.low_signal_to_noise
            + self.low_spectrum_count
            + self.low_peak_count
            + self.fit_failed
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            spectra: self.spectra + other.spectra,
            good: self.good + other.good,
            low_height_pre_fit: self.low_height_pre_fit + other.low_height_pre_fit,
            low_height_post_fit: self.low_height_post_fit + other.low_height_post_fit,
            out_of_window: self.out_of_window + other.out_of_window,
            not_enough_points: self.not_enough_points + other.not_enough_points,
            low_signal_to_noise: self.low_signal_to_noise + other.low_signal_to_noise,
            low_spectrum_count: self.low_spectrum_count + other.low_spectrum_count,
            low_peak_count: self.low_peak_count + other.low_peak_count,
            fit_failed: self.fit_failed + other.fit_failed,
            solver_calls: self.solver_calls + other.solver_calls,
        }
    }
}

impl From<&SpectrumFit> for FitSummary {
    fn from(fit: &SpectrumFit) -> Self {
        let mut summary = Self {
            spectra: 1,
            solver_calls: fit.solver_calls,
            ..Default::default()
        };
        for outcome in fit.outcomes.iter() {
            summary.count(outcome.status);
        }
        summary
    }
}

impl Add for FitSummary {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.merge(rhs)
    }
}

impl AddAssign for FitSummary {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.merge(rhs);
    }
}

impl fmt::Display for FitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} spectra, {} of {} peaks fit with {} solver calls",
            self.spectra,
            self.good,
            self.peaks(),
            self.solver_calls
        )?;
        let rejections = [
            ("low estimated height", self.low_height_pre_fit),
            ("low fitted height", self.low_height_post_fit),
            ("out of window", self.out_of_window),
            ("too few points", self.not_enough_points),
            ("low signal to noise", self.low_signal_to_noise),
            ("low spectrum count", self.low_spectrum_count),
            ("low peak count", self.low_peak_count),
            ("failed", self.fit_failed),
        ];
        for (label, count) in rejections.into_iter().filter(|(_, n)| *n > 0) {
            write!(f, ", {count} {label}")?;
        }
        Ok(())
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallelism")] {
        fn fit_slots<S: LeastSquaresSolver>(
            fitter: &PeakFitter<S>,
            spectra: &[Spectrum],
            recorder: &ResultRecorder,
            slots: Vec<SpectrumSlot<'_>>,
        ) -> FitSummary {
            slots
                .into_par_iter()
                .map(|slot| fitter.fit_slot(spectra, recorder, slot))
                .reduce(FitSummary::default, FitSummary::merge)
        }
    } else {
        fn fit_slots<S: LeastSquaresSolver>(
            fitter: &PeakFitter<S>,
            spectra: &[Spectrum],
            recorder: &ResultRecorder,
            slots: Vec<SpectrumSlot<'_>>,
        ) -> FitSummary {
            slots.into_iter().fold(FitSummary::default(), |acc, slot| {
                acc.merge(fitter.fit_slot(spectra, recorder, slot))
            })
        }
    }
}

impl<S: LeastSquaresSolver> PeakFitter<S> {
    fn fit_slot(&self, spectra: &[Spectrum], recorder: &ResultRecorder, slot: SpectrumSlot<'_>) -> FitSummary {
        let spectrum = &spectra[slot.row];
        let fit = self.fit_spectrum(slot.row, slot.spectrum_index, spectrum);
        let summary = FitSummary::from(&fit);
        recorder.record(&fit, spectrum, slot);
        summary
    }

    #[cfg(feature = "parallelism")]
    fn run(
        &self,
        spectra: &[Spectrum],
        recorder: &ResultRecorder,
        slots: Vec<SpectrumSlot<'_>>,
    ) -> Result<FitSummary, FitPeaksError> {
        match self.config().worker_threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| FitPeaksError::WorkerPool(e.to_string()))?;
                Ok(pool.install(|| fit_slots(self, spectra, recorder, slots)))
            }
            None => Ok(fit_slots(self, spectra, recorder, slots)),
        }
    }

    #[cfg(not(feature = "parallelism"))]
    fn run(
        &self,
        spectra: &[Spectrum],
        recorder: &ResultRecorder,
        slots: Vec<SpectrumSlot<'_>>,
    ) -> Result<FitSummary, FitPeaksError> {
        if let Some(threads) = self.config().worker_threads {
            debug!("Ignoring request for {threads} worker threads without parallelism");
        }
        Ok(fit_slots(self, spectra, recorder, slots))
    }

    /// Fit every configured peak of every spectrum in the configured range of `source`.
    ///
    /// Configuration, input and allocation problems are reported before any peak is
    /// fit. Once fitting starts every (spectrum, peak) slot receives a value.
    pub fn fit<T: SpectrumSource + ?Sized>(&self, source: &T) -> Result<FitPeaksOutput, FitPeaksError> {
        let count = source.spectrum_count();
        let range = self.config().resolve_spectrum_range(count)?;
        let spectra = range
            .clone()
            .map(|index| -> Result<Spectrum<'_>, FitPeaksError> {
                let spectrum = source
                    .spectrum(index)
                    .ok_or(FitPeaksError::InvalidSpectrumRange {
                        start: range.start,
                        stop: range.end,
                        count,
                    })?;
                spectrum.validate(index)?;
                Ok(spectrum)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let recorder = ResultRecorder::new(self.config().raw_parameters, self.template());
        let layout = TableLayout {
            spectrum_indices: range.clone(),
            peak_count: self.peak_count(),
            column_names: recorder.column_names(self.template()),
            record_errors: self.config().record_errors,
            record_model: self.config().record_model,
        };
        let mut output = FitPeaksOutput::allocate(&layout, &spectra)?;
        debug!(
            "Fitting {} peaks in each of spectra {}..{} with {}",
            layout.peak_count,
            range.start,
            range.end,
            self.template()
        );

        let slots = output.slots_mut();
        let summary = self.run(&spectra, &recorder, slots)?;
        info!("Fit {summary}");
        output.summary = summary;
        Ok(output)
    }
}

/// Build a [`PeakFitter`] with the default solver from `config` and fit `source` with it
pub fn fit_peaks<T: SpectrumSource + ?Sized>(
    config: FitPeaksConfig,
    source: &T,
) -> Result<FitPeaksOutput, FitPeaksError> {
    PeakFitter::new(config)?.fit(source)
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;
    use crate::config::{FitWindows, PeakCenters};
    use crate::fitter::test::CountingSolver;
    use crate::functions::ParametricFunction;
    use crate::synthetic::SyntheticSpectrum;

    macro_rules! assert_is_close {
        ($t1:expr, $t2:expr, $tol:expr, $label:literal) => {
            assert!(
                ($t1 - $t2).abs() < $tol,
                "Observed {} {}, expected {}, difference {}",
                $label,
                $t1,
                $t2,
                $t1 - $t2,
            );
        };
    }

    fn drifting_spectra() -> Vec<Spectrum<'static>> {
        SyntheticSpectrum::default()
            .background([1.0, 0.0, 0.0])
            .peak(3.0, 4.0, 0.12)
            .peak(7.0, 2.0, 0.15)
            .noise(0.02)
            .seed(11)
            .generate_many(6, 0.02)
    }

    fn config() -> FitPeaksConfig {
        FitPeaksConfig::new(
            PeakCenters::Uniform(vec![3.0, 7.0]),
            FitWindows::HalfWidth(1.0),
        )
    }

    #[test_log::test]
    fn test_fit_many_spectra() {
        let spectra = drifting_spectra();
        let fitter = PeakFitter::new(config()).unwrap();
        let output = fitter.fit(&spectra).unwrap();

        assert_eq!(output.positions.len(), 6);
        assert_eq!(output.parameters.len(), 12);
        for (k, row) in output.positions.rows().enumerate() {
            let shift = 0.02 * k as f64;
            assert_is_close!(row[0], 3.0 + shift, 1e-2, "first center");
            assert_is_close!(row[1], 7.0 + shift, 1e-2, "second center");
        }
        assert!(output.parameters.chi2.iter().all(|c| c.is_finite()));
        assert_eq!(output.summary.spectra, 6);
        assert_eq!(output.summary.good, 12);
        assert_eq!(output.summary.solver_calls, 12);
        assert!(output.errors.is_none());
        assert!(output.model.is_none());
    }

    #[test]
    fn test_low_count_table_never_reaches_solver() {
        let spectra = SyntheticSpectrum::default()
            .background([0.01, 0.0, 0.0])
            .generate_many(3, 0.0);
        let fitter = PeakFitter::with_solver(config(), CountingSolver::default()).unwrap();
        let output = fitter.fit(&spectra).unwrap();

        assert!(output.positions.values.iter().all(|v| *v == -1.0));
        assert!(output.parameters.values.iter().all(|v| *v == 0.0));
        assert!(output.parameters.chi2.iter().all(|c| c.is_infinite()));
        assert_eq!(fitter.solver().calls(), 0);
        assert_eq!(output.summary.low_spectrum_count, 6);
        assert_eq!(output.summary.solver_calls, 0);
    }

    #[test]
    fn test_fitting_is_repeatable() {
        let spectra = drifting_spectra();
        let fitter = PeakFitter::new(config().record_errors(true).record_model(true)).unwrap();
        let first = fitter.fit(&spectra).unwrap();
        let second = fitter.fit(&spectra).unwrap();
        assert_eq!(first, second);

        let pooled = PeakFitter::new(
            config()
                .record_errors(true)
                .record_model(true)
                .worker_threads(2),
        )
        .unwrap()
        .fit(&spectra)
        .unwrap();
        assert_eq!(first, pooled);
    }

    #[test]
    fn test_model_matches_parameters() {
        let spectra = drifting_spectra();
        let fitter = PeakFitter::new(config().record_model(true)).unwrap();
        let output = fitter.fit(&spectra).unwrap();
        let model = output.model.as_ref().unwrap();

        for row in 0..output.parameters.len() {
            let mut function = *fitter.template();
            function.set_parameters(output.parameters.row(row));
            let spectrum_row = row / 2;
            let centre = output.positions.row(spectrum_row)[row % 2];
            let i = spectra[spectrum_row].index_range(centre, f64::INFINITY).start;
            let x = model.x[spectrum_row][i];
            assert_is_close!(function.evaluate(x), model.y[spectrum_row][i], 1e-9, "model");
            assert_is_close!(model.y[spectrum_row][i], spectra[spectrum_row].y[i], 0.1, "data");
        }
        // outside every window the workspace is left at zero
        assert_eq!(model.y[0][0], 0.0);
        assert_eq!(model.y[0][499], 0.0);
    }

    #[test]
    fn test_effective_parameters_and_errors() {
        let spectra = drifting_spectra();
        let fitter = PeakFitter::new(config().raw_parameters(false).record_errors(true)).unwrap();
        let output = fitter.fit(&spectra).unwrap();
        assert_eq!(
            output.parameters.column_names,
            vec!["PeakCentre", "Height", "FWHM", "Intensity", "A0", "A1", "A2"]
        );
        assert_eq!(output.parameters.get(0, "PeakCentre"), output.positions.get(0, 0));
        assert_is_close!(output.parameters.get(0, "Height").unwrap(), 4.0, 0.1, "height");
        assert_is_close!(output.parameters.get(1, "FWHM").unwrap(), 0.15 * 2.3548, 1e-2, "fwhm");
        assert_eq!(output.parameters.get(0, "A2"), Some(0.0));

        let errors = output.errors.as_ref().unwrap();
        let centre_error = errors.get(0, "PeakCentre").unwrap();
        assert!(centre_error > 0.0 && centre_error < 1e-2, "{centre_error}");
        assert_eq!(errors.get(0, "A2"), Some(0.0));
    }

    #[test]
    fn test_spectrum_range() {
        let spectra = drifting_spectra();
        let output = PeakFitter::new(config().spectrum_range(2..4))
            .unwrap()
            .fit(&spectra)
            .unwrap();
        assert_eq!(output.positions.spectrum_indices, vec![2, 3]);
        assert_eq!(output.parameters.spectrum_indices, vec![2, 2, 3, 3]);
        assert_eq!(output.parameters.peak_indices, vec![0, 1, 0, 1]);
        assert_is_close!(output.positions.get(0, 0).unwrap(), 3.04, 1e-2, "center");
    }

    #[rstest]
    #[case::out_of_bounds(config().spectrum_range(4..8), FitPeaksError::InvalidSpectrumRange { start: 4, stop: 8, count: 6 })]
    #[case::table_rows(
        config().centers(PeakCenters::PerSpectrum(vec![vec![3.0, 7.0]; 2])),
        FitPeaksError::SpectrumTableMismatch { expected: 6, found: 2 }
    )]
    fn test_invalid_range(#[case] config: FitPeaksConfig, #[case] error: FitPeaksError) {
        let spectra = drifting_spectra();
        assert_eq!(fit_peaks(config, &spectra).err(), Some(error));
    }

    #[test]
    fn test_malformed_spectrum() {
        let mut spectra = drifting_spectra();
        spectra[3] = Spectrum::from((vec![0.0, 2.0, 1.0], vec![1.0; 3], vec![1.0; 3]));
        assert_eq!(
            fit_peaks(config(), &spectra).err(),
            Some(FitPeaksError::XNotSorted { index: 3 })
        );
    }

    #[test]
    fn test_summary() {
        let mut summary = FitSummary::default();
        summary.count(PeakStatus::Good);
        summary.count(PeakStatus::LowSignalToNoise);
        summary.count(PeakStatus::LowTotalCount(CountScope::Peak));
        let total = summary + FitSummary { spectra: 1, solver_calls: 3, ..Default::default() };
        assert_eq!(total.peaks(), 3);
        assert_eq!(total.rejected(), 2);
        assert_eq!(
            total.to_string(),
            "1 spectra, 1 of 3 peaks fit with 3 solver calls, 1 low signal to noise, 1 low peak count"
        );
    }
}
