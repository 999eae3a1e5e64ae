//! Fitting every expected peak of one spectrum.
//!
//! [`PeakFitter`] owns the resolved configuration: the template function, the
//! validators and the solver. [`PeakFitter::fit_spectrum`] walks the peaks of a
//! spectrum in the configured order, running each through
//!
//! 1. window resolution
//! 2. the data checks of the [`PreFitValidator`]
//! 3. background estimation
//! 4. peak parameter estimation and the estimate checks
//! 5. the solver
//! 6. the [`PostFitValidator`]
//!
//! A peak that passes every stage hands its fitted function to the next peak as
//! its starting point. The next peak re-estimates its center, height and
//! background but keeps the width and shape parameters it was handed. Any other
//! outcome leaves the next peak to start from the template function and its
//! estimated width.
use log::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::background::{subtract, BackgroundEstimator};
use crate::config::FitPeaksConfig;
use crate::error::FitPeaksError;
use crate::estimate::{search_range, PeakParameterEstimator};
use crate::functions::{BackgroundKind, CompositeFunction, ParametricFunction, PeakFunction, PeakShapeKind};
use crate::peak::{CountScope, PeakFitOutcome, PeakStatus};
use crate::solver::{CostFunction, FitRequest, LeastSquaresSolver, LevenbergMarquardt, Minimizer};
use crate::spectrum::Spectrum;
use crate::validate::{PostFitValidator, PreFitValidator};
use crate::window::{PeakWindow, WindowResolver};

/// The outcomes of every peak of one spectrum, in peak order
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpectrumFit {
    pub spectrum_index: usize,
    pub outcomes: Vec<PeakFitOutcome>,
    /// The number of times the solver was invoked for this spectrum
    pub solver_calls: usize,
}

impl SpectrumFit {
    pub fn positions(&self) -> Vec<f64> {
        self.outcomes.iter().map(|o| o.position()).collect()
    }
}

/// Fits the expected peaks of a spectrum with a [`LeastSquaresSolver`]
#[derive(Debug, Clone)]
pub struct PeakFitter<S: LeastSquaresSolver = LevenbergMarquardt> {
    config: FitPeaksConfig,
    template: CompositeFunction,
    minimizer: Minimizer,
    cost_function: CostFunction,
    estimator: PeakParameterEstimator,
    pre_fit: PreFitValidator,
    post_fit: PostFitValidator,
    solver: S,
}

impl PeakFitter<LevenbergMarquardt> {
    /// Create a fitter using the default [`LevenbergMarquardt`] solver
    pub fn new(config: FitPeaksConfig) -> Result<Self, FitPeaksError> {
        Self::with_solver(config, LevenbergMarquardt::default())
    }
}

impl<S: LeastSquaresSolver> PeakFitter<S> {
    /// Validate `config`, resolve its function, minimizer and cost function names,
    /// and build the template function from its initial parameters
    pub fn with_solver(config: FitPeaksConfig, solver: S) -> Result<Self, FitPeaksError> {
        config.validate()?;
        let peak_kind: PeakShapeKind = config.peak_function.parse()?;
        let background_kind: BackgroundKind = config.background_function.parse()?;
        let minimizer: Minimizer = config.minimizer.parse()?;
        let cost_function: CostFunction = config.cost_function.parse()?;

        let mut template = CompositeFunction::new(peak_kind.create(), background_kind.create());
        for (name, value) in config.initial_parameters.iter() {
            template.set_parameter_by_name(name, *value)?;
        }

        let estimator = PeakParameterEstimator::new(config.width_estimate);
        let pre_fit = PreFitValidator {
            min_peak_total_count: config.min_peak_total_count,
            min_signal_to_noise: config.min_signal_to_noise,
            min_signal_to_sigma: config.min_signal_to_sigma,
            min_peak_height: config.min_peak_height,
        };
        let post_fit = PostFitValidator {
            min_peak_height: config.min_peak_height,
            peak_position_tolerance: config.peak_position_tolerance,
        };

        Ok(Self {
            config,
            template,
            minimizer,
            cost_function,
            estimator,
            pre_fit,
            post_fit,
            solver,
        })
    }

    pub fn config(&self) -> &FitPeaksConfig {
        &self.config
    }

    /// The function every peak starts from unless seeded by its neighbor
    pub fn template(&self) -> &CompositeFunction {
        &self.template
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn peak_count(&self) -> usize {
        self.config.peak_count()
    }

    fn resolver(&self) -> WindowResolver<'_> {
        WindowResolver::new(&self.config.centers, &self.config.windows)
    }

    fn background_estimator(&self) -> BackgroundEstimator<'_, S> {
        BackgroundEstimator::new(
            self.config.background_mode,
            self.template.background.kind(),
            &self.solver,
            self.minimizer,
            self.cost_function,
            self.config.max_iterations,
        )
    }

    /// Fit every expected peak of `spectrum`, the spectrum at `spectrum_index` of the
    /// source and row `row` of the fitted range.
    ///
    /// When the counts summed over all of the spectrum's windows fall short of
    /// `min_peak_total_count`, every peak is rejected without fitting anything.
    /// A `row` past the end of a per-spectrum center or window table leaves every
    /// peak [`PeakStatus::OutOfWindow`].
    pub fn fit_spectrum(&self, row: usize, spectrum_index: usize, spectrum: &Spectrum) -> SpectrumFit {
        let resolver = self.resolver();
        if !resolver.covers(row) {
            debug!("Spectrum {spectrum_index}: no center or window table row {row}");
            let outcomes = (0..self.peak_count())
                .map(|peak| PeakFitOutcome::rejected(peak, f64::NAN, PeakStatus::OutOfWindow))
                .collect();
            return SpectrumFit {
                spectrum_index,
                outcomes,
                solver_calls: 0,
            };
        }
        let windows = resolver.resolve_all(row, spectrum);
        let n_peaks = windows.len();

        let total: f64 = windows
            .iter()
            .flatten()
            .map(|w| spectrum.total_count(w.range.clone()))
            .sum();
        if total < self.config.min_peak_total_count {
            debug!(
                "Spectrum {spectrum_index} has {total} counts in its windows, below {}",
                self.config.min_peak_total_count
            );
            let outcomes = (0..n_peaks)
                .map(|peak| {
                    PeakFitOutcome::rejected(
                        peak,
                        resolver.expected_center(row, peak),
                        PeakStatus::LowTotalCount(CountScope::Spectrum),
                    )
                })
                .collect();
            return SpectrumFit {
                spectrum_index,
                outcomes,
                solver_calls: 0,
            };
        }

        let mut solver_calls = 0;
        let mut seed: Option<CompositeFunction> = None;
        let mut outcomes: Vec<Option<PeakFitOutcome>> = vec![None; n_peaks];
        for peak in self.config.fit_order.peak_order(n_peaks) {
            let outcome = match &windows[peak] {
                Ok(window) => {
                    self.fit_peak(spectrum_index, spectrum, window, seed.as_ref(), &mut solver_calls)
                }
                Err(status) => {
                    debug!("Spectrum {spectrum_index} peak {peak}: {status}");
                    PeakFitOutcome::rejected(peak, resolver.expected_center(row, peak), *status)
                }
            };
            seed = if outcome.is_good() {
                outcome.function
            } else {
                None
            };
            outcomes[peak] = Some(outcome);
        }

        SpectrumFit {
            spectrum_index,
            outcomes: outcomes.into_iter().flatten().collect(),
            solver_calls,
        }
    }

    fn fit_peak(
        &self,
        spectrum_index: usize,
        spectrum: &Spectrum,
        window: &PeakWindow,
        seed: Option<&CompositeFunction>,
        solver_calls: &mut usize,
    ) -> PeakFitOutcome {
        let peak = window.peak_index;
        let reject = |status: PeakStatus, function: Option<CompositeFunction>, errors: Vec<f64>| {
            debug!(
                "Spectrum {spectrum_index} peak {peak} expected at {}: {status}",
                window.expected_center
            );
            PeakFitOutcome {
                peak_index: peak,
                status,
                expected_center: window.expected_center,
                window: Some(window.range.clone()),
                function,
                errors,
                cost: f64::INFINITY,
            }
        };

        let mut function = seed.copied().unwrap_or(self.template);
        if let Err(status) = self
            .pre_fit
            .check_data(spectrum, window, function.parameter_count())
        {
            return reject(status, None, Vec::new());
        }
        let search = match search_range(spectrum, window) {
            Ok(search) => search,
            Err(status) => return reject(status, None, Vec::new()),
        };

        let background = self
            .background_estimator()
            .estimate(spectrum_index, spectrum, window, &search);
        *solver_calls += background.solver_calls;

        let estimate = match self
            .estimator
            .estimate(spectrum, window, search, &background.function)
        {
            Ok(estimate) => estimate,
            Err(status) => return reject(status, None, Vec::new()),
        };
        if let Err(status) = self.pre_fit.check_estimate(spectrum, &estimate) {
            return reject(status, None, Vec::new());
        }

        // a seeded peak keeps its neighbour's width and shape parameters
        function.peak.set_centre(estimate.center);
        if seed.is_none() {
            if let Some(fwhm) = estimate.fwhm {
                function.peak.set_fwhm(fwhm);
            }
        }
        function.peak.set_height(estimate.height);

        let window_data = spectrum.slice(window.range.clone());
        let data = if background.subtracted {
            function.background = background.function.zeroed();
            subtract(&window_data, &background.function)
        } else {
            function.background = background.function;
            window_data
        };

        let report = self.solver.fit(
            FitRequest {
                spectrum_index,
                data,
                window: window.bounds(),
                minimizer: self.minimizer,
                cost_function: self.cost_function,
                max_iterations: self.config.max_iterations,
            },
            &mut function,
        );
        *solver_calls += 1;

        if background.subtracted {
            function.background = background.function.add(&function.background);
        }
        if !report.is_success() {
            debug!(
                "Spectrum {spectrum_index} peak {peak}: solver reported {} after {} iterations",
                report.status, report.iterations
            );
            return reject(PeakStatus::FitFailed, Some(function), report.errors);
        }
        if let Err(status) = self.post_fit.check(window, &function) {
            return reject(status, Some(function), report.errors);
        }

        trace!(
            "Spectrum {spectrum_index} peak {peak}: {function} with cost {}",
            report.chi2
        );
        PeakFitOutcome {
            peak_index: peak,
            status: PeakStatus::Good,
            expected_center: window.expected_center,
            window: Some(window.range.clone()),
            function: Some(function),
            errors: report.errors,
            cost: report.chi2,
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use rstest::rstest;

    use super::*;
    use crate::config::{BackgroundMode, FitOrder, FitWindows, PeakCenters, WidthEstimate};
    use crate::functions::{BackToBackExponential, Lorentzian, PeakShape};
    use crate::solver::FitReport;
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

    /// Counts the fits requested of the wrapped solver
    #[derive(Debug, Default)]
    pub(crate) struct CountingSolver {
        pub inner: LevenbergMarquardt,
        pub calls: AtomicUsize,
    }

    impl CountingSolver {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LeastSquaresSolver for CountingSolver {
        fn fit(&self, request: FitRequest<'_>, function: &mut dyn ParametricFunction) -> FitReport {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fit(request, function)
        }
    }

    fn single_peak() -> Spectrum<'static> {
        SyntheticSpectrum::default()
            .background([1.0, 0.0, 0.0])
            .peak(5.0, 2.0, 0.15)
            .generate()
    }

    #[test_log::test]
    fn test_single_peak_on_flat_background() {
        let spectrum = single_peak();
        let config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![5.0]),
            FitWindows::Uniform(vec![(2.5, 6.5)]),
        )
        .peak_function("Gaussian")
        .background_function("Linear");
        let fitter = PeakFitter::new(config).unwrap();
        let fit = fitter.fit_spectrum(0, 0, &spectrum);

        assert_eq!(fit.outcomes.len(), 1);
        let outcome = &fit.outcomes[0];
        assert_eq!(outcome.status, PeakStatus::Good, "{outcome}");
        assert_is_close!(outcome.position(), 5.0, 1e-2, "center");
        let function = outcome.function.unwrap();
        assert!((function.peak.height() - 2.0).abs() / 2.0 < 0.1);
        assert_is_close!(function.parameter_by_name("A0").unwrap(), 1.0, 1e-3, "A0");
        assert!(outcome.cost.is_finite());
        assert_eq!(fit.solver_calls, 1);
    }

    #[test_log::test]
    fn test_weak_peak_rejected_strong_peak_fit() {
        let spectrum = SyntheticSpectrum::default()
            .grid(0.0, 15.0, 0.02)
            .background([1.0, 0.0, 0.0])
            .peak(5.0, 0.1, 0.1)
            .peak(10.0, 5.0, 0.1)
            .noise(0.1)
            .seed(7)
            .generate();
        let config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![5.0, 10.0]),
            FitWindows::HalfWidth(1.5),
        )
        .min_signal_to_noise(10.0);
        let fitter = PeakFitter::new(config).unwrap();
        let fit = fitter.fit_spectrum(0, 0, &spectrum);

        assert_eq!(fit.outcomes[0].status, PeakStatus::LowSignalToNoise);
        assert_eq!(fit.outcomes[0].position(), -4.0);
        assert_eq!(fit.outcomes[1].status, PeakStatus::Good);
        assert_is_close!(fit.outcomes[1].position(), 10.0, 1e-2, "center");
        assert_eq!(fit.solver_calls, 1);
    }

    #[test]
    fn test_low_count_spectrum_never_reaches_solver() {
        let spectrum = SyntheticSpectrum::default()
            .background([0.01, 0.0, 0.0])
            .generate();
        let config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![3.0, 7.0]),
            FitWindows::HalfWidth(1.0),
        )
        .min_peak_total_count(10.0);
        let fitter = PeakFitter::with_solver(config, CountingSolver::default()).unwrap();
        let fit = fitter.fit_spectrum(0, 4, &spectrum);

        assert_eq!(fit.spectrum_index, 4);
        assert_eq!(fit.positions(), vec![-1.0, -1.0]);
        assert!(fit
            .outcomes
            .iter()
            .all(|o| o.status == PeakStatus::LowTotalCount(CountScope::Spectrum)));
        assert_eq!(fit.solver_calls, 0);
        assert_eq!(fitter.solver().calls(), 0);
    }

    #[test_log::test]
    fn test_high_background_separates_curved_background() {
        let spectrum = SyntheticSpectrum::default()
            .background([550.0, -200.0, 20.0])
            .peak(5.0, 2.0, 0.15)
            .generate();
        let config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![5.0]),
            FitWindows::Uniform(vec![(2.5, 7.5)]),
        )
        .background_function("Quadratic");

        let two_stage = PeakFitter::with_solver(
            config.clone().background_mode(BackgroundMode::HighBackground),
            CountingSolver::default(),
        )
        .unwrap();
        let fit = two_stage.fit_spectrum(0, 0, &spectrum);
        let outcome = &fit.outcomes[0];
        assert_eq!(outcome.status, PeakStatus::Good, "{outcome}");
        let err_two = (outcome.position() - 5.0).abs();
        assert!(err_two < 1e-2);
        assert_eq!(fit.solver_calls, 2);
        assert_eq!(two_stage.solver().calls(), 2);
        let background = outcome.function.unwrap().background;
        assert_is_close!(background.coefficients()[2], 20.0, 0.1, "curvature");

        let single = PeakFitter::new(config.background_mode(BackgroundMode::Simple)).unwrap();
        let fit = single.fit_spectrum(0, 0, &spectrum);
        let outcome = &fit.outcomes[0];
        let err_single = (outcome.position() - 5.0).abs();
        assert!(outcome.status != PeakStatus::Good || err_single > 10.0 * err_two + 1e-3);
    }

    #[test]
    fn test_window_outside_spectrum() {
        let spectrum = single_peak();
        let config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![5.0, 20.0]),
            FitWindows::HalfWidth(1.5),
        );
        let fitter = PeakFitter::with_solver(config, CountingSolver::default()).unwrap();
        let fit = fitter.fit_spectrum(0, 0, &spectrum);
        assert_eq!(fit.outcomes[0].status, PeakStatus::Good);
        assert_eq!(fit.outcomes[1].status, PeakStatus::OutOfWindow);
        assert_eq!(fit.outcomes[1].position(), -4.0);
        assert_eq!(fitter.solver().calls(), 1);
    }

    #[rstest]
    #[case::total_count(
        FitPeaksConfig::default().min_peak_total_count(300.0),
        PeakStatus::LowTotalCount(CountScope::Peak)
    )]
    #[case::signal_to_noise(
        FitPeaksConfig::default().min_signal_to_noise(1e300),
        PeakStatus::LowSignalToNoise
    )]
    #[case::signal_to_sigma(
        FitPeaksConfig::default().min_signal_to_sigma(100.0),
        PeakStatus::LowSignalToNoise
    )]
    #[case::height(FitPeaksConfig::default().min_peak_height(3.0), PeakStatus::LowHeightPreFit)]
    fn test_pre_fit_rejection_skips_solver(#[case] config: FitPeaksConfig, #[case] expected: PeakStatus) {
        // two windows of 201 points each, so the spectrum total passes while a single peak fails
        let spectrum = SyntheticSpectrum::default()
            .background([1.0, 0.0, 0.0])
            .peak(3.0, 2.0, 0.15)
            .peak(7.0, 2.0, 0.15)
            .noise(0.01)
            .generate();
        let config = config
            .centers(PeakCenters::Uniform(vec![3.0, 7.0]))
            .windows(FitWindows::HalfWidth(2.0));
        let fitter = PeakFitter::with_solver(config, CountingSolver::default()).unwrap();
        let fit = fitter.fit_spectrum(0, 0, &spectrum);
        for outcome in fit.outcomes.iter() {
            assert_eq!(outcome.status, expected, "{outcome}");
            assert!(outcome.function.is_none());
        }
        assert_eq!(fitter.solver().calls(), 0);
    }

    /// Converges, then reports a peak a quarter as tall as the data supports
    #[derive(Debug, Default)]
    struct FlatteningSolver {
        inner: LevenbergMarquardt,
    }

    impl LeastSquaresSolver for FlatteningSolver {
        fn fit(&self, request: FitRequest<'_>, function: &mut dyn ParametricFunction) -> FitReport {
            let report = self.inner.fit(request, function);
            if let Some(height) = function.parameter_by_name("Height") {
                function.set_parameter_by_name("Height", height * 0.25).unwrap();
            }
            report
        }
    }

    #[test]
    fn test_post_fit_height() {
        let spectrum = single_peak();
        let config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![5.0]),
            FitWindows::HalfWidth(1.5),
        )
        .background_function("Flat")
        .min_peak_height(1.0);
        let fitter = PeakFitter::with_solver(config, FlatteningSolver::default()).unwrap();
        let outcome = &fitter.fit_spectrum(0, 0, &spectrum).outcomes[0];
        assert_eq!(outcome.status, PeakStatus::LowHeightPostFit);
        assert_eq!(outcome.position(), -3.0);
        assert_eq!(outcome.cost, f64::INFINITY);
        let attempted = outcome.function.unwrap();
        assert_is_close!(attempted.peak.height(), 0.5, 1e-2, "height");
    }

    #[test]
    fn test_position_tolerance() {
        let spectrum = single_peak();
        let config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![5.3]),
            FitWindows::HalfWidth(1.5),
        )
        .peak_position_tolerance(0.1);
        let fitter = PeakFitter::new(config).unwrap();
        let outcome = &fitter.fit_spectrum(0, 0, &spectrum).outcomes[0];
        assert_eq!(outcome.status, PeakStatus::FitFailed);
        assert_eq!(outcome.position(), -4.0);
        assert!(outcome.function.is_some());
    }

    #[rstest]
    #[case::left_to_right(FitOrder::LeftToRight)]
    #[case::right_to_left(FitOrder::RightToLeft)]
    fn test_fit_order(#[case] order: FitOrder) {
        let spectrum = SyntheticSpectrum::default()
            .background([2.0, 0.0, 0.0])
            .peak(2.0, 4.0, 0.1)
            .peak(5.0, 3.0, 0.1)
            .peak(8.0, 5.0, 0.1)
            .generate();
        let config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![2.0, 5.0, 8.0]),
            FitWindows::HalfWidth(1.0),
        )
        .fit_order(order)
        .width_estimate(WidthEstimate::ResolutionFraction(0.05))
        .background_function("Flat");
        let fitter = PeakFitter::new(config).unwrap();
        let fit = fitter.fit_spectrum(0, 0, &spectrum);
        for (outcome, expected) in fit.outcomes.iter().zip([2.0, 5.0, 8.0]) {
            assert_eq!(outcome.status, PeakStatus::Good, "{outcome}");
            assert_is_close!(outcome.position(), expected, 1e-3, "center");
            assert_is_close!(outcome.function.unwrap().peak.fwhm(), 0.2355, 1e-3, "fwhm");
        }
    }

    /// Keeps the parameters each fit started from
    #[derive(Debug, Default)]
    struct RecordingSolver {
        inner: LevenbergMarquardt,
        starts: Mutex<Vec<Vec<f64>>>,
    }

    impl RecordingSolver {
        fn starts(&self) -> Vec<Vec<f64>> {
            self.starts.lock().unwrap().clone()
        }
    }

    impl LeastSquaresSolver for RecordingSolver {
        fn fit(&self, request: FitRequest<'_>, function: &mut dyn ParametricFunction) -> FitReport {
            self.starts.lock().unwrap().push(function.parameters());
            self.inner.fit(request, function)
        }
    }

    #[test]
    fn test_seed_carries_width() {
        let spectrum = single_peak();
        let config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![5.0]),
            FitWindows::Uniform(vec![(2.5, 6.5)]),
        );
        let fitter = PeakFitter::with_solver(config, RecordingSolver::default()).unwrap();
        let window = fitter.resolver().resolve(0, 0, &spectrum).unwrap();

        let mut seed = *fitter.template();
        seed.set_parameters(&[9.0, 4.9, 0.4, 7.0, 0.3]);
        let mut calls = 0;
        fitter.fit_peak(0, &spectrum, &window, None, &mut calls);
        fitter.fit_peak(0, &spectrum, &window, Some(&seed), &mut calls);
        assert_eq!(calls, 2);

        let starts = fitter.solver().starts();
        assert_ne!(starts[0], starts[1]);
        // without a seed the width is observed from the data
        assert_is_close!(starts[0][2], 0.15, 0.02, "observed sigma");
        // with one the neighbour's width is kept, center and height are re-estimated
        assert_eq!(starts[1][2], 0.4);
        assert_eq!(starts[1][1], starts[0][1]);
        assert_eq!(starts[1][0], starts[0][0]);
    }

    #[test_log::test]
    fn test_good_peak_seeds_next_peak() {
        let spectrum = SyntheticSpectrum::default()
            .background([1.0, 0.0, 0.0])
            .peak(3.0, 4.0, 0.12)
            .peak(7.0, 2.0, 0.15)
            .generate();
        let config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![3.0, 7.0]),
            FitWindows::HalfWidth(1.0),
        );
        let fitter = PeakFitter::with_solver(config, RecordingSolver::default()).unwrap();
        let fit = fitter.fit_spectrum(0, 0, &spectrum);
        assert!(fit.outcomes.iter().all(|o| o.is_good()));

        let starts = fitter.solver().starts();
        assert_eq!(starts.len(), 2);
        let first = fit.outcomes[0].function.unwrap();
        assert_eq!(starts[1][2], first.parameter_by_name("Sigma").unwrap());
        assert_is_close!(fit.outcomes[1].function.unwrap().parameter(2), 0.15, 1e-3, "sigma");
    }

    #[test]
    fn test_row_past_per_spectrum_table() {
        let spectrum = single_peak();
        let config = FitPeaksConfig::new(
            PeakCenters::PerSpectrum(vec![vec![5.0], vec![5.0]]),
            FitWindows::HalfWidth(1.5),
        );
        let fitter = PeakFitter::with_solver(config, CountingSolver::default()).unwrap();
        let covered = fitter.fit_spectrum(1, 1, &spectrum);
        assert_ne!(covered.outcomes[0].status, PeakStatus::OutOfWindow);
        let calls = fitter.solver().calls();

        let fit = fitter.fit_spectrum(2, 2, &spectrum);
        assert_eq!(fit.spectrum_index, 2);
        assert_eq!(fit.outcomes.len(), 1);
        assert_eq!(fit.outcomes[0].status, PeakStatus::OutOfWindow);
        assert_eq!(fit.outcomes[0].position(), -4.0);
        assert_eq!(fit.solver_calls, 0);
        assert_eq!(fitter.solver().calls(), calls);
    }

    #[rstest]
    #[case::lorentzian(Lorentzian::new(0.6, 5.0, 0.3).into(), &[])]
    #[case::back_to_back(
        BackToBackExponential::new(1.5, 20.0, 10.0, 5.0, 0.1).into(),
        &[("A", 20.0), ("B", 10.0)]
    )]
    fn test_other_shapes(#[case] truth: PeakShape, #[case] initial: &[(&str, f64)]) {
        let truth = CompositeFunction::new(truth, BackgroundKind::Linear.from_coefficients([1.0, 0.0, 0.0]));
        let x = crate::arrayops::gridspace::<f64>(0.0, 10.0, 0.02);
        let y = truth.predict(&x);
        let spectrum = Spectrum::with_poisson_errors(x.into(), y.into());

        let mut config = FitPeaksConfig::new(
            PeakCenters::Uniform(vec![5.0]),
            FitWindows::HalfWidth(1.5),
        )
        .peak_function(truth.peak.kind().to_string())
        .initial_parameter("A0", 1.0)
        .max_iterations(200);
        for (name, value) in initial {
            config = config.initial_parameter(*name, *value);
        }
        let fitter = PeakFitter::new(config).unwrap();
        assert_eq!(fitter.template().parameter_by_name("A0"), Some(1.0));
        let outcome = &fitter.fit_spectrum(0, 0, &spectrum).outcomes[0];
        assert_eq!(outcome.status, PeakStatus::Good, "{outcome}");
        assert_is_close!(outcome.position(), 5.0, 1e-3, "center");
        assert_is_close!(outcome.function.unwrap().peak.height(), truth.peak.height(), 1e-3, "height");
    }

    #[test]
    fn test_configuration_errors() {
        let base = FitPeaksConfig::new(PeakCenters::Uniform(vec![5.0]), FitWindows::HalfWidth(1.0));
        assert_eq!(
            PeakFitter::new(base.clone().peak_function("Voigt")).err(),
            Some(FitPeaksError::UnknownPeakFunction("Voigt".into()))
        );
        assert_eq!(
            PeakFitter::new(base.clone().background_function("Cubic")).err(),
            Some(FitPeaksError::UnknownBackgroundFunction("Cubic".into()))
        );
        assert_eq!(
            PeakFitter::new(base.clone().minimizer("Simplex")).err(),
            Some(FitPeaksError::UnknownMinimizer("Simplex".into()))
        );
        assert_eq!(
            PeakFitter::new(base.clone().cost_function("Poisson")).err(),
            Some(FitPeaksError::UnknownCostFunction("Poisson".into()))
        );
        assert_eq!(
            PeakFitter::new(base.initial_parameter("Alpha", 1.0)).err(),
            Some(FitPeaksError::UnknownParameter("Alpha".into()))
        );
    }
}
