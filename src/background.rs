//! Estimating the background under a peak.
//!
//! Two strategies are supported, selected by [`BackgroundMode`]:
//!
//! - [`BackgroundMode::Simple`] draws a line through the mean of the first and last
//!   few points of the window. It is only a starting value, the background is then
//!   fit together with the peak.
//! - [`BackgroundMode::HighBackground`] fits the background on its own with the peak
//!   region masked out. The fitted background is subtracted before the peak is
//!   estimated and fit, and added back onto the residual background afterwards.
use std::borrow::Cow;
use std::ops::Range;

use log::{debug, trace};

use crate::config::BackgroundMode;
use crate::functions::{BackgroundKind, BackgroundShape, ParametricFunction};
use crate::solver::{CostFunction, FitRequest, LeastSquaresSolver, Minimizer};
use crate::spectrum::Spectrum;
use crate::window::PeakWindow;

/// The fewest points needed on each side of the masked peak region to fit a background
pub const MIN_SIDE_POINTS: usize = 3;

/// The number of edge points averaged on each side, 10% of the window bounded to `[1, 10]`
fn edge_point_count(n: usize) -> usize {
    (n / 10).clamp(1, 10)
}

fn mean_point(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    (sx / n, sy / n)
}

/// Estimate a background of shape `kind` from the edges of `data`.
///
/// The two edge means define a line. A flat background takes their average, a
/// quadratic background starts with no curvature.
pub fn edge_estimate(kind: BackgroundKind, data: &Spectrum) -> BackgroundShape {
    let n = data.len();
    if n == 0 {
        return kind.create();
    }
    let k = edge_point_count(n);
    let left: Vec<(f64, f64)> = data.iter().take(k).map(|(x, y, _)| (x, y)).collect();
    let right: Vec<(f64, f64)> = data.iter().skip(n - k).map(|(x, y, _)| (x, y)).collect();
    let (xl, yl) = mean_point(&left);
    let (xr, yr) = mean_point(&right);

    let coefficients = match kind {
        BackgroundKind::Flat => [(yl + yr) / 2.0, 0.0, 0.0],
        BackgroundKind::Linear | BackgroundKind::Quadratic => {
            let slope = if xr > xl { (yr - yl) / (xr - xl) } else { 0.0 };
            [yl - slope * xl, slope, 0.0]
        }
    };
    kind.from_coefficients(coefficients)
}

/// The background estimate for one peak
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundEstimate {
    pub function: BackgroundShape,
    /// Whether the estimate was fit separately from the peak and must be removed
    /// from the data before the peak fit
    pub subtracted: bool,
    /// The number of solver calls spent on the estimate
    pub solver_calls: usize,
}

/// Produces the [`BackgroundEstimate`] of a peak window
#[derive(Debug, Clone)]
pub struct BackgroundEstimator<'s, S: LeastSquaresSolver> {
    pub mode: BackgroundMode,
    pub kind: BackgroundKind,
    solver: &'s S,
    minimizer: Minimizer,
    cost_function: CostFunction,
    max_iterations: usize,
}

impl<'s, S: LeastSquaresSolver> BackgroundEstimator<'s, S> {
    pub fn new(
        mode: BackgroundMode,
        kind: BackgroundKind,
        solver: &'s S,
        minimizer: Minimizer,
        cost_function: CostFunction,
        max_iterations: usize,
    ) -> Self {
        Self {
            mode,
            kind,
            solver,
            minimizer,
            cost_function,
            max_iterations,
        }
    }

    /// Estimate the background under the peak of `window`, where `peak_region` is the
    /// index range holding the peak itself
    pub fn estimate(
        &self,
        spectrum_index: usize,
        spectrum: &Spectrum,
        window: &PeakWindow,
        peak_region: &Range<usize>,
    ) -> BackgroundEstimate {
        let edges = edge_estimate(self.kind, &spectrum.slice(window.range.clone()));
        match self.mode {
            BackgroundMode::Simple => BackgroundEstimate {
                function: edges,
                subtracted: false,
                solver_calls: 0,
            },
            BackgroundMode::HighBackground => {
                self.fit_masked(spectrum_index, spectrum, window, peak_region, edges)
            }
        }
    }

    fn fit_masked(
        &self,
        spectrum_index: usize,
        spectrum: &Spectrum,
        window: &PeakWindow,
        peak_region: &Range<usize>,
        edges: BackgroundShape,
    ) -> BackgroundEstimate {
        let left = window.range.start..peak_region.start.clamp(window.range.start, window.range.end);
        let right = peak_region.end.clamp(window.range.start, window.range.end)..window.range.end;
        if left.len() < MIN_SIDE_POINTS || right.len() < MIN_SIDE_POINTS {
            trace!(
                "Spectrum {spectrum_index} peak {}: {} + {} background points, using the window edges",
                window.peak_index,
                left.len(),
                right.len()
            );
            return BackgroundEstimate {
                function: edges,
                subtracted: true,
                solver_calls: 0,
            };
        }

        let mut x = Vec::with_capacity(left.len() + right.len());
        let mut y = Vec::with_capacity(x.capacity());
        let mut e = Vec::with_capacity(x.capacity());
        for i in left.chain(right) {
            x.push(spectrum.x[i]);
            y.push(spectrum.y[i]);
            e.push(spectrum.e[i]);
        }
        let data = Spectrum::new(Cow::Owned(x), Cow::Owned(y), Cow::Owned(e));

        let mut function = edges;
        let report = self.solver.fit(
            FitRequest {
                spectrum_index,
                data,
                window: window.bounds(),
                minimizer: self.minimizer,
                cost_function: self.cost_function,
                max_iterations: self.max_iterations,
            },
            &mut function,
        );
        if report.is_success() {
            BackgroundEstimate {
                function,
                subtracted: true,
                solver_calls: 1,
            }
        } else {
            debug!(
                "Spectrum {spectrum_index} peak {}: background fit {}, using the window edges",
                window.peak_index, report.status
            );
            BackgroundEstimate {
                function: edges,
                subtracted: true,
                solver_calls: 1,
            }
        }
    }
}

/// Remove `background` from the points of `data`, keeping the uncertainties
pub fn subtract<'a>(data: &Spectrum<'a>, background: &BackgroundShape) -> Spectrum<'a> {
    let y: Vec<f64> = data
        .iter()
        .map(|(x, y, _)| y - background.evaluate(x))
        .collect();
    Spectrum::new(data.x.clone(), Cow::Owned(y), data.e.clone())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arrayops::gridspace;
    use crate::search::nearest;
    use crate::solver::LevenbergMarquardt;

    fn quadratic_with_peak() -> Spectrum<'static> {
        let x = gridspace::<f64>(0.0, 10.0, 0.02);
        let y: Vec<f64> = x
            .iter()
            .map(|x| 50.0 + 20.0 * (x - 5.0).powi(2) + 2.0 * (-(x - 5.0).powi(2) / (2.0 * 0.0225)).exp())
            .collect();
        Spectrum::with_poisson_errors(Cow::Owned(x), Cow::Owned(y))
    }

    fn window(spectrum: &Spectrum) -> PeakWindow {
        PeakWindow {
            peak_index: 0,
            expected_center: 5.0,
            xmin: 2.5,
            xmax: 7.5,
            range: spectrum.index_range(2.5, 7.5),
        }
    }

    #[test]
    fn test_edge_estimate() {
        let x = gridspace::<f64>(0.0, 10.0, 0.1);
        let y: Vec<f64> = x.iter().map(|x| 3.0 + 0.5 * x).collect();
        let data = Spectrum::with_poisson_errors(Cow::Owned(x), Cow::Owned(y));

        let linear = edge_estimate(BackgroundKind::Linear, &data);
        let [a0, a1, _] = linear.coefficients();
        assert!((a0 - 3.0).abs() < 1e-9);
        assert!((a1 - 0.5).abs() < 1e-9);

        let flat = edge_estimate(BackgroundKind::Flat, &data);
        assert!((flat.coefficients()[0] - (3.0 + 0.5 * 4.95)).abs() < 1e-9);

        assert_eq!(
            edge_estimate(BackgroundKind::Quadratic, &Spectrum::default()),
            BackgroundKind::Quadratic.create()
        );
    }

    #[test_log::test]
    fn test_masked_fit_recovers_curvature() {
        let spectrum = quadratic_with_peak();
        let window = window(&spectrum);
        let center = nearest(&spectrum.x, 5.0);
        let peak_region = (center - 37)..(center + 38);
        let solver = LevenbergMarquardt::default();
        let estimator = BackgroundEstimator::new(
            BackgroundMode::HighBackground,
            BackgroundKind::Quadratic,
            &solver,
            Minimizer::LevenbergMarquardt,
            CostFunction::LeastSquares,
            50,
        );
        let estimate = estimator.estimate(0, &spectrum, &window, &peak_region);
        assert!(estimate.subtracted);
        assert_eq!(estimate.solver_calls, 1);
        let [a0, a1, a2] = estimate.function.coefficients();
        // 50 + 20 (x - 5)^2 = 550 - 200 x + 20 x^2
        assert!((a0 - 550.0).abs() < 1e-2, "{a0}");
        assert!((a1 + 200.0).abs() < 1e-2, "{a1}");
        assert!((a2 - 20.0).abs() < 1e-3, "{a2}");

        let residual = subtract(&spectrum.slice(window.range.clone()), &estimate.function);
        let at_center = residual.y[center - window.range.start];
        assert!((at_center - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_masked_fit_needs_both_sides() {
        let spectrum = quadratic_with_peak();
        let window = window(&spectrum);
        let peak_region = (window.range.start + 1)..(window.range.end - 10);
        let solver = LevenbergMarquardt::default();
        let estimator = BackgroundEstimator::new(
            BackgroundMode::HighBackground,
            BackgroundKind::Quadratic,
            &solver,
            Minimizer::LevenbergMarquardt,
            CostFunction::LeastSquares,
            50,
        );
        let estimate = estimator.estimate(0, &spectrum, &window, &peak_region);
        assert_eq!(estimate.solver_calls, 0);
        assert_eq!(
            estimate.function,
            edge_estimate(BackgroundKind::Quadratic, &spectrum.slice(window.range.clone()))
        );
    }
}
