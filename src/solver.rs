//! The least squares fitting step.
//!
//! The pipeline hands a [`LeastSquaresSolver`] a function with its starting
//! parameters and the data of one fit window. The solver moves the parameters
//! in place and reports how it went with a [`FitReport`]. It never decides
//! whether a fit is *acceptable*, that is left to the
//! [`PostFitValidator`](crate::validate::PostFitValidator).
//!
//! [`LevenbergMarquardt`] is the bundled implementation. It solves the weighted
//! normal equations with [`nalgebra`] using a numerical Jacobian, so any
//! [`ParametricFunction`] can be fit without supplying derivatives.
use std::fmt::Display;
use std::str::FromStr;

use log::trace;
use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::FitPeaksError;
use crate::functions::ParametricFunction;
use crate::spectrum::Spectrum;

/// The optimization strategy used to minimize the cost function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Minimizer {
    #[default]
    LevenbergMarquardt,
    GaussNewton,
}

impl Display for Minimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LevenbergMarquardt => f.write_str("Levenberg-Marquardt"),
            Self::GaussNewton => f.write_str("Gauss-Newton"),
        }
    }
}

impl FromStr for Minimizer {
    type Err = FitPeaksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Levenberg-Marquardt" | "Levenberg-MarquardtMD" => Ok(Self::LevenbergMarquardt),
            "Gauss-Newton" => Ok(Self::GaussNewton),
            _ => Err(FitPeaksError::UnknownMinimizer(s.to_string())),
        }
    }
}

/// The goodness of fit statistic reported for a fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CostFunction {
    /// Weighted least squares, reported as the reduced chi-square
    #[default]
    LeastSquares,
    /// The weighted profile R factor
    Rwp,
}

impl Display for CostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LeastSquares => f.write_str("Least squares"),
            Self::Rwp => f.write_str("Rwp"),
        }
    }
}

impl FromStr for CostFunction {
    type Err = FitPeaksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Least squares" | "Least Squares" => Ok(Self::LeastSquares),
            "Rwp" => Ok(Self::Rwp),
            _ => Err(FitPeaksError::UnknownCostFunction(s.to_string())),
        }
    }
}

/// Everything a solver needs to know about one fit besides the function itself
#[derive(Debug, Clone)]
pub struct FitRequest<'a> {
    /// The index of the spectrum the data came from, for diagnostics
    pub spectrum_index: usize,
    pub data: Spectrum<'a>,
    /// Only points with `window.0 <= x <= window.1` take part in the fit
    pub window: (f64, f64),
    pub minimizer: Minimizer,
    pub cost_function: CostFunction,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverStatus {
    Success,
    /// The iteration limit was reached before convergence
    MaxIterations,
    /// The cost became NaN or infinite
    NonFinite,
    /// Fewer data points than free parameters
    NotEnoughData,
    Other(String),
}

impl SolverStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::MaxIterations => f.write_str("failed to converge after maximum iterations"),
            Self::NonFinite => f.write_str("non-finite cost"),
            Self::NotEnoughData => f.write_str("not enough data points"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

/// Describe a least squares fit's output
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitReport {
    pub status: SolverStatus,
    /// The goodness of fit under the requested [`CostFunction`], `+inf` when the fit failed
    pub chi2: f64,
    /// One standard error per parameter, in parameter order
    pub errors: Vec<f64>,
    /// The number of iterations run
    pub iterations: usize,
}

impl FitReport {
    pub fn failed(status: SolverStatus, parameter_count: usize, iterations: usize) -> Self {
        Self {
            status,
            chi2: f64::INFINITY,
            errors: vec![0.0; parameter_count],
            iterations,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// A least squares fitting engine. Implementations must be shareable between
/// the workers fitting different spectra.
pub trait LeastSquaresSolver: Send + Sync {
    /// Fit `function` to `request.data`, starting from and overwriting its current parameters
    fn fit(&self, request: FitRequest<'_>, function: &mut dyn ParametricFunction) -> FitReport;
}

impl<T: LeastSquaresSolver + ?Sized> LeastSquaresSolver for &T {
    fn fit(&self, request: FitRequest<'_>, function: &mut dyn ParametricFunction) -> FitReport {
        (**self).fit(request, function)
    }
}

/// The weighted observations a fit runs over
struct WeightedData {
    x: Vec<f64>,
    y: Vec<f64>,
    sqrt_w: Vec<f64>,
}

impl WeightedData {
    fn from_request(request: &FitRequest<'_>) -> Self {
        let (lo, hi) = request.window;
        let n = request.data.len();
        let mut x = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        let mut sqrt_w = Vec::with_capacity(n);
        for (xi, yi, ei) in request.data.iter() {
            if xi < lo || xi > hi {
                continue;
            }
            x.push(xi);
            y.push(yi);
            // uncertainties that are zero or negative carry unit weight
            sqrt_w.push(if ei > 0.0 { 1.0 / ei } else { 1.0 });
        }
        Self { x, y, sqrt_w }
    }

    fn len(&self) -> usize {
        self.x.len()
    }

    fn residuals(&self, function: &dyn ParametricFunction) -> DVector<f64> {
        DVector::from_iterator(
            self.len(),
            self.x
                .iter()
                .zip(self.y.iter())
                .zip(self.sqrt_w.iter())
                .map(|((x, y), w)| (y - function.evaluate(*x)) * w),
        )
    }

    /// The Jacobian of the weighted model by central differences
    fn jacobian(&self, function: &mut dyn ParametricFunction, params: &[f64]) -> DMatrix<f64> {
        let n = self.len();
        let p = params.len();
        let mut jac = DMatrix::zeros(n, p);
        for j in 0..p {
            let h = 1e-6 * params[j].abs().max(1e-2);
            function.set_parameter(j, params[j] + h);
            let upper: Vec<f64> = self.x.iter().map(|x| function.evaluate(*x)).collect();
            function.set_parameter(j, params[j] - h);
            for (i, x) in self.x.iter().enumerate() {
                jac[(i, j)] = (upper[i] - function.evaluate(*x)) / (2.0 * h) * self.sqrt_w[i];
            }
            function.set_parameter(j, params[j]);
        }
        jac
    }

    fn weighted_profile_r(&self, function: &dyn ParametricFunction) -> f64 {
        let mut num = 0.0;
        let mut denom = 0.0;
        for ((x, y), w) in self.x.iter().zip(self.y.iter()).zip(self.sqrt_w.iter()) {
            let w2 = w * w;
            num += w2 * (y - function.evaluate(*x)).powi(2);
            denom += w2 * y * y;
        }
        if denom > 0.0 {
            (num / denom).sqrt()
        } else {
            f64::INFINITY
        }
    }
}

fn solve_damped(
    hessian: &DMatrix<f64>,
    gradient: &DVector<f64>,
    lambda: f64,
) -> Option<DVector<f64>> {
    let mut damped = hessian.clone();
    for j in 0..damped.nrows() {
        let d = hessian[(j, j)].max(f64::EPSILON);
        damped[(j, j)] += lambda * d;
    }
    match damped.clone().cholesky() {
        Some(decomposition) => Some(decomposition.solve(gradient)),
        None => damped.lu().solve(gradient),
    }
}

/// A damped least squares solver over dense normal equations
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LevenbergMarquardt {
    /// Converged when an accepted step reduces the cost by less than this fraction
    pub ftol: f64,
    /// Converged when no parameter moves by more than this fraction of its value
    pub xtol: f64,
    /// The starting damping factor
    pub initial_lambda: f64,
    /// Give up on improving a step once the damping grows past this value
    pub max_lambda: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            ftol: 1e-9,
            xtol: 1e-10,
            initial_lambda: 1e-3,
            max_lambda: 1e10,
        }
    }
}

impl LevenbergMarquardt {
    pub fn ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    pub fn initial_lambda(mut self, initial_lambda: f64) -> Self {
        self.initial_lambda = initial_lambda;
        self
    }

    pub fn max_lambda(mut self, max_lambda: f64) -> Self {
        self.max_lambda = max_lambda;
        self
    }

    fn cost(data: &WeightedData, function: &dyn ParametricFunction) -> f64 {
        data.residuals(function).norm_squared()
    }

    fn small_step(&self, step: &DVector<f64>, params: &[f64]) -> bool {
        step.iter()
            .zip(params.iter())
            .all(|(d, p)| d.abs() <= self.xtol * (p.abs() + self.xtol))
    }

    /// Run the iterations, returning whether the fit converged and how many
    /// iterations were used
    fn minimize(
        &self,
        data: &WeightedData,
        function: &mut dyn ParametricFunction,
        minimizer: Minimizer,
        max_iterations: usize,
    ) -> (bool, usize, f64) {
        let mut params = function.parameters();
        let mut cost = Self::cost(data, function);
        let mut lambda = match minimizer {
            Minimizer::LevenbergMarquardt => self.initial_lambda,
            Minimizer::GaussNewton => 0.0,
        };

        for iteration in 0..max_iterations {
            if !cost.is_finite() {
                return (false, iteration, cost);
            }
            if cost < 1e-28 {
                return (true, iteration, cost);
            }
            let jac = data.jacobian(function, &params);
            let residuals = data.residuals(function);
            let hessian = jac.tr_mul(&jac);
            let gradient = jac.tr_mul(&residuals);

            let mut accepted = None;
            let mut scale = 1.0;
            loop {
                let step = solve_damped(&hessian, &gradient, lambda).map(|s| s * scale);
                if let Some(step) = step {
                    let trial: Vec<f64> = params.iter().zip(step.iter()).map(|(p, d)| p + d).collect();
                    function.set_parameters(&trial);
                    let trial_cost = Self::cost(data, function);
                    if trial_cost.is_finite() && trial_cost <= cost {
                        accepted = Some((trial, trial_cost, step));
                        break;
                    }
                }
                function.set_parameters(&params);
                match minimizer {
                    Minimizer::LevenbergMarquardt => {
                        lambda *= 10.0;
                        if lambda > self.max_lambda {
                            break;
                        }
                    }
                    Minimizer::GaussNewton => {
                        scale /= 2.0;
                        if scale < 1e-3 {
                            break;
                        }
                    }
                }
            }

            let Some((trial, trial_cost, step)) = accepted else {
                trace!("No step improves the cost {cost} at iteration {iteration}, stopping");
                return (true, iteration + 1, cost);
            };

            let reduction = (cost - trial_cost) / cost.max(f64::MIN_POSITIVE);
            let converged = reduction <= self.ftol || self.small_step(&step, &params);
            params = trial;
            cost = trial_cost;
            if matches!(minimizer, Minimizer::LevenbergMarquardt) {
                lambda = (lambda / 10.0).max(1e-12);
            }
            if converged {
                return (true, iteration + 1, cost);
            }
        }
        (false, max_iterations, cost)
    }

    /// Standard errors from the inverse of the curvature matrix, scaled by the
    /// reduced chi-square
    fn standard_errors(
        data: &WeightedData,
        function: &mut dyn ParametricFunction,
        reduced_chi2: f64,
    ) -> Vec<f64> {
        let params = function.parameters();
        let jac = data.jacobian(function, &params);
        let hessian = jac.tr_mul(&jac);
        match hessian.try_inverse() {
            Some(covariance) => (0..params.len())
                .map(|j| (covariance[(j, j)].abs() * reduced_chi2).sqrt())
                .collect(),
            None => {
                trace!("Singular curvature matrix, parameter errors are unavailable");
                vec![0.0; params.len()]
            }
        }
    }
}

impl LeastSquaresSolver for LevenbergMarquardt {
    fn fit(&self, request: FitRequest<'_>, function: &mut dyn ParametricFunction) -> FitReport {
        let data = WeightedData::from_request(&request);
        let n_params = function.parameter_count();
        if data.len() < n_params || data.len() == 0 {
            return FitReport::failed(SolverStatus::NotEnoughData, n_params, 0);
        }

        let (converged, iterations, cost) =
            self.minimize(&data, function, request.minimizer, request.max_iterations);
        if !cost.is_finite() {
            return FitReport::failed(SolverStatus::NonFinite, n_params, iterations);
        }
        if !converged {
            trace!(
                "Fit in spectrum {} stopped at cost {cost} after {iterations} iterations",
                request.spectrum_index
            );
            return FitReport::failed(SolverStatus::MaxIterations, n_params, iterations);
        }

        let dof = data.len().saturating_sub(n_params).max(1) as f64;
        let reduced_chi2 = cost / dof;
        let errors = Self::standard_errors(&data, function, reduced_chi2);
        let chi2 = match request.cost_function {
            CostFunction::LeastSquares => reduced_chi2,
            CostFunction::Rwp => data.weighted_profile_r(function),
        };
        FitReport {
            status: SolverStatus::Success,
            chi2,
            errors,
            iterations,
        }
    }
}
