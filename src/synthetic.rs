//! Deterministic synthetic spectra: Gaussian peaks on a polynomial background
//! with reproducible pseudo-noise. Used by the demo binary, the benchmarks and tests.
use std::borrow::Cow;

use crate::arrayops::gridspace;
use crate::spectrum::Spectrum;

/// A repeatable value in `[-0.5, 0.5)` for point `i` of the spectrum generated with `seed`
pub fn pseudo_noise(i: usize, seed: u64) -> f64 {
    let t = (i as f64 + 1.0) * 12.9898 + seed as f64 * 78.233;
    (t.sin() * 43758.5453).rem_euclid(1.0) - 0.5
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticPeak {
    pub centre: f64,
    pub height: f64,
    pub sigma: f64,
}

impl SyntheticPeak {
    pub fn new(centre: f64, height: f64, sigma: f64) -> Self {
        Self {
            centre,
            height,
            sigma,
        }
    }

    pub fn density(&self, x: f64) -> f64 {
        self.height * (-0.5 * ((x - self.centre) / self.sigma).powi(2)).exp()
    }
}

/// A recipe for one spectrum
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpectrum {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    /// `A0 + A1 x + A2 x^2`
    pub background: [f64; 3],
    pub peaks: Vec<SyntheticPeak>,
    /// The full width of the uniform pseudo-noise added to every point
    pub noise: f64,
    pub seed: u64,
}

impl Default for SyntheticSpectrum {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 10.0,
            step: 0.02,
            background: [0.0; 3],
            peaks: Vec::new(),
            noise: 0.0,
            seed: 0,
        }
    }
}

impl SyntheticSpectrum {
    pub fn grid(mut self, start: f64, stop: f64, step: f64) -> Self {
        self.start = start;
        self.stop = stop;
        self.step = step;
        self
    }

    pub fn background(mut self, coefficients: [f64; 3]) -> Self {
        self.background = coefficients;
        self
    }

    pub fn peak(mut self, centre: f64, height: f64, sigma: f64) -> Self {
        self.peaks.push(SyntheticPeak::new(centre, height, sigma));
        self
    }

    pub fn noise(mut self, amplitude: f64) -> Self {
        self.noise = amplitude;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn density(&self, x: f64) -> f64 {
        let [a0, a1, a2] = self.background;
        a0 + a1 * x + a2 * x * x + self.peaks.iter().map(|p| p.density(x)).sum::<f64>()
    }

    /// Sample the recipe with Poisson uncertainties
    pub fn generate(&self) -> Spectrum<'static> {
        let x = gridspace(self.start, self.stop, self.step);
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, x)| self.density(*x) + self.noise * pseudo_noise(i, self.seed))
            .collect();
        Spectrum::with_poisson_errors(Cow::Owned(x), Cow::Owned(y))
    }

    /// Generate `count` spectra, moving every peak by `shift` more in each one and
    /// drawing fresh noise for each
    pub fn generate_many(&self, count: usize, shift: f64) -> Vec<Spectrum<'static>> {
        (0..count)
            .map(|k| {
                let mut recipe = self.clone().seed(self.seed + k as u64);
                for peak in recipe.peaks.iter_mut() {
                    peak.centre += shift * k as f64;
                }
                recipe.generate()
            })
            .collect()
    }
}
