//! Small statistics used while estimating and screening peaks.

/// `2·sqrt(ln 2 / π)`, converts `area / height` of a Gaussian into its FWHM
pub const FWHM_PER_AREA_HEIGHT: f64 = 0.939_437_278_699_651_3;

/// `2·sqrt(2 ln 2)`, the ratio of a Gaussian's FWHM to its standard deviation
pub const SIGMA_TO_FWHM: f64 = 2.354_820_045_030_949_3;

/// Scale factor making the median absolute deviation a consistent estimator
/// of the standard deviation of normally distributed noise
const MAD_TO_SIGMA: f64 = 1.4826;

/// The median of the finite values in `values`, `None` when there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Estimate the noise level of a background-subtracted signal from the
/// median absolute deviation of `residuals`.
pub fn estimate_noise(residuals: &[f64]) -> f64 {
    let Some(center) = median(residuals) else {
        return 0.0;
    };
    let deviations: Vec<f64> = residuals.iter().map(|r| (r - center).abs()).collect();
    median(&deviations).unwrap_or_default() * MAD_TO_SIGMA
}

/// Ratio of a signal height to a noise level, infinite when the noise
/// vanishes and the height is positive.
pub fn signal_to_noise(height: f64, noise: f64) -> f64 {
    if noise > 0.0 && noise.is_finite() {
        height / noise
    } else if height > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Estimate a peak's full width at half max from its integrated `area`
/// and `height`, treating it as a Gaussian.
pub fn observed_fwhm(area: f64, height: f64) -> Option<f64> {
    let fwhm = FWHM_PER_AREA_HEIGHT * area / height;
    if fwhm.is_finite() && fwhm > 0.0 {
        Some(fwhm)
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn test_estimate_noise() {
        let flat = [1.0; 20];
        assert_eq!(estimate_noise(&flat), 0.0);

        let alternating: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
        assert!((estimate_noise(&alternating) - 0.1 * MAD_TO_SIGMA).abs() < 1e-12);
    }

    #[test]
    fn test_signal_to_noise_zero_noise() {
        assert_eq!(signal_to_noise(2.0, 0.0), f64::INFINITY);
        assert_eq!(signal_to_noise(-2.0, 0.0), 0.0);
        assert_eq!(signal_to_noise(2.0, 0.5), 4.0);
    }

    #[test]
    fn test_observed_fwhm_gaussian() {
        let (height, sigma) = (3.0, 0.2);
        let area = height * sigma * (2.0 * std::f64::consts::PI).sqrt();
        let fwhm = observed_fwhm(area, height).unwrap();
        assert!((fwhm - SIGMA_TO_FWHM * sigma).abs() < 1e-12);
        assert!(observed_fwhm(-1.0, 2.0).is_none());
        assert!((SIGMA_TO_FWHM - 2.0 * (2.0 * 2f64.ln()).sqrt()).abs() < 1e-12);
    }
}
