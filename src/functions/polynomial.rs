use std::fmt::Display;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::FitPeaksError;

use super::ParametricFunction;

/// The polynomial backgrounds a peak can sit on, `A0 + A1 x + A2 x^2`
/// truncated to the variant's order.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BackgroundShape {
    Flat { a0: f64 },
    Linear { a0: f64, a1: f64 },
    Quadratic { a0: f64, a1: f64, a2: f64 },
}

impl Default for BackgroundShape {
    fn default() -> Self {
        Self::Linear { a0: 0.0, a1: 0.0 }
    }
}

impl BackgroundShape {
    pub fn kind(&self) -> BackgroundKind {
        match self {
            Self::Flat { .. } => BackgroundKind::Flat,
            Self::Linear { .. } => BackgroundKind::Linear,
            Self::Quadratic { .. } => BackgroundKind::Quadratic,
        }
    }

    /// All three coefficients, zero-padded past the variant's order
    pub fn coefficients(&self) -> [f64; 3] {
        match *self {
            Self::Flat { a0 } => [a0, 0.0, 0.0],
            Self::Linear { a0, a1 } => [a0, a1, 0.0],
            Self::Quadratic { a0, a1, a2 } => [a0, a1, a2],
        }
    }

    /// Build a background of the same kind from `coefficients`, dropping any
    /// term the kind does not carry
    pub fn with_coefficients(&self, coefficients: [f64; 3]) -> Self {
        self.kind().from_coefficients(coefficients)
    }

    /// The term-wise sum of two backgrounds, in the shape of `self`
    pub fn add(&self, other: &Self) -> Self {
        let a = self.coefficients();
        let b = other.coefficients();
        self.with_coefficients([a[0] + b[0], a[1] + b[1], a[2] + b[2]])
    }

    /// The same kind of background with every coefficient set to zero
    pub fn zeroed(&self) -> Self {
        self.kind().create()
    }

    pub fn density(&self, x: f64) -> f64 {
        match *self {
            Self::Flat { a0 } => a0,
            Self::Linear { a0, a1 } => a0 + a1 * x,
            Self::Quadratic { a0, a1, a2 } => a0 + x * (a1 + x * a2),
        }
    }
}

impl ParametricFunction for BackgroundShape {
    fn parameter_names(&self) -> Vec<&'static str> {
        self.kind().parameter_names().to_vec()
    }

    fn parameter_count(&self) -> usize {
        self.kind().parameter_names().len()
    }

    fn parameter(&self, index: usize) -> f64 {
        if index >= self.parameter_count() {
            panic!("{} background has no parameter {index}", self.kind());
        }
        self.coefficients()[index]
    }

    fn set_parameter(&mut self, index: usize, value: f64) {
        if index >= self.parameter_count() {
            panic!("{} background has no parameter {index}", self.kind());
        }
        let mut coefficients = self.coefficients();
        coefficients[index] = value;
        *self = self.with_coefficients(coefficients);
    }

    fn evaluate(&self, x: f64) -> f64 {
        self.density(x)
    }
}

/// The name of a background shape, resolved once when a fitter is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BackgroundKind {
    Flat,
    #[default]
    Linear,
    Quadratic,
}

impl BackgroundKind {
    pub const fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            Self::Flat => &["A0"],
            Self::Linear => &["A0", "A1"],
            Self::Quadratic => &["A0", "A1", "A2"],
        }
    }

    /// A background of this kind with all coefficients zero
    pub fn create(&self) -> BackgroundShape {
        self.from_coefficients([0.0; 3])
    }

    pub fn from_coefficients(&self, coefficients: [f64; 3]) -> BackgroundShape {
        let [a0, a1, a2] = coefficients;
        match self {
            Self::Flat => BackgroundShape::Flat { a0 },
            Self::Linear => BackgroundShape::Linear { a0, a1 },
            Self::Quadratic => BackgroundShape::Quadratic { a0, a1, a2 },
        }
    }
}

impl Display for BackgroundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Flat => "Flat",
            Self::Linear => "Linear",
            Self::Quadratic => "Quadratic",
        };
        f.write_str(name)
    }
}

impl FromStr for BackgroundKind {
    type Err = FitPeaksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Flat" | "FlatBackground" => Ok(Self::Flat),
            "Linear" | "LinearBackground" => Ok(Self::Linear),
            "Quadratic" => Ok(Self::Quadratic),
            _ => Err(FitPeaksError::UnknownBackgroundFunction(s.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("Flat".parse::<BackgroundKind>(), Ok(BackgroundKind::Flat));
        assert_eq!(
            "LinearBackground".parse::<BackgroundKind>(),
            Ok(BackgroundKind::Linear)
        );
        assert_eq!(
            "Cubic".parse::<BackgroundKind>(),
            Err(FitPeaksError::UnknownBackgroundFunction("Cubic".into()))
        );
        assert_eq!(BackgroundKind::Quadratic.to_string(), "Quadratic");
    }

    #[test]
    fn test_add_and_evaluate() {
        let mut linear = BackgroundKind::Linear.create();
        linear.set_parameter_by_name("A0", 1.0).unwrap();
        linear.set_parameter_by_name("A1", 2.0).unwrap();
        assert!(linear.set_parameter_by_name("A2", 1.0).is_err());
        assert_eq!(linear.evaluate(3.0), 7.0);

        let quadratic = BackgroundShape::Quadratic {
            a0: 0.5,
            a1: 0.0,
            a2: 1.0,
        };
        let summed = quadratic.add(&linear);
        assert_eq!(summed.coefficients(), [1.5, 2.0, 1.0]);
        assert_eq!(summed.evaluate(2.0), 1.5 + 4.0 + 4.0);

        // a higher order term is truncated when summing into a lower order shape
        assert_eq!(linear.add(&quadratic).coefficients(), [1.5, 2.0, 0.0]);
        assert_eq!(linear.zeroed(), BackgroundKind::Linear.create());
    }
}
