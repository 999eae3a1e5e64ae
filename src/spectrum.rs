//! Read-only 1-D spectra and the sources that hand them out.
use std::borrow::Cow;
use std::iter::FusedIterator;
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::FitPeaksError;
use crate::search::{find_between, is_strictly_increasing};

/// An iterator over the `(x, y, e)` triples of a [`Spectrum`]
pub struct SpectrumIter<'a> {
    x: std::slice::Iter<'a, f64>,
    y: std::slice::Iter<'a, f64>,
    e: std::slice::Iter<'a, f64>,
}

impl<'a> Iterator for SpectrumIter<'a> {
    type Item = (f64, f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        Some((*self.x.next()?, *self.y.next()?, *self.e.next()?))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.x.size_hint()
    }
}

impl<'a> FusedIterator for SpectrumIter<'a> {}

impl<'a> ExactSizeIterator for SpectrumIter<'a> {
    fn len(&self) -> usize {
        self.x.len()
    }
}

/// One spectrum: counts `y` with uncertainties `e` over a strictly
/// increasing axis `x`.
///
/// The arrays are usually borrowed from whatever owns the data, but
/// derived signals (e.g. background subtracted counts) can own theirs.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spectrum<'a> {
    pub x: Cow<'a, [f64]>,
    pub y: Cow<'a, [f64]>,
    pub e: Cow<'a, [f64]>,
}

impl<'a> Spectrum<'a> {
    pub fn new(x: Cow<'a, [f64]>, y: Cow<'a, [f64]>, e: Cow<'a, [f64]>) -> Self {
        Self { x, y, e }
    }

    /// Create a spectrum with Poisson uncertainties, `e = sqrt(max(y, 0))`
    pub fn with_poisson_errors(x: Cow<'a, [f64]>, y: Cow<'a, [f64]>) -> Self {
        let e = y.iter().map(|y| y.max(0.0).sqrt()).collect::<Vec<_>>();
        Self::new(x, y, Cow::Owned(e))
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn iter(&self) -> SpectrumIter<'_> {
        SpectrumIter {
            x: self.x.iter(),
            y: self.y.iter(),
            e: self.e.iter(),
        }
    }

    /// Create a new spectrum borrowing from this one
    pub fn borrow(&self) -> Spectrum<'_> {
        Spectrum::new(
            Cow::Borrowed(&self.x),
            Cow::Borrowed(&self.y),
            Cow::Borrowed(&self.e),
        )
    }

    /// Borrow the points in the index range `iv`
    pub fn slice(&self, iv: Range<usize>) -> Spectrum<'_> {
        Spectrum::new(
            Cow::Borrowed(&self.x[iv.clone()]),
            Cow::Borrowed(&self.y[iv.clone()]),
            Cow::Borrowed(&self.e[iv]),
        )
    }

    /// The first and last x values, `None` for an empty spectrum
    pub fn domain(&self) -> Option<(f64, f64)> {
        Some((*self.x.first()?, *self.x.last()?))
    }

    /// The index range of the points with `lo <= x <= hi`
    pub fn index_range(&self, lo: f64, hi: f64) -> Range<usize> {
        find_between(&self.x, lo, hi)
    }

    /// Sum the counts in the index range `iv`
    pub fn total_count(&self, iv: Range<usize>) -> f64 {
        self.y[iv].iter().sum()
    }

    /// Check that the arrays agree in length and `x` is strictly increasing
    pub fn validate(&self, index: usize) -> Result<(), FitPeaksError> {
        if self.x.len() != self.y.len() || self.x.len() != self.e.len() {
            return Err(FitPeaksError::ArrayLengthMismatch { index });
        }
        if !is_strictly_increasing(&self.x) {
            return Err(FitPeaksError::XNotSorted { index });
        }
        Ok(())
    }
}

impl From<(Vec<f64>, Vec<f64>, Vec<f64>)> for Spectrum<'static> {
    fn from((x, y, e): (Vec<f64>, Vec<f64>, Vec<f64>)) -> Self {
        Self::new(Cow::Owned(x), Cow::Owned(y), Cow::Owned(e))
    }
}

impl<'a> From<(&'a [f64], &'a [f64], &'a [f64])> for Spectrum<'a> {
    fn from((x, y, e): (&'a [f64], &'a [f64], &'a [f64])) -> Self {
        Self::new(Cow::Borrowed(x), Cow::Borrowed(y), Cow::Borrowed(e))
    }
}

/// Read-only access to a collection of spectra shared between workers
pub trait SpectrumSource: Sync {
    /// The number of spectra available
    fn spectrum_count(&self) -> usize;

    /// Borrow the spectrum at `index`, `None` when out of range
    fn spectrum(&self, index: usize) -> Option<Spectrum<'_>>;
}

impl<'a> SpectrumSource for [Spectrum<'a>] {
    fn spectrum_count(&self) -> usize {
        self.len()
    }

    fn spectrum(&self, index: usize) -> Option<Spectrum<'_>> {
        self.get(index).map(|s| s.borrow())
    }
}

impl<'a> SpectrumSource for Vec<Spectrum<'a>> {
    fn spectrum_count(&self) -> usize {
        self.len()
    }

    fn spectrum(&self, index: usize) -> Option<Spectrum<'_>> {
        self.get(index).map(|s| s.borrow())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ramp() -> Spectrum<'static> {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|x| x * 2.0).collect();
        Spectrum::with_poisson_errors(Cow::Owned(x), Cow::Owned(y))
    }

    #[test]
    fn test_index_range_and_counts() {
        let spectrum = ramp();
        let iv = spectrum.index_range(2.5, 5.0);
        assert_eq!(iv, 3..6);
        assert_eq!(spectrum.total_count(iv.clone()), 6.0 + 8.0 + 10.0);
        let part = spectrum.slice(iv);
        assert_eq!(part.domain(), Some((3.0, 5.0)));
        assert_eq!(part.iter().count(), 3);
    }

    #[test]
    fn test_validate() {
        let spectrum = ramp();
        assert!(spectrum.validate(0).is_ok());

        let bad = Spectrum::from((vec![0.0, 2.0, 1.0], vec![1.0; 3], vec![1.0; 3]));
        assert_eq!(bad.validate(4), Err(FitPeaksError::XNotSorted { index: 4 }));

        let short = Spectrum::from((vec![0.0, 1.0], vec![1.0; 3], vec![1.0; 3]));
        assert_eq!(
            short.validate(1),
            Err(FitPeaksError::ArrayLengthMismatch { index: 1 })
        );
    }

    #[test]
    fn test_source() {
        let spectra = vec![ramp(), ramp()];
        assert_eq!(spectra.spectrum_count(), 2);
        assert!(spectra.spectrum(1).is_some());
        assert!(spectra.spectrum(2).is_none());
    }
}
