use criterion::Criterion;

use fitpeaks::synthetic::SyntheticSpectrum;
use fitpeaks::{BackgroundMode, FitPeaksConfig, FitWindows, PeakCenters, PeakFitter};

fn config() -> FitPeaksConfig {
    FitPeaksConfig::new(
        PeakCenters::Uniform(vec![3.0, 7.0]),
        FitWindows::HalfWidth(1.0),
    )
}

fn spectra() -> Vec<fitpeaks::Spectrum<'static>> {
    SyntheticSpectrum::default()
        .background([20.0, -1.5, 0.1])
        .peak(3.0, 40.0, 0.12)
        .peak(7.0, 25.0, 0.15)
        .noise(1.0)
        .generate_many(32, 0.005)
}

fn single_spectrum(c: &mut Criterion) {
    let spectra = spectra();
    let simple = PeakFitter::new(config()).unwrap();
    let two_stage = PeakFitter::new(config().background_mode(BackgroundMode::HighBackground)).unwrap();
    c.bench_function("fit_spectrum_simple", |b| {
        b.iter(|| simple.fit_spectrum(0, 0, &spectra[0]))
    });
    c.bench_function("fit_spectrum_high_background", |b| {
        b.iter(|| two_stage.fit_spectrum(0, 0, &spectra[0]))
    });
}

fn many_spectra(c: &mut Criterion) {
    let _ = pretty_env_logger::try_init();
    let spectra = spectra();
    let serial = PeakFitter::new(config().worker_threads(1)).unwrap();
    let pooled = PeakFitter::new(config()).unwrap();
    c.bench_function("fit_serial", |b| b.iter(|| serial.fit(&spectra).unwrap()));
    c.bench_function("fit_pooled", |b| b.iter(|| pooled.fit(&spectra).unwrap()));
}

fn fitting(c: &mut Criterion) {
    single_spectrum(c);
    many_spectra(c);
}

criterion::criterion_group!(benches, fitting);
criterion::criterion_main!(benches);
