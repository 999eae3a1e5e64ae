use std::io;
use std::time::Instant;

use fitpeaks::synthetic::SyntheticSpectrum;
use fitpeaks::{BackgroundMode, FitPeaksConfig, FitWindows, PeakCenters, PeakFitter};

fn main() -> io::Result<()> {
    let spectra = SyntheticSpectrum::default()
        .background([20.0, -1.5, 0.1])
        .peak(3.0, 40.0, 0.12)
        .peak(7.0, 25.0, 0.15)
        .noise(1.0)
        .generate_many(64, 0.005);

    let config = FitPeaksConfig::new(
        PeakCenters::Uniform(vec![3.0, 7.0]),
        FitWindows::HalfWidth(1.0),
    )
    .background_mode(BackgroundMode::HighBackground)
    .min_signal_to_noise(5.0)
    .raw_parameters(false);

    let fitter = match PeakFitter::new(config) {
        Ok(fitter) => fitter,
        Err(err) => {
            println!("Invalid configuration: {}", err);
            return Ok(());
        }
    };

    let start = Instant::now();
    let output = match fitter.fit(&spectra) {
        Ok(output) => output,
        Err(err) => {
            println!("Encountered error {:?}", err);
            return Ok(());
        }
    };
    println!(
        "Fitting took milliseconds {}",
        (Instant::now() - start).as_millis()
    );
    println!("{}", output.summary);

    println!("spectrum\tpeak 0\tpeak 1");
    for (index, row) in output
        .positions
        .spectrum_indices
        .iter()
        .zip(output.positions.rows())
        .take(8)
    {
        println!("{}\t{:.4}\t{:.4}", index, row[0], row[1]);
    }

    println!("{}", output.parameters.column_names.join("\t"));
    for row in 0..output.parameters.len().min(4) {
        let values: Vec<String> = output
            .parameters
            .row(row)
            .iter()
            .map(|v| format!("{:.4}", v))
            .collect();
        println!("{}\tchi2={:.3}", values.join("\t"), output.parameters.chi2[row]);
    }
    Ok(())
}
