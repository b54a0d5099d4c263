//! Write synthetic reference spectra and a noisy mixture sample with a known
//! composition, for trying out `spectral-unmix analyze` without real data.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use spectral_unmix::{AnalysisOptions, BaselineStrategy};

#[derive(Parser)]
#[command(name = "generate-sample")]
#[command(about = "Generate synthetic IR reference spectra and a mixture sample")]
struct Args {
    /// Output root; writes <out>/reference/*.csv, <out>/sample/synthetic_sample.csv
    /// and <out>/options.json
    #[arg(long, default_value = "data")]
    out: PathBuf,

    /// Standard deviation of the Gaussian noise added to the sample
    #[arg(long, default_value_t = 0.001)]
    noise: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// (species, bands as (centre cm-1, sigma cm-1, peak absorbance))
const SPECIES: &[(&str, &[(f64, f64, f64)])] = &[
    ("CO2", &[(2349.0, 12.0, 1.0), (667.0, 8.0, 0.6)]),
    ("H2O", &[(1595.0, 30.0, 0.5), (3756.0, 35.0, 0.4)]),
    ("CO", &[(2143.0, 15.0, 0.8)]),
    ("CH4", &[(3019.0, 20.0, 0.7), (1306.0, 15.0, 0.5)]),
    ("C2H6", &[(2954.0, 18.0, 0.6), (2985.0, 12.0, 0.5)]),
    ("N2O", &[(2224.0, 14.0, 0.9), (1285.0, 10.0, 0.4)]),
    ("O3", &[(1042.0, 12.0, 0.7)]),
];

const COMPOSITION: &[(&str, f64)] = &[
    ("CO2", 0.65),
    ("H2O", 0.18),
    ("CO", 0.07),
    ("CH4", 0.04),
    ("C2H6", 0.02),
    ("N2O", 0.02),
    ("O3", 0.02),
];

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn spectrum(wavenumbers: &[f64], bands: &[(f64, f64, f64)]) -> Vec<f64> {
    wavenumbers
        .iter()
        .map(|&wn| bands.iter().map(|&(mu, sigma, amp)| gaussian(wn, mu, sigma, amp)).sum())
        .collect()
}

fn write_csv(path: &Path, wavenumbers: &[f64], values: &[f64]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["wavenumber", "absorbance"])?;
    for (x, y) in wavenumbers.iter().zip(values) {
        writer.write_record([x.to_string(), y.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let ref_dir = args.out.join("reference");
    let sample_dir = args.out.join("sample");
    std::fs::create_dir_all(&ref_dir).with_context(|| format!("creating {}", ref_dir.display()))?;
    std::fs::create_dir_all(&sample_dir)
        .with_context(|| format!("creating {}", sample_dir.display()))?;

    // References: 500 → 4000 cm-1 ascending, step 1.
    let ref_grid: Vec<f64> = (0..=3500).map(|i| 500.0 + i as f64).collect();
    for (name, bands) in SPECIES {
        let path = ref_dir.join(format!("{name}.csv"));
        write_csv(&path, &ref_grid, &spectrum(&ref_grid, bands))?;
        log::info!("wrote {}", path.display());
    }

    // Sample: 4000 → 600 cm-1 descending, step 2, with noise.
    let sample_grid: Vec<f64> = (0..=1700).map(|i| 4000.0 - 2.0 * i as f64).collect();
    let mut mix = vec![0.0; sample_grid.len()];
    for (name, coeff) in COMPOSITION {
        let bands = SPECIES
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| *b)
            .with_context(|| format!("no bands defined for {name}"))?;
        for (m, v) in mix.iter_mut().zip(spectrum(&sample_grid, bands)) {
            *m += coeff * v;
        }
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    let noise = Normal::new(0.0, args.noise).context("invalid noise level")?;
    for m in &mut mix {
        *m += noise.sample(&mut rng);
    }

    let path = sample_dir.join("synthetic_sample.csv");
    write_csv(&path, &sample_grid, &mix)?;

    // Band-free windows; the default edge windows would cut into CO2 and H2O.
    let mut options = AnalysisOptions::default();
    options.preprocess.baseline = Some(BaselineStrategy::Windows(vec![
        (1850.0, 1950.0),
        (2600.0, 2700.0),
        (3300.0, 3400.0),
    ]));
    let options_path = args.out.join("options.json");
    std::fs::write(&options_path, serde_json::to_string_pretty(&options)?)
        .with_context(|| format!("writing {}", options_path.display()))?;

    println!(
        "Wrote {} references ({} points) and {} ({} points)",
        SPECIES.len(),
        ref_grid.len(),
        path.display(),
        sample_grid.len()
    );
    println!("Analyze with: spectral-unmix analyze --options {}", options_path.display());
    Ok(())
}
