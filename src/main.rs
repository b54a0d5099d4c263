use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info};

use spectral_unmix::data::loader::{self, CsvOptions, LoadedSpectrum, SUPPORTED_EXTENSIONS};
use spectral_unmix::report::FitReport;
use spectral_unmix::{AnalysisOptions, Analyzer, Unit};

#[derive(Parser)]
#[command(name = "spectral-unmix")]
#[command(about = "Fit IR absorbance spectra as mixtures of reference spectra", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit samples against the reference library
    Analyze(AnalyzeArgs),
    /// List reference identifiers
    ListRefs {
        /// Reference directory
        #[arg(long, default_value = "data/reference")]
        refs: PathBuf,
    },
    /// Print a short summary of one or more spectrum files
    Info {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        csv: CsvArgs,
    },
}

#[derive(clap::Args)]
struct AnalyzeArgs {
    /// Sample files; when omitted every file in --samples is analyzed
    files: Vec<PathBuf>,

    /// Directory scanned when no sample files are given
    #[arg(long, default_value = "data/sample")]
    samples: PathBuf,

    /// Reference directory
    #[arg(long, default_value = "data/reference")]
    refs: PathBuf,

    /// JSON options file (missing fields take defaults)
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Restrict the fit to these references (comma-separated ids)
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,

    /// Fix a multiplier instead of fitting it, e.g. --fix CO2=0.65
    #[arg(long, value_name = "ID=VALUE", value_parser = parse_fixed)]
    fix: Vec<(String, f64)>,

    /// Skip baseline correction of the samples
    #[arg(long)]
    no_baseline: bool,

    /// Allow negative multipliers (plain least squares)
    #[arg(long)]
    allow_negative: bool,

    /// Print JSON instead of a text table
    #[arg(long)]
    json: bool,

    /// Include model, residual and constituent curves in the JSON output
    #[arg(long, requires = "json")]
    curves: bool,

    #[command(flatten)]
    csv: CsvArgs,
}

#[derive(clap::Args)]
struct CsvArgs {
    /// Header lines to skip in CSV files
    #[arg(long, default_value_t = 1)]
    header_lines: usize,

    /// CSV value column holds transmittance instead of absorbance
    #[arg(long)]
    transmittance: bool,
}

impl CsvArgs {
    fn options(&self) -> CsvOptions {
        CsvOptions {
            header_lines: self.header_lines,
            unit: if self.transmittance {
                Unit::Transmittance
            } else {
                Unit::Absorbance
            },
        }
    }
}

fn parse_fixed(s: &str) -> std::result::Result<(String, f64), String> {
    let (id, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{s}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    Ok((id.trim().to_string(), value))
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => analyze(args),
        Command::ListRefs { refs } => list_refs(&refs),
        Command::Info { files, csv } => info_files(&files, &csv.options()),
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let options = build_options(&args)?;
    let csv = args.csv.options();

    let references = load_references(&args.refs, &csv)?;
    let samples: Vec<LoadedSpectrum> = if args.files.is_empty() {
        loader::load_directory(&args.samples, SUPPORTED_EXTENSIONS, &csv)?
    } else {
        let mut all = Vec::new();
        for f in &args.files {
            all.extend(loader::load_file(f, &csv)?);
        }
        all
    };
    if samples.is_empty() {
        bail!("No samples found in {}", args.samples.display());
    }

    let analyzer = Analyzer::new(options)?;
    let buffers: Vec<_> = samples.iter().map(|s| s.buffer.clone()).collect();
    let results = analyzer.analyze_batch(&buffers, &references)?;

    let mut reports = Vec::new();
    let mut failures = 0usize;
    for (sample, result) in samples.iter().zip(results) {
        match result {
            Ok(fit) => reports.push(FitReport::new(&sample.id, &fit, args.curves)),
            Err(e) => {
                failures += 1;
                error!("{}: {e}", sample.id);
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", report.to_text());
        }
    }

    if failures > 0 {
        bail!("{failures} of {} sample(s) failed", samples.len());
    }
    Ok(())
}

fn build_options(args: &AnalyzeArgs) -> Result<AnalysisOptions> {
    let mut options = match &args.options {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading options {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing options {}", path.display()))?
        }
        None => AnalysisOptions::default(),
    };

    if !args.select.is_empty() {
        options.fit.reference_subset = Some(args.select.clone());
    }
    for (id, value) in &args.fix {
        options.fit.manual_multipliers.insert(id.clone(), *value);
    }
    if args.no_baseline {
        options.preprocess.baseline = None;
    }
    if args.allow_negative {
        options.fit.enforce_non_negative = false;
    }
    options.validate()?;
    Ok(options)
}

fn load_references(dir: &Path, csv: &CsvOptions) -> Result<spectral_unmix::ReferenceSet> {
    let spectra = loader::load_directory(dir, SUPPORTED_EXTENSIONS, csv)?;
    if spectra.is_empty() {
        bail!("No references available in {}", dir.display());
    }
    info!("loaded {} reference(s) from {}", spectra.len(), dir.display());
    loader::reference_set(spectra)
}

fn list_refs(dir: &Path) -> Result<()> {
    let references = load_references(dir, &CsvOptions::default())?;
    for id in references.ids() {
        println!("{id}");
    }
    Ok(())
}

fn info_files(files: &[PathBuf], csv: &CsvOptions) -> Result<()> {
    for path in files {
        for sp in loader::load_file(path, csv)? {
            let (lo, hi) = sp.buffer.wavenumber_range();
            let (vmin, vmax) = sp.buffer.value_range();
            println!(
                "{}: {} points, {lo:.2}..{hi:.2} cm-1 ({:?}), {} in [{vmin:.4}, {vmax:.4}]",
                sp.id,
                sp.buffer.len(),
                sp.buffer.direction(),
                sp.buffer.unit(),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_args(argv: &[&str]) -> AnalyzeArgs {
        let cli = Cli::try_parse_from(["spectral-unmix", "analyze"].iter().chain(argv)).unwrap();
        match cli.command {
            Command::Analyze(args) => args,
            _ => panic!("expected the analyze subcommand"),
        }
    }

    #[test]
    fn defaults_enforce_non_negativity_and_baseline() {
        let options = build_options(&analyze_args(&[])).unwrap();
        assert_eq!(options, AnalysisOptions::default());
    }

    #[test]
    fn flags_override_options() {
        let args = analyze_args(&[
            "--allow-negative",
            "--no-baseline",
            "--select",
            "CO2,H2O",
            "--fix",
            "CO2=0.65",
        ]);
        let options = build_options(&args).unwrap();
        assert!(!options.fit.enforce_non_negative);
        assert_eq!(options.preprocess.baseline, None);
        assert_eq!(
            options.fit.reference_subset,
            Some(vec!["CO2".to_string(), "H2O".to_string()])
        );
        assert_eq!(options.fit.manual_multipliers.get("CO2"), Some(&0.65));
    }

    #[test]
    fn malformed_fix_is_rejected() {
        assert!(parse_fixed("CO2").is_err());
        assert!(parse_fixed("CO2=abc").is_err());
        assert_eq!(parse_fixed(" CO = 0.5 ").unwrap(), ("CO".to_string(), 0.5));
    }
}
