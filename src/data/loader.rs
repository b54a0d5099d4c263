use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, warn};
use serde::Deserialize;

use super::model::{ReferenceSet, SpectrumBuffer, Unit};

// ---------------------------------------------------------------------------
// Loaded spectrum: identifier + header fields + buffer
// ---------------------------------------------------------------------------

/// A decoded spectrum file.
#[derive(Debug, Clone)]
pub struct LoadedSpectrum {
    /// JCAMP `MOLFORM` or `TITLE`, the JSON `id`, otherwise the file stem.
    pub id: String,
    /// Raw header fields (JCAMP-DX labels, upper-cased).
    pub header: BTreeMap<String, String>,
    pub buffer: SpectrumBuffer,
}

/// How CSV files are read.
#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    /// Leading lines to skip before the numeric rows.
    pub header_lines: usize,
    /// Unit of the second column.
    pub unit: Unit,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            header_lines: 1,
            unit: Unit::Absorbance,
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Extensions `load_file` understands.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "jdx", "dx", "json"];

/// Load all spectra from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`        – `wavenumber,value` rows after `header_lines` skipped lines
/// * `.jdx`, `.dx` – JCAMP-DX as distributed by the NIST Chemistry WebBook
/// * `.json`       – `{ "x": [...], "y": [...], "unit": "...", "id": "..." }`
///   or an array of such records
pub fn load_file(path: &Path, csv: &CsvOptions) -> Result<Vec<LoadedSpectrum>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum")
        .to_string();

    let loaded = match ext.as_str() {
        "csv" => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            vec![read_csv(file, &stem, csv)?]
        }
        "jdx" | "dx" => {
            let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            vec![parse_jcamp(&String::from_utf8_lossy(&bytes), &stem)?]
        }
        "json" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            parse_json(&text, &stem)?
        }
        other => bail!("Unsupported file extension: .{other}"),
    };
    debug!("{}: {} spectrum/spectra", path.display(), loaded.len());
    Ok(loaded)
}

/// Load every supported file in `dir` (non-recursive), sorted by file name.
pub fn load_directory(
    dir: &Path,
    extensions: &[&str],
    csv: &CsvOptions,
) -> Result<Vec<LoadedSpectrum>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();

    let mut spectra = Vec::new();
    for path in &paths {
        let loaded = load_file(path, csv).with_context(|| format!("loading {}", path.display()))?;
        spectra.extend(loaded);
    }
    Ok(spectra)
}

/// Build a `ReferenceSet` keyed by `LoadedSpectrum::id`.
pub fn reference_set(spectra: Vec<LoadedSpectrum>) -> Result<ReferenceSet> {
    let mut set = ReferenceSet::new();
    for sp in spectra {
        set.insert(sp.id, sp.buffer)?;
    }
    Ok(set)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Read `wavenumber,value` rows. Extra columns are ignored, blank lines
/// skipped.
pub fn read_csv<R: Read>(reader: R, name: &str, opts: &CsvOptions) -> Result<LoadedSpectrum> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut x = Vec::new();
    let mut y = Vec::new();
    for (row_no, record) in rdr.records().enumerate().skip(opts.header_lines) {
        let record = record.with_context(|| format!("{name}: CSV row {row_no}"))?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if record.len() < 2 {
            bail!("{name}: CSV row {row_no} has {} column(s), expected 2", record.len());
        }
        x.push(parse_float(&record[0], name, row_no)?);
        y.push(parse_float(&record[1], name, row_no)?);
    }

    let buffer = SpectrumBuffer::new(x, y, opts.unit)
        .with_context(|| format!("{name}: invalid spectrum"))?
        .with_label(name);
    Ok(LoadedSpectrum {
        id: name.to_string(),
        header: BTreeMap::new(),
        buffer,
    })
}

fn parse_float(field: &str, name: &str, row: usize) -> Result<f64> {
    field
        .parse::<f64>()
        .with_context(|| format!("{name}: CSV row {row}: '{field}' is not a number"))
}

// ---------------------------------------------------------------------------
// JCAMP-DX
// ---------------------------------------------------------------------------

/// Labels that must be present with a non-empty value. `DELTAX` is also
/// required, unless `LASTX` is there to derive it from.
const REQUIRED_JCAMP_LABELS: &[&str] = &["TITLE", "YUNITS", "FIRSTX", "NPOINTS"];

/// Parse a single-block JCAMP-DX spectrum in (X++(Y..Y)) form.
///
/// The x axis is rebuilt from `FIRSTX + i * DELTAX`, with
/// `DELTAX = (LASTX - FIRSTX) / (NPOINTS - 1)` when only `LASTX` is given;
/// each data line's leading x value is only an index and is ignored. Y values
/// are scaled by `YFACTOR`. An x axis in micrometres is converted to
/// wavenumbers.
pub fn parse_jcamp(text: &str, source: &str) -> Result<LoadedSpectrum> {
    let mut header: BTreeMap<String, String> = BTreeMap::new();
    let mut ys: Vec<f64> = Vec::new();
    let mut in_data = false;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("$$") {
            continue;
        }
        if let Some(rest) = line.strip_prefix("##") {
            let (label, value) = rest.split_once('=').unwrap_or((rest, ""));
            let label = label.trim().to_ascii_uppercase();
            in_data = label == "XYDATA";
            if label == "END" {
                break;
            }
            header.insert(label, value.trim().to_string());
            continue;
        }
        if !in_data {
            continue;
        }
        // Inline comment after the values.
        let data = line.split("$$").next().unwrap_or("");
        for tok in data.split_whitespace().skip(1) {
            let v = tok.parse::<f64>().with_context(|| {
                format!("{source}: line {}: '{tok}' is not a number", line_no + 1)
            })?;
            ys.push(v);
        }
    }

    for label in REQUIRED_JCAMP_LABELS {
        if !matches!(header.get(*label), Some(v) if !v.is_empty()) {
            bail!("{source}: could not parse ##{label}");
        }
    }

    let unit_label = &header["YUNITS"];
    let unit = Unit::parse_label(unit_label)
        .ok_or_else(|| anyhow!("{source}: unsupported Y unit '{unit_label}'"))?;
    let npoints: usize = header_number(&header, "NPOINTS", source)?;
    let firstx: f64 = header_number(&header, "FIRSTX", source)?;
    let deltax: f64 = match header.get("DELTAX") {
        Some(_) => header_number(&header, "DELTAX", source)?,
        None => {
            let lastx: f64 = header_number(&header, "LASTX", source)
                .with_context(|| format!("{source}: neither ##DELTAX nor ##LASTX present"))?;
            if npoints < 2 {
                bail!("{source}: cannot derive DELTAX from {npoints} point(s)");
            }
            (lastx - firstx) / (npoints - 1) as f64
        }
    };

    if ys.is_empty() {
        bail!("{source}: no ##XYDATA values");
    }
    if ys.len() != npoints {
        bail!("{source}: ##NPOINTS={npoints} but {} y values were read", ys.len());
    }

    let yfactor: f64 = match header.get("YFACTOR") {
        Some(_) => header_number(&header, "YFACTOR", source)?,
        None => 1.0,
    };
    if yfactor != 1.0 {
        ys.iter_mut().for_each(|y| *y *= yfactor);
    }

    let mut xs: Vec<f64> = (0..npoints).map(|i| firstx + i as f64 * deltax).collect();
    let xunits = header.get("XUNITS").map(|s| s.to_ascii_uppercase()).unwrap_or_default();
    if xunits.contains("MICROMETER") {
        xs.iter_mut().for_each(|x| *x = 1.0e4 / *x);
    } else if !xunits.is_empty() && xunits != "1/CM" {
        warn!("{source}: unrecognised XUNITS '{xunits}', assuming 1/CM");
    }

    let id = match header.get("MOLFORM").map(|m| m.replace(' ', "")) {
        Some(formula) if !formula.is_empty() => formula,
        _ => header["TITLE"].clone(),
    };

    let buffer = SpectrumBuffer::new(xs, ys, unit)
        .with_context(|| format!("{source}: invalid spectrum"))?
        .with_label(id.clone());
    Ok(LoadedSpectrum { id, header, buffer })
}

fn header_number<T>(header: &BTreeMap<String, String>, label: &str, source: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = header
        .get(label)
        .ok_or_else(|| anyhow!("{source}: missing ##{label}"))?;
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{source}: ##{label}={raw} is not a number"))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct JsonSpectrum {
    x: Vec<f64>,
    y: Vec<f64>,
    #[serde(default)]
    unit: Option<Unit>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    One(JsonSpectrum),
    Many(Vec<JsonSpectrum>),
}

/// Parse one record or an array of records. Records without an `id` are
/// named after the file, suffixed with their index when there are several.
pub fn parse_json(text: &str, source: &str) -> Result<Vec<LoadedSpectrum>> {
    let doc: JsonDocument =
        serde_json::from_str(text).with_context(|| format!("{source}: parsing JSON"))?;
    let records = match doc {
        JsonDocument::One(r) => vec![r],
        JsonDocument::Many(rs) => rs,
    };
    let many = records.len() > 1;

    records
        .into_iter()
        .enumerate()
        .map(|(i, rec)| {
            let id = rec.id.unwrap_or_else(|| {
                if many {
                    format!("{source}[{i}]")
                } else {
                    source.to_string()
                }
            });
            let buffer = SpectrumBuffer::new(rec.x, rec.y, rec.unit.unwrap_or(Unit::Absorbance))
                .with_context(|| format!("{source}: record {i} is not a valid spectrum"))?
                .with_label(id.clone());
            Ok(LoadedSpectrum {
                id,
                header: BTreeMap::new(),
                buffer,
            })
        })
        .collect()
}
