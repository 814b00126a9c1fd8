use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use num_complex::Complex64;
use serde::Deserialize;

use super::model::{
    CurrentReading, Measurement, MeasurementTime, SourceKind, SpectralColumns, Spectrum,
    TimeSeries,
};
use crate::error::ResonanceError;

/// Column indices of `{frequency, X, Y, R, φ}` in lock-in sweep files.
pub const SPECTRAL_COLUMNS: [usize; 5] = [0, 1, 3, 5, 7];

/// Column indices of `{time, signal}` in FID files.
pub const TIME_DOMAIN_COLUMNS: [usize; 2] = [0, 1];

const CURRENT_PATTERN: &str = "Curr_<n>_uA";
const CURRENT_PREFIX: &str = "Curr_";
const CURRENT_SUFFIX: &str = "_uA";
/// Longest digit run accepted between prefix and suffix.
const CURRENT_MAX_DIGITS: usize = 5;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a measurement of the given kind from a column file.
pub fn load_measurement(path: &Path, kind: SourceKind) -> Result<Measurement> {
    match kind {
        SourceKind::Spectral => load_spectral(path).map(Measurement::Spectral),
        SourceKind::TimeDomain => load_time_domain(path).map(Measurement::TimeDomain),
    }
}

/// Read a swept-frequency lock-in file (columns 0, 1, 3, 5, 7).
pub fn load_spectral(path: &Path) -> Result<SpectralColumns> {
    let mut cols = read_columns(path, &SPECTRAL_COLUMNS)?.into_iter();
    let mut next = || cols.next().unwrap_or_default();
    let (frequency, x, y, r, phi) = (next(), next(), next(), next(), next());
    SpectralColumns::new(frequency, x, y, r, phi)
        .with_context(|| format!("assembling spectral columns of {}", path.display()))
}

/// Read a free-induction-decay file (columns 0, 1).
pub fn load_time_domain(path: &Path) -> Result<TimeSeries> {
    let mut cols = read_columns(path, &TIME_DOMAIN_COLUMNS)?.into_iter();
    let time = cols.next().unwrap_or_default();
    let signal = cols.next().unwrap_or_default();
    TimeSeries::new(time, signal)
        .with_context(|| format!("assembling time series of {}", path.display()))
}

// ---------------------------------------------------------------------------
// Column reader
// ---------------------------------------------------------------------------

/// Read the requested zero-based `columns` of a whitespace-delimited numeric file.
///
/// Blank lines and lines starting with `#` are skipped. The result holds one
/// vector per requested column, in request order.
pub fn read_columns(path: &Path, columns: &[usize]) -> Result<Vec<Vec<f64>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_columns(&text, columns).with_context(|| format!("parsing {}", path.display()))
}

/// Parse column text already in memory. See [`read_columns`].
pub fn parse_columns(text: &str, columns: &[usize]) -> Result<Vec<Vec<f64>>> {
    let mut out: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        for (slot, &col) in out.iter_mut().zip(columns) {
            let Some(tok) = fields.get(col) else {
                bail!(
                    "line {}: has {} columns, column {col} requested",
                    line_no + 1,
                    fields.len()
                );
            };
            let value = tok.parse::<f64>().with_context(|| {
                format!("line {}, column {col}: '{tok}' is not a number", line_no + 1)
            })?;
            slot.push(value);
        }
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// All files in `dir` with the given extension (no leading dot), sorted by path.
pub fn list_data_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("reading entry of {}", dir.display()))?
            .path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Pair each path with its encoded current and order by rising current.
/// Paths without a current sort last, keeping their relative order.
pub fn sort_by_current(paths: Vec<PathBuf>) -> Vec<(PathBuf, CurrentReading)> {
    let mut tagged: Vec<(PathBuf, CurrentReading)> = paths
        .into_iter()
        .map(|p| {
            let reading = CurrentReading::from(parse_current(&p.to_string_lossy()));
            (p, reading)
        })
        .collect();
    tagged.sort_by(|(_, a), (_, b)| match (a, b) {
        (CurrentReading::Found(x), CurrentReading::Found(y)) => x.total_cmp(y),
        (CurrentReading::Found(_), CurrentReading::NotFound) => std::cmp::Ordering::Less,
        (CurrentReading::NotFound, CurrentReading::Found(_)) => std::cmp::Ordering::Greater,
        (CurrentReading::NotFound, CurrentReading::NotFound) => std::cmp::Ordering::Equal,
    });
    tagged
}

// ---------------------------------------------------------------------------
// Filename metadata
// ---------------------------------------------------------------------------

/// Drive current in microamps from a `Curr_<n>_uA` fragment of `source_id`.
pub fn parse_current(source_id: &str) -> crate::error::Result<f64> {
    source_id
        .match_indices(CURRENT_PREFIX)
        .find_map(|(start, _)| current_after(&source_id[start + CURRENT_PREFIX.len()..]))
        .ok_or_else(|| ResonanceError::MetadataNotFound {
            pattern: CURRENT_PATTERN,
            source_id: source_id.to_string(),
        })
}

/// `-?<1..=5 digits>_uA` at the start of `rest`.
fn current_after(rest: &str) -> Option<f64> {
    let sign_len = usize::from(rest.starts_with('-'));
    let digits = rest[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if !(1..=CURRENT_MAX_DIGITS).contains(&digits) {
        return None;
    }
    let end = sign_len + digits;
    if !rest[end..].starts_with(CURRENT_SUFFIX) {
        return None;
    }
    rest[..end].parse().ok()
}

/// Day and time of day from the trailing numeric groups of a file name.
///
/// Station files end in `..._<day>_<month>_<year>_<hh>_<mm>_<ss>`-like runs of
/// numbers; the day is the sixth group from the end and hh/mm/ss the last three.
pub fn parse_timestamp(source_id: &str) -> Option<MeasurementTime> {
    let name = Path::new(source_id)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source_id);
    let numbers: Vec<u32> = name
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .filter_map(|run| run.parse().ok())
        .collect();
    let n = numbers.len();
    if n < 6 {
        return None;
    }
    Some(MeasurementTime {
        day: numbers[n - 6],
        hour: numbers[n - 3],
        minute: numbers[n - 2],
        second: numbers[n - 1],
    })
}

// ---------------------------------------------------------------------------
// Spectrum cache
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SpectrumFile {
    frequency: Vec<f64>,
    signal: Vec<Complex64>,
}

/// Write a spectrum as JSON.
pub fn save_spectrum(path: &Path, spectrum: &Spectrum) -> Result<()> {
    let text = serde_json::to_string(spectrum).context("serialising spectrum")?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// Read a spectrum written by [`save_spectrum`].
pub fn load_spectrum(path: &Path) -> Result<Spectrum> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let raw: SpectrumFile = serde_json::from_str(&text).context("parsing spectrum JSON")?;
    Ok(Spectrum::new(raw.frequency, raw.signal)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selected_columns_skipping_comments() {
        let text = "# f x\n1.0 2.0 3.0\n\n4.0 5.0 6.0\n";
        let cols = parse_columns(text, &[2, 0]).unwrap();
        assert_eq!(cols, vec![vec![3.0, 6.0], vec![1.0, 4.0]]);
    }

    #[test]
    fn short_row_is_an_error() {
        let err = parse_columns("1 2 3\n1 2\n", &[2]).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn non_numeric_cell_is_an_error() {
        assert!(parse_columns("1 abc\n", &[1]).is_err());
    }

    #[test]
    fn current_from_file_name() {
        assert_eq!(parse_current("run/scan_Curr_-250_uA.dat").unwrap(), -250.0);
        assert_eq!(parse_current("Curr_7_uA").unwrap(), 7.0);
    }

    #[test]
    fn current_missing_is_metadata_error() {
        let err = parse_current("scan_0001.dat").unwrap_err();
        assert!(matches!(err, ResonanceError::MetadataNotFound { .. }));
        assert!(parse_current("Curr_123456_uA").is_err());
    }

    #[test]
    fn sort_puts_unknown_currents_last() {
        let paths = vec![
            PathBuf::from("b_Curr_30_uA.dat"),
            PathBuf::from("plain.dat"),
            PathBuf::from("a_Curr_-5_uA.dat"),
        ];
        let sorted: Vec<f64> = sort_by_current(paths)
            .into_iter()
            .map(|(_, c)| c.value_or_nan())
            .collect();
        assert_eq!(sorted[0], -5.0);
        assert_eq!(sorted[1], 30.0);
        assert!(sorted[2].is_nan());
    }

    #[test]
    fn timestamp_from_trailing_numbers() {
        let t = parse_timestamp("data/FID_Curr_10_uA_23_10_2026_18_05_30.dat").unwrap();
        assert_eq!(
            t,
            MeasurementTime {
                day: 23,
                hour: 18,
                minute: 5,
                second: 30
            }
        );
        assert!(parse_timestamp("short_1_2.dat").is_none());
    }
}
