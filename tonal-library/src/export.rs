//! CSV export of merged feature rows

use crate::record::{FeatureRow, MFCC_COUNT};
use std::io::Write;
use std::path::Path;

/// Column names in output order
pub fn header() -> Vec<String> {
    let mut columns: Vec<String> = [
        "track_id",
        "rms",
        "spectral_centroid",
        "spectral_rolloff",
        "chroma_mean",
        "tempo",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    columns.extend((1..=MFCC_COUNT).map(|i| format!("mfcc_{}", i)));
    columns.extend(
        [
            "key",
            "mode",
            "scale_name",
            "key_full",
            "key_correlation",
            "scale_correlation",
            "scale_pitches",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    columns
}

/// Cell/// Cells of one row; missing parts become empty cells
fn cells(row: &FeatureRow) -> Vec<String> {
    let mut cells = vec![row.track_id.clone()];

    match row.descriptors {
        Some(ref d) => cells.extend(d.to_vector().iter().map(|v| v.to_string())),
        None => cells.extend(std::iter::repeat(String::new()).take(5 + MFCC_COUNT)),
    }

    match row.tonal {
        Some(ref t) => cells.extend([
            t.key.clone(),
            t.mode.clone(),
            t.scale_name.clone(),
            t.key_full.clone(),
            t.key_correlation.to_string(),
            t.scale_correlation.to_string(),
            t.scale_pitches.clone(),
        ]),
        None => cells.extend(std::iter::repeat(String::new()).take(7)),
    }

    cells
}

/// Write rows as CSV with a header line
pub fn write_csv<W: Write>(out: W, rows: &[FeatureRow]) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(header())?;
    for row in rows {
        writer.write_record(cells(row))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write rows as CSV to a file, creating parent directories as needed
pub fn write_csv_file(path: &Path, rows: &[FeatureRow]) -> csv::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), rows)
}
