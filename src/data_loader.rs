use anyhow::{Context, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Reads a headed CSV into a DataFrame with lower-cased column names.
fn read_csv<P: AsRef<Path>>(path: P, infer_schema_length: Option<usize>) -> Result<DataFrame> {
    let path = path.as_ref();
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(infer_schema_length)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to open CSV at {}", path.display()))?
        .finish()
        .with_context(|| format!("Failed to parse CSV at {}", path.display()))?;

    let lowered: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    df.set_column_names(lowered)?;

    Ok(df)
}

/// Loads the raw applicant attribute table.
pub fn import_application_data<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let df = read_csv(&path, Some(1000))?;
    info!(path = %path.as_ref().display(), shape = ?df.shape(), "Application data loaded");
    Ok(df)
}

/// Loads the raw monthly credit status table.
///
/// Schema inference scans the whole file: the status column mixes digit
/// and letter codes, and a long digit-only prefix must not lock the
/// column into an integer dtype that a later letter code would break.
pub fn import_credit_data<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let df = read_csv(&path, None)?;
    info!(path = %path.as_ref().display(), shape = ?df.shape(), "Credit data loaded");
    Ok(df)
}

/// Persists a table as a headed CSV with stable column order.
pub fn write_csv<P: AsRef<Path>>(df: &mut DataFrame, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create output file at {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
    info!(path = %path.display(), shape = ?df.shape(), "Table written");
    Ok(())
}
