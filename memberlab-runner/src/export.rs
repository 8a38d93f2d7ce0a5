//! Output files for a pipeline run.
//!
//! - `records.csv`: annotated price records
//! - `spans.csv`: one row per canonical ticker
//! - `survivors.csv`: one row per month (monthly pipeline)
//! - `monthly_returns.csv`: month-end closes and returns
//! - `presence.csv`: the presence matrix, `date` then one 0/1 column per ticker
//! - `records.parquet`, `presence.parquet`: optional, via polars
//! - `report.json`: the run report

use crate::pipeline::PipelineOutput;
use crate::report::RunReport;
use memberlab_core::domain::{MonthlySurvivorRecord, RecordOrigin};
use memberlab_core::returns::records_to_dataframe;
use memberlab_core::PresenceMatrix;
use polars::prelude::{DataFrame, ParquetWriter, PolarsError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] PolarsError),
}

/// Flat survivor row; ticker sets are space-separated.
#[derive(Debug, Serialize)]
struct SurvivorRow {
    month: String,
    period_start: Option<chrono::NaiveDate>,
    num_survivors: usize,
    total_tickers_seen: usize,
    origin: &'static str,
    filled_from: Option<String>,
    surviving: String,
    churned: String,
}

impl From<&MonthlySurvivorRecord> for SurvivorRow {
    fn from(r: &MonthlySurvivorRecord) -> Self {
        let (origin, filled_from) = match r.origin {
            RecordOrigin::Observed { .. } => ("observed", None),
            RecordOrigin::ForwardFilled { from } => ("forward_filled", Some(from.to_string())),
            RecordOrigin::NoData => ("no_data", None),
        };
        Self {
            month: r.month.to_string(),
            period_start: r.period_start,
            num_survivors: r.num_survivors(),
            total_tickers_seen: r.total_tickers_seen,
            origin,
            filled_from,
            surviving: join(&r.surviving),
            churned: join(&r.churned),
        }
    }
}

fn join<'a>(tickers: impl IntoIterator<Item = &'a String>) -> String {
    tickers
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write serializable rows as CSV with a header.
fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the presence matrix as CSV.
pub fn write_presence_csv(path: &Path, matrix: &PresenceMatrix) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = Vec::with_capacity(matrix.n_cols() + 1);
    header.push("date");
    header.extend(matrix.tickers().iter().map(String::as_str));
    wtr.write_record(&header)?;

    for (row, date) in matrix.dates().iter().enumerate() {
        let mut record = Vec::with_capacity(matrix.n_cols() + 1);
        record.push(date.to_string());
        record.extend((0..matrix.n_cols()).map(|col| matrix.value(row, col).to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, df: &mut DataFrame) -> Result<(), ExportError> {
    let file = fs::File::create(path)?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write every output file into `dir`, creating it if needed. Returns the written paths.
pub fn write_outputs(
    dir: &Path,
    output: &PipelineOutput,
    parquet: bool,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let path = dir.join("spans.csv");
    write_rows(&path, &output.spans)?;
    written.push(path);

    if !output.survivors.is_empty() {
        let path = dir.join("survivors.csv");
        write_rows(&path, output.survivors.iter().map(SurvivorRow::from))?;
        written.push(path);
    }

    let path = dir.join("presence.csv");
    write_presence_csv(&path, &output.matrix)?;
    written.push(path);

    if !output.report.prices_skipped {
        let path = dir.join("records.csv");
        write_rows(&path, &output.records)?;
        written.push(path);

        let path = dir.join("monthly_returns.csv");
        write_rows(&path, &output.monthly_returns)?;
        written.push(path);

        if parquet {
            let path = dir.join("records.parquet");
            write_parquet(&path, &mut records_to_dataframe(&output.records)?)?;
            written.push(path);
        }
    }

    if parquet {
        let path = dir.join("presence.parquet");
        write_parquet(&path, &mut output.matrix.to_dataframe()?)?;
        written.push(path);
    }

    let path = dir.join("report.json");
    write_report(&path, &output.report)?;
    written.push(path);

    tracing::info!(dir = %dir.display(), files = written.len(), "outputs written");
    Ok(written)
}
