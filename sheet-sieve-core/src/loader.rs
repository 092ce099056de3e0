use std::fs::File;
use std::path::Path;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use calamine::{open_workbook_auto, Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use sheet_sieve_common::config::default_null_markers;
use sheet_sieve_common::{LoadConfig, Result, SieveError};

use crate::table::{Cell, Table, TableBuilder};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Worksheet to read; the first sheet when `None`.
    pub sheet: Option<String>,
    pub null_markers: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            null_markers: default_null_markers(),
        }
    }
}

impl LoadOptions {
    pub fn from_config(cfg: &LoadConfig) -> Self {
        Self {
            sheet: cfg.default_sheet.clone(),
            null_markers: cfg.null_markers.clone(),
        }
    }

    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        if sheet.is_some() {
            self.sheet = sheet;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Workbook,
    Delimited(u8),
    Parquet,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceFormat::Workbook),
            "csv" => Ok(SourceFormat::Delimited(b',')),
            "tsv" | "tab" => Ok(SourceFormat::Delimited(b'\t')),
            "parquet" | "pq" => Ok(SourceFormat::Parquet),
            other => Err(SieveError::Unsupported(format!("input extension '.{other}'"))),
        }
    }
}

/// Load a table from a spreadsheet, CSV/TSV or Parquet file. Dispatch by extension.
pub fn load_file(path: &Path, opts: &LoadOptions) -> Result<Table> {
    let table = match SourceFormat::from_path(path)? {
        SourceFormat::Workbook => load_workbook(path, opts)?,
        SourceFormat::Delimited(d) => load_delimited(path, d, opts)?,
        SourceFormat::Parquet => load_parquet(path)?,
    };
    log::debug!(
        "loaded {}: {} rows, {} columns",
        path.display(),
        table.num_rows(),
        table.num_columns()
    );
    Ok(table)
}

/// Sheet names of a workbook. Single-table formats report one sheet named
/// after the file stem.
pub fn list_sheets(path: &Path) -> Result<Vec<String>> {
    match SourceFormat::from_path(path)? {
        SourceFormat::Workbook => Ok(open_workbook_auto(path)?.sheet_names()),
        _ => Ok(vec![path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()]),
    }
}

// --- workbooks ---

fn load_workbook(path: &Path, opts: &LoadOptions) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();
    let sheet = match &opts.sheet {
        Some(s) if names.contains(s) => s.clone(),
        Some(s) => {
            return Err(SieveError::SheetNotFound {
                sheet: s.clone(),
                available: names.join(", "),
            })
        }
        None => names
            .first()
            .cloned()
            .ok_or_else(|| SieveError::Other(format!("{} has no sheets", path.display())))?,
    };
    let range = workbook.worksheet_range(&sheet)?;
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|r| r.iter().map(|d| d.to_string()).collect())
        .unwrap_or_default();
    let mut builder = TableBuilder::new(headers).with_null_markers(&opts.null_markers);
    for row in rows {
        builder.push_row(row.iter().map(cell_from_data).collect());
    }
    builder.finish()
}

fn cell_from_data(d: &Data) -> Cell {
    match d {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Text(
            dt.as_datetime()
                .map(|t| t.to_string())
                .unwrap_or_else(|| dt.as_f64().to_string()),
        ),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

// --- csv / tsv ---

fn load_delimited(path: &Path, delimiter: u8, opts: &LoadOptions) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut builder = TableBuilder::new(headers).with_null_markers(&opts.null_markers);
    for record in reader.records() {
        let record = record?;
        builder.push_row(
            record
                .iter()
                .map(|f| {
                    if f.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(f.to_string())
                    }
                })
                .collect(),
        );
    }
    builder.finish()
}

// --- parquet ---

fn load_parquet(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<std::result::Result<Vec<RecordBatch>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;
    Table::from_typed_batch(batch)
}
