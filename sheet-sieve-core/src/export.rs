use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use parquet::arrow::ArrowWriter;
use rust_xlsxwriter::{Format, Workbook};
use serde_json::{Map, Value as JsonValue};
use sheet_sieve_common::{Result, SieveError};

use crate::table::{Table, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Parquet,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
            ExportFormat::Json => "json",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = SieveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            "parquet" | "pq" => Ok(ExportFormat::Parquet),
            "json" => Ok(ExportFormat::Json),
            other => Err(SieveError::Unsupported(format!("export format '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub sheet_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            sheet_name: "FilteredData".into(),
        }
    }
}

pub fn export_table(
    table: &Table,
    path: &Path,
    format: ExportFormat,
    opts: &ExportOptions,
) -> Result<()> {
    match format {
        ExportFormat::Xlsx => std::fs::write(path, xlsx_bytes(table, opts)?)?,
        ExportFormat::Csv => export_csv(table, path)?,
        ExportFormat::Parquet => export_parquet(table, path)?,
        ExportFormat::Json => export_json(table, path)?,
    }
    log::debug!("exported {} rows to {} ({format})", table.num_rows(), path.display());
    Ok(())
}

/// Render the table as an in-memory xlsx workbook with one sheet.
pub fn xlsx_bytes(table: &Table, opts: &ExportOptions) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(&opts.sheet_name)?;
    for (c, name) in table.column_names().iter().enumerate() {
        let col = u16::try_from(c)
            .map_err(|_| SieveError::Other(format!("too many columns for xlsx: {}", table.num_columns())))?;
        sheet.write_string_with_format(0, col, *name, &header)?;
        sheet.set_column_width(col, (name.chars().count() + 2).max(12) as f64)?;
        for r in 0..table.num_rows() {
            let row = u32::try_from(r + 1)
                .map_err(|_| SieveError::Other(format!("too many rows for xlsx: {}", table.num_rows())))?;
            match table.value(r, c) {
                Value::Null => {}
                Value::Number(n) if n.is_finite() => {
                    sheet.write_number(row, col, n)?;
                }
                Value::Number(n) => {
                    sheet.write_string(row, col, n.to_string())?;
                }
                Value::Text(s) => {
                    sheet.write_string(row, col, s)?;
                }
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn export_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.column_names())?;
    for r in 0..table.num_rows() {
        let record: Vec<String> = (0..table.num_columns())
            .map(|c| match table.value(r, c) {
                Value::Null => String::new(),
                Value::Number(n) => n.to_string(),
                Value::Text(s) => s.to_string(),
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn export_parquet(table: &Table, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, table.batch().schema(), None)?;
    writer.write(table.batch())?;
    writer.close()?;
    Ok(())
}

/// Rows as an array of objects keyed by column name.
pub fn to_json_rows(table: &Table) -> JsonValue {
    let names = table.column_names();
    let rows = (0..table.num_rows())
        .map(|r| {
            let mut obj = Map::new();
            for (c, name) in names.iter().enumerate() {
                let v = match table.value(r, c) {
                    Value::Null => JsonValue::Null,
                    Value::Number(n) if n.is_finite() => JsonValue::from(n),
                    // JSON has no infinity; keep it readable instead of null
                    Value::Number(n) => JsonValue::from(n.to_string()),
                    Value::Text(s) => JsonValue::from(s),
                };
                obj.insert((*name).to_string(), v);
            }
            JsonValue::Object(obj)
        })
        .collect();
    JsonValue::Array(rows)
}

fn export_json(table: &Table, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &to_json_rows(table))?;
    Ok(())
}
