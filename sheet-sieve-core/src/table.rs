use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde::{Deserialize, Serialize};
use sheet_sieve_common::{Result, SieveError};

// --- column kinds ---

/// The inferred kind of a column. Fixed for the lifetime of a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl ColumnKind {
    pub fn from_data_type(dt: &DataType) -> Option<Self> {
        match dt {
            DataType::Float64 => Some(ColumnKind::Numeric),
            DataType::Utf8 => Some(ColumnKind::Text),
            _ => None,
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            ColumnKind::Numeric => DataType::Float64,
            ColumnKind::Text => DataType::Utf8,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Text => write!(f, "text"),
        }
    }
}

// --- typed column access ---

/// A single cell read back out of a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Null,
    Number(f64),
    Text(&'a str),
}

/// Borrowed, downcast view of one column.
#[derive(Debug, Clone, Copy)]
pub enum ColumnData<'a> {
    Numeric(&'a Float64Array),
    Text(&'a StringArray),
}

impl<'a> ColumnData<'a> {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    pub fn value(&self, row: usize) -> Value<'a> {
        match self {
            ColumnData::Numeric(a) if a.is_valid(row) => Value::Number(a.value(row)),
            ColumnData::Text(a) if a.is_valid(row) => Value::Text(a.value(row)),
            _ => Value::Null,
        }
    }
}

/// Owned column contents, used to build tables directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn numeric<I: IntoIterator<Item = Option<f64>>>(values: I) -> Self {
        Column::Numeric(values.into_iter().collect())
    }

    pub fn text<S: Into<String>, I: IntoIterator<Item = Option<S>>>(values: I) -> Self {
        Column::Text(values.into_iter().map(|v| v.map(Into::into)).collect())
    }

    fn into_array(self) -> ArrayRef {
        match self {
            // NaN is a missing value, never a comparable number
            Column::Numeric(v) => Arc::new(Float64Array::from_iter(
                v.into_iter().map(|x| x.filter(|f| !f.is_nan())),
            )),
            Column::Text(v) => Arc::new(StringArray::from(v)),
        }
    }
}

// --- table ---

/// Read-only tabular data: named columns, each either `Float64` (numeric)
/// or `Utf8` (text), all of the same length.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
    kinds: Vec<ColumnKind>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.batch == other.batch
    }
}

impl Table {
    /// Wrap a batch whose columns are already `Float64` or `Utf8`.
    pub fn try_new(batch: RecordBatch) -> Result<Self> {
        let kinds = batch
            .schema()
            .fields()
            .iter()
            .map(|f| {
                ColumnKind::from_data_type(f.data_type()).ok_or_else(|| {
                    SieveError::Unsupported(format!(
                        "column '{}' has type {}; expected Float64 or Utf8",
                        f.name(),
                        f.data_type()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { batch, kinds })
    }

    /// Convert an arbitrary batch using its native typing: numeric Arrow
    /// types become numeric columns, everything else is rendered as text.
    pub fn from_typed_batch(batch: RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let mut fields = Vec::with_capacity(schema.fields().len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let kind = if field.data_type().is_numeric() {
                ColumnKind::Numeric
            } else {
                ColumnKind::Text
            };
            let converted = drop_nan(cast(array, &kind.data_type())?);
            fields.push(Field::new(field.name(), kind.data_type(), true));
            arrays.push(converted);
        }
        build_batch(fields, arrays, batch.num_rows()).and_then(Self::try_new)
    }

    /// Build a table from named owned columns.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Column)>) -> Result<Self> {
        let num_rows = columns.first().map(|(_, c)| column_len(c)).unwrap_or(0);
        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        for (name, column) in columns {
            let kind = match &column {
                Column::Numeric(_) => ColumnKind::Numeric,
                Column::Text(_) => ColumnKind::Text,
            };
            fields.push(Field::new(name, kind.data_type(), true));
            arrays.push(column.into_array());
        }
        build_batch(fields, arrays, num_rows).and_then(Self::try_new)
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// `(name, kind)` for every column, in order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnKind)> + '_ {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .zip(self.kinds.iter().copied())
            .map(|(f, k)| (f.name().as_str(), k))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.batch.schema_ref().index_of(name).ok()
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.column_index(name).map(|i| self.kinds[i])
    }

    pub fn column_data(&self, idx: usize) -> Option<ColumnData<'_>> {
        let array = self.batch.columns().get(idx)?;
        match self.kinds[idx] {
            ColumnKind::Numeric => array
                .as_any()
                .downcast_ref::<Float64Array>()
                .map(ColumnData::Numeric),
            ColumnKind::Text => array
                .as_any()
                .downcast_ref::<StringArray>()
                .map(ColumnData::Text),
        }
    }

    pub fn column(&self, name: &str) -> Option<ColumnData<'_>> {
        self.column_index(name).and_then(|i| self.column_data(i))
    }

    pub fn null_count(&self, name: &str) -> Option<usize> {
        self.column_index(name)
            .map(|i| self.batch.column(i).null_count())
    }

    pub fn value(&self, row: usize, col: usize) -> Value<'_> {
        match self.column_data(col) {
            Some(data) if row < self.num_rows() => data.value(row),
            _ => Value::Null,
        }
    }

    /// First `n` rows (all rows when `n` exceeds the row count).
    pub fn head(&self, n: usize) -> Table {
        Table {
            batch: self.batch.slice(0, n.min(self.num_rows())),
            kinds: self.kinds.clone(),
        }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }
}

fn drop_nan(array: ArrayRef) -> ArrayRef {
    let cleaned = array
        .as_any()
        .downcast_ref::<Float64Array>()
        .filter(|f| f.iter().any(|v| v.is_some_and(f64::is_nan)))
        .map(|f| Float64Array::from_iter(f.iter().map(|v| v.filter(|x| !x.is_nan()))));
    match cleaned {
        Some(c) => Arc::new(c),
        None => array,
    }
}

fn column_len(c: &Column) -> usize {
    match c {
        Column::Numeric(v) => v.len(),
        Column::Text(v) => v.len(),
    }
}

// zero-column batches still need an explicit row count
fn build_batch(fields: Vec<Field>, arrays: Vec<ArrayRef>, num_rows: usize) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        arrays,
        &options,
    )?)
}

// --- untyped cells and kind inference ---

/// A raw cell as read from an untyped source (CSV field, spreadsheet cell).
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

/// Accumulates untyped rows and infers each column's kind on `finish`.
///
/// Inference rule: a column is numeric iff every non-null cell is a native
/// number or text that parses (trimmed) as a finite `f64`. A column with no
/// non-null cells is numeric. Text cells equal to a null marker are null.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
    null_markers: HashSet<String>,
}

impl TableBuilder {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers: normalize_headers(headers),
            rows: Vec::new(),
            null_markers: HashSet::new(),
        }
    }

    pub fn with_null_markers<S: AsRef<str>>(mut self, markers: &[S]) -> Self {
        self.null_markers = markers.iter().map(|m| m.as_ref().to_string()).collect();
        self
    }

    /// Ragged rows are padded with empty cells or truncated to the header width.
    pub fn push_row(&mut self, mut cells: Vec<Cell>) {
        cells.resize(self.headers.len(), Cell::Empty);
        self.rows.push(cells);
    }

    pub fn finish(self) -> Result<Table> {
        let Self {
            headers,
            rows,
            null_markers,
        } = self;
        let mut columns = Vec::with_capacity(headers.len());
        for (idx, name) in headers.into_iter().enumerate() {
            let cells: Vec<Cell> = rows
                .iter()
                .map(|r| match &r[idx] {
                    Cell::Text(s) if null_markers.contains(s) => Cell::Empty,
                    other => other.clone(),
                })
                .collect();
            columns.push((name, infer_column(cells)));
        }
        let table = Table::from_columns(columns)?;
        log::debug!(
            "built table: {} rows, {} columns",
            table.num_rows(),
            table.num_columns()
        );
        Ok(table)
    }
}

// `str::parse` also takes "nan" and "inf"; those stay text
fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn infer_column(cells: Vec<Cell>) -> Column {
    let numeric = cells.iter().all(|c| match c {
        Cell::Empty | Cell::Number(_) => true,
        Cell::Text(s) => parse_number(s).is_some(),
    });
    if numeric {
        Column::Numeric(
            cells
                .into_iter()
                .map(|c| match c {
                    Cell::Empty => None,
                    Cell::Number(n) => Some(n),
                    Cell::Text(s) => parse_number(&s),
                })
                .collect(),
        )
    } else {
        Column::Text(
            cells
                .into_iter()
                .map(|c| match c {
                    Cell::Empty => None,
                    Cell::Number(n) => Some(n.to_string()),
                    Cell::Text(s) => Some(s),
                })
                .collect(),
        )
    }
}

/// Blank headers become `Unnamed: <idx>`; repeats get `.1`, `.2`, ... suffixes.
pub fn normalize_headers(headers: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());
    for (idx, raw) in headers.into_iter().enumerate() {
        let base = if raw.trim().is_empty() {
            format!("Unnamed: {idx}")
        } else {
            raw
        };
        let mut name = base.clone();
        while used.contains(&name) {
            let n = counts.entry(base.clone()).or_insert(0);
            *n += 1;
            name = format!("{base}.{n}");
        }
        used.insert(name.clone());
        out.push(name);
    }
    out
}
