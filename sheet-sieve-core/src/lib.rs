//! Predicate-chain filtering over spreadsheet tables.
//!
//! ```text
//!  .xlsx / .csv / .parquet
//!        │
//!        ▼
//!   loader     parse file, infer column kinds → Table
//!        │
//!        ▼
//!   predicate  (column, criterion, value) → Mask | FilterError
//!        │
//!        ▼
//!   chain      fold masks with AND/OR, left to right → filtered Table
//!        │
//!        ▼
//!   export     Table → .xlsx / .csv / .parquet / .json
//! ```

pub mod chain;
pub mod export;
pub mod loader;
pub mod predicate;
pub mod table;

pub use chain::{apply_filters, combine, fold_masks, reassociate, ChainOutcome, Combinator, FilterChain};
pub use export::{export_table, to_json_rows, xlsx_bytes, ExportFormat, ExportOptions};
pub use loader::{list_sheets, load_file, LoadOptions, SourceFormat};
pub use predicate::{compile, Check, Criterion, FilterError, FilterSpec, Mask, NumericOp, RawFilter, TextOp};
pub use sheet_sieve_common::{Result, SieveError};
pub use table::{Cell, Column, ColumnData, ColumnKind, Table, TableBuilder, Value};
