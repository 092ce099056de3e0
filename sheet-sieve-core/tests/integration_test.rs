use arrow::array::{Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rust_xlsxwriter::Workbook;
use sheet_sieve_core::{
    export_table, list_sheets, load_file, xlsx_bytes, ColumnKind, Combinator, ExportFormat,
    ExportOptions, FilterChain, FilterError, LoadOptions, RawFilter, SieveError, Value,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write_parquet_fixture(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("people.parquet");
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("age", DataType::Float64, true),
        Field::new("name", DataType::Utf8, true),
    ]));
    let ids = Arc::new(Int32Array::from(vec![1, 2, 3, 4]));
    let ages = Arc::new(Float64Array::from(vec![Some(10.0), Some(25.0), Some(40.0), None]));
    let names = Arc::new(StringArray::from(vec![Some("Ann"), Some("bob"), None, Some("Cid")]));
    let batch = RecordBatch::try_new(schema.clone(), vec![ids, ages, names]).unwrap();
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    path
}

fn write_workbook_fixture(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("book.xlsx");
    let mut workbook = Workbook::new();
    let first = workbook.add_worksheet();
    first.set_name("Summary").unwrap();
    first.write_string(0, 0, "note").unwrap();
    first.write_string(1, 0, "ignore me").unwrap();
    let people = workbook.add_worksheet();
    people.set_name("People").unwrap();
    people.write_string(0, 0, "age").unwrap();
    people.write_string(0, 1, "name").unwrap();
    people.write_number(1, 0, 10).unwrap();
    people.write_string(1, 1, "Ann").unwrap();
    people.write_number(2, 0, 25).unwrap();
    people.write_string(2, 1, "bob").unwrap();
    people.write_number(3, 0, 40).unwrap();
    people.write_string(4, 1, "Cid").unwrap();
    workbook.save(&path).unwrap();
    path
}

fn three_filter_chain() -> FilterChain {
    let mut chain = FilterChain::new();
    chain
        .push(Combinator::And, RawFilter::new("age", "Greater than", Some("20")))
        .push(Combinator::Or, RawFilter::new("name", "Starts with", Some("A")))
        .push(Combinator::And, RawFilter::new("age", "Is not null", None));
    chain
}

fn column_values(table: &sheet_sieve_core::Table, name: &str) -> Vec<String> {
    let idx = table.column_index(name).unwrap();
    (0..table.num_rows())
        .map(|r| match table.value(r, idx) {
            Value::Null => "<null>".to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.to_string(),
        })
        .collect()
}

#[test]
fn parquet_uses_native_typing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_parquet_fixture(&dir);
    let table = load_file(&path, &LoadOptions::default()).unwrap();
    assert_eq!(table.num_rows(), 4);
    assert_eq!(table.column_kind("id"), Some(ColumnKind::Numeric));
    assert_eq!(table.column_kind("name"), Some(ColumnKind::Text));
    assert_eq!(table.null_count("age"), Some(1));
}

#[test]
fn three_filter_scenario_from_parquet() {
    let dir = tempfile::tempdir().unwrap();
    let table = load_file(&write_parquet_fixture(&dir), &LoadOptions::default()).unwrap();
    let outcome = three_filter_chain().apply(&table).unwrap();
    assert_eq!(outcome.failures().count(), 0);
    assert_eq!(column_values(&outcome.table, "id"), ["1", "2", "3"]);
}

#[test]
fn workbook_sheet_selection() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workbook_fixture(&dir);
    assert_eq!(list_sheets(&path).unwrap(), ["Summary", "People"]);

    let first = load_file(&path, &LoadOptions::default()).unwrap();
    assert_eq!(first.column_names(), ["note"]);

    let opts = LoadOptions::default().with_sheet(Some("People".into()));
    let people = load_file(&path, &opts).unwrap();
    assert_eq!(people.column_kind("age"), Some(ColumnKind::Numeric));
    assert_eq!(column_values(&people, "age"), ["10", "25", "40", "<null>"]);
    assert_eq!(column_values(&people, "name"), ["Ann", "bob", "<null>", "Cid"]);

    let outcome = three_filter_chain().apply(&people).unwrap();
    assert_eq!(column_values(&outcome.table, "name"), ["Ann", "bob", "<null>"]);
}

#[test]
fn missing_sheet_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workbook_fixture(&dir);
    let opts = LoadOptions::default().with_sheet(Some("Nope".into()));
    match load_file(&path, &opts) {
        Err(SieveError::SheetNotFound { sheet, available }) => {
            assert_eq!(sheet, "Nope");
            assert_eq!(available, "Summary, People");
        }
        other => panic!("expected SheetNotFound, got {other:?}"),
    }
}

#[test]
fn partial_failure_still_filters_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("people.csv");
    std::fs::write(&csv, "age,name\n10,Ann\n25,bob\n40,\n,Cid\n").unwrap();
    let table = load_file(&csv, &LoadOptions::default()).unwrap();

    let chain = FilterChain {
        filters: vec![
            RawFilter::new("age", "gt", Some("abc")),
            RawFilter::new("name", "contains", Some("B")),
        ],
        combinators: vec![Combinator::Or],
    };
    let outcome = chain.apply(&table).unwrap();
    assert_eq!(
        outcome.errors[0],
        Some(FilterError::InvalidValue { column: "age".into(), value: Some("abc".into()) })
    );
    assert_eq!(outcome.errors[1], None);
    assert_eq!(column_values(&outcome.table, "name"), ["bob"]);

    for format in [ExportFormat::Xlsx, ExportFormat::Csv, ExportFormat::Parquet, ExportFormat::Json] {
        let out = dir.path().join(format!("filtered.{}", format.extension()));
        export_table(&outcome.table, &out, format, &ExportOptions::default()).unwrap();
        assert!(out.exists());
    }

    // exported workbooks load back with the same rows and kinds
    let back = load_file(&dir.path().join("filtered.xlsx"), &LoadOptions::default()).unwrap();
    assert_eq!(list_sheets(&dir.path().join("filtered.xlsx")).unwrap(), ["FilteredData"]);
    assert_eq!(back.column_kind("age"), Some(ColumnKind::Numeric));
    assert_eq!(column_values(&back, "age"), ["25"]);

    let back = load_file(&dir.path().join("filtered.parquet"), &LoadOptions::default()).unwrap();
    assert_eq!(back, outcome.table);
}

#[test]
fn custom_sheet_name_in_export() {
    let dir = tempfile::tempdir().unwrap();
    let table = load_file(&write_parquet_fixture(&dir), &LoadOptions::default()).unwrap();
    let path = dir.path().join("named.xlsx");
    let opts = ExportOptions { sheet_name: "Adults".into() };
    std::fs::write(&path, xlsx_bytes(&table, &opts).unwrap()).unwrap();
    assert_eq!(list_sheets(Path::new(&path)).unwrap(), ["Adults"]);
}
