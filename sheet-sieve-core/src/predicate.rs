use std::fmt;
use std::str::FromStr;

use arrow::array::{Array, BooleanArray};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::{ColumnData, ColumnKind, Table};

/// Per-row predicate result. Never contains null slots.
pub type Mask = BooleanArray;

// --- criteria ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    GreaterThan,
    LessThan,
    EqualTo,
    NotEqualTo,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

const NUMERIC_CRITERIA: [Criterion; 6] = [
    Criterion::GreaterThan,
    Criterion::LessThan,
    Criterion::EqualTo,
    Criterion::NotEqualTo,
    Criterion::IsNull,
    Criterion::IsNotNull,
];

const TEXT_CRITERIA: [Criterion; 6] = [
    Criterion::Contains,
    Criterion::NotContains,
    Criterion::StartsWith,
    Criterion::EndsWith,
    Criterion::IsNull,
    Criterion::IsNotNull,
];

impl Criterion {
    pub const ALL: [Criterion; 10] = [
        Criterion::GreaterThan,
        Criterion::LessThan,
        Criterion::EqualTo,
        Criterion::NotEqualTo,
        Criterion::Contains,
        Criterion::NotContains,
        Criterion::StartsWith,
        Criterion::EndsWith,
        Criterion::IsNull,
        Criterion::IsNotNull,
    ];

    /// The criteria offered for a column of the given kind.
    pub fn for_kind(kind: ColumnKind) -> &'static [Criterion] {
        match kind {
            ColumnKind::Numeric => &NUMERIC_CRITERIA,
            ColumnKind::Text => &TEXT_CRITERIA,
        }
    }

    pub fn applies_to(self, kind: ColumnKind) -> bool {
        match (self.check(), kind) {
            (Check::IsNull | Check::IsNotNull, ColumnKind::Numeric | ColumnKind::Text) => true,
            (Check::Numeric(_), ColumnKind::Numeric) | (Check::Text(_), ColumnKind::Text) => true,
            (Check::Numeric(_), ColumnKind::Text) | (Check::Text(_), ColumnKind::Numeric) => false,
        }
    }

    /// What the criterion tests, split by the column kind it needs.
    pub fn check(self) -> Check {
        match self {
            Criterion::GreaterThan => Check::Numeric(NumericOp::GreaterThan),
            Criterion::LessThan => Check::Numeric(NumericOp::LessThan),
            Criterion::EqualTo => Check::Numeric(NumericOp::EqualTo),
            Criterion::NotEqualTo => Check::Numeric(NumericOp::NotEqualTo),
            Criterion::Contains => Check::Text(TextOp::Contains),
            Criterion::NotContains => Check::Text(TextOp::NotContains),
            Criterion::StartsWith => Check::Text(TextOp::StartsWith),
            Criterion::EndsWith => Check::Text(TextOp::EndsWith),
            Criterion::IsNull => Check::IsNull,
            Criterion::IsNotNull => Check::IsNotNull,
        }
    }

    pub fn needs_value(self) -> bool {
        !matches!(self, Criterion::IsNull | Criterion::IsNotNull)
    }

    pub fn name(self) -> &'static str {
        match self {
            Criterion::GreaterThan => "greater_than",
            Criterion::LessThan => "less_than",
            Criterion::EqualTo => "equal_to",
            Criterion::NotEqualTo => "not_equal_to",
            Criterion::Contains => "contains",
            Criterion::NotContains => "not_contains",
            Criterion::StartsWith => "starts_with",
            Criterion::EndsWith => "ends_with",
            Criterion::IsNull => "is_null",
            Criterion::IsNotNull => "is_not_null",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Criterion::GreaterThan => "Greater than",
            Criterion::LessThan => "Less than",
            Criterion::EqualTo => "Equal to",
            Criterion::NotEqualTo => "Not equal to",
            Criterion::Contains => "Contains",
            Criterion::NotContains => "Does not contain",
            Criterion::StartsWith => "Starts with",
            Criterion::EndsWith => "Ends with",
            Criterion::IsNull => "Is null",
            Criterion::IsNotNull => "Is not null",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Criterion {
    type Err = FilterError;

    /// Accepts snake_case names, labels, short words and comparison symbols,
    /// ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        let c = match key.as_str() {
            "greater_than" | "gt" | ">" => Criterion::GreaterThan,
            "less_than" | "lt" | "<" => Criterion::LessThan,
            "equal_to" | "equals" | "eq" | "=" | "==" => Criterion::EqualTo,
            "not_equal_to" | "ne" | "!=" | "<>" => Criterion::NotEqualTo,
            "contains" => Criterion::Contains,
            "not_contains" | "does_not_contain" => Criterion::NotContains,
            "starts_with" => Criterion::StartsWith,
            "ends_with" => Criterion::EndsWith,
            "is_null" | "null" => Criterion::IsNull,
            "is_not_null" | "not_null" => Criterion::IsNotNull,
            _ => {
                return Err(FilterError::UnknownCriterion {
                    criterion: s.to_string(),
                })
            }
        };
        Ok(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    IsNull,
    IsNotNull,
    Numeric(NumericOp),
    Text(TextOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    GreaterThan,
    LessThan,
    EqualTo,
    NotEqualTo,
}

impl NumericOp {
    pub fn eval(self, x: f64, rhs: f64) -> bool {
        match self {
            NumericOp::GreaterThan => x > rhs,
            NumericOp::LessThan => x < rhs,
            NumericOp::EqualTo => x == rhs,
            NumericOp::NotEqualTo => x != rhs,
        }
    }
}

/// Text tests; both sides are expected lowercased already.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
}

impl TextOp {
    pub fn eval(self, hay: &str, needle: &str) -> bool {
        match self {
            TextOp::Contains => hay.contains(needle),
            TextOp::NotContains => !hay.contains(needle),
            TextOp::StartsWith => hay.starts_with(needle),
            TextOp::EndsWith => hay.ends_with(needle),
        }
    }
}

// --- errors ---

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("column '{column}' not found")]
    UnknownColumn { column: String },
    #[error("unknown criterion '{criterion}'")]
    UnknownCriterion { criterion: String },
    #[error("criterion '{criterion}' does not apply to {kind} column '{column}'")]
    CriterionTypeMismatch {
        column: String,
        criterion: Criterion,
        kind: ColumnKind,
    },
    #[error("invalid value {} for column '{column}'", describe_value(.value))]
    InvalidValue {
        column: String,
        value: Option<String>,
    },
}

fn describe_value(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("'{v}'"),
        None => "(missing)".to_string(),
    }
}

// --- filter specs ---

/// One typed filter: `column <criterion> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub column: String,
    pub criterion: Criterion,
    pub value: Option<String>,
}

impl FilterSpec {
    pub fn new(column: impl Into<String>, criterion: Criterion, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            criterion,
            value: Some(value.into()),
        }
    }

    /// A spec without a value, e.g. `IsNull`.
    pub fn bare(column: impl Into<String>, criterion: Criterion) -> Self {
        Self {
            column: column.into(),
            criterion,
            value: None,
        }
    }
}

/// A filter as supplied by a caller, criterion still untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFilter {
    pub column: String,
    pub criterion: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl RawFilter {
    pub fn new(column: impl Into<String>, criterion: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            column: column.into(),
            criterion: criterion.into(),
            value: value.map(str::to_string),
        }
    }

    pub fn parse(&self) -> Result<FilterSpec, FilterError> {
        Ok(FilterSpec {
            column: self.column.clone(),
            criterion: self.criterion.parse()?,
            value: self.value.clone(),
        })
    }
}

// --- compilation ---

/// Evaluate one filter against every row of `table`.
///
/// Checks run in order: the column must exist, the criterion must apply to
/// the column's kind, and a value-bearing criterion needs a usable value.
/// Null cells never satisfy a value comparison, including the negated
/// forms `NotEqualTo` and `NotContains`.
pub fn compile(table: &Table, spec: &FilterSpec) -> Result<Mask, FilterError> {
    let column = table
        .column(&spec.column)
        .ok_or_else(|| FilterError::UnknownColumn {
            column: spec.column.clone(),
        })?;
    match (spec.criterion.check(), column) {
        (Check::IsNull, ColumnData::Numeric(a)) => Ok(null_mask(a, true)),
        (Check::IsNull, ColumnData::Text(a)) => Ok(null_mask(a, true)),
        (Check::IsNotNull, ColumnData::Numeric(a)) => Ok(null_mask(a, false)),
        (Check::IsNotNull, ColumnData::Text(a)) => Ok(null_mask(a, false)),
        (Check::Numeric(op), ColumnData::Numeric(a)) => {
            let rhs = numeric_value(spec)?;
            Ok(a.iter().map(|v| Some(v.is_some_and(|x| op.eval(x, rhs)))).collect())
        }
        (Check::Text(op), ColumnData::Text(a)) => {
            let needle = text_value(spec)?.to_lowercase();
            let mask = a
                .iter()
                .map(|v| Some(v.is_some_and(|s| op.eval(&s.to_lowercase(), &needle))))
                .collect();
            Ok(mask)
        }
        (Check::Numeric(_), ColumnData::Text(_)) | (Check::Text(_), ColumnData::Numeric(_)) => {
            Err(FilterError::CriterionTypeMismatch {
                column: spec.column.clone(),
                criterion: spec.criterion,
                kind: column.kind(),
            })
        }
    }
}

fn null_mask(array: &dyn Array, want_null: bool) -> Mask {
    (0..array.len())
        .map(|i| Some(array.is_null(i) == want_null))
        .collect()
}

fn invalid(spec: &FilterSpec) -> FilterError {
    FilterError::InvalidValue {
        column: spec.column.clone(),
        value: spec.value.clone(),
    }
}

fn numeric_value(spec: &FilterSpec) -> Result<f64, FilterError> {
    spec.value
        .as_deref()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .ok_or_else(|| invalid(spec))
}

fn text_value(spec: &FilterSpec) -> Result<&str, FilterError> {
    spec.value.as_deref().ok_or_else(|| invalid(spec))
}
