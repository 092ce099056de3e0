use std::fmt;
use std::path::Path;
use std::str::FromStr;

use arrow::compute::{and, filter_record_batch, or};
use serde::{Deserialize, Serialize};
use sheet_sieve_common::{Result, SieveError};

use crate::predicate::{compile, FilterError, Mask, RawFilter};
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    And,
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => write!(f, "AND"),
            Combinator::Or => write!(f, "OR"),
        }
    }
}

impl FromStr for Combinator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" | "&" | "&&" => Ok(Combinator::And),
            "or" | "|" | "||" => Ok(Combinator::Or),
            other => Err(format!("expected AND or OR, got '{other}'")),
        }
    }
}

// --- folding ---

/// Fold masks left to right with no precedence:
/// `((m0 c0 m1) c1 m2) ...`. Surplus combinators are ignored; a missing one
/// is treated as AND.
pub fn fold_masks(masks: &[Mask], combinators: &[Combinator]) -> Result<Option<Mask>> {
    let Some((first, rest)) = masks.split_first() else {
        return Ok(None);
    };
    if combinators.len() + 1 < masks.len() {
        log::warn!(
            "{} masks but only {} combinators; missing slots default to AND",
            masks.len(),
            combinators.len()
        );
    }
    let mut acc = first.clone();
    for (i, mask) in rest.iter().enumerate() {
        acc = match combinators.get(i).copied().unwrap_or(Combinator::And) {
            Combinator::And => and(&acc, mask)?,
            Combinator::Or => or(&acc, mask)?,
        };
    }
    Ok(Some(acc))
}

/// Select the rows of `table` where the folded mask is true, preserving
/// order. With no masks the table is returned unchanged.
pub fn combine(table: &Table, masks: &[Mask], combinators: &[Combinator]) -> Result<Table> {
    match fold_masks(masks, combinators)? {
        None => Ok(table.clone()),
        Some(mask) => Table::try_new(filter_record_batch(table.batch(), &mask)?),
    }
}

/// Combinators for the filters that compiled, given which ones did.
///
/// Each surviving filter keeps the combinator that joined it to the filter
/// before it (slot `i - 1` for filter `i`). A failed filter therefore takes
/// its preceding combinator with it; the first survivor's preceding slot is
/// dropped because nothing precedes it in the reduced chain. For
/// `a AND b OR c` with `b` failed this yields `a OR c`.
pub fn reassociate(compiled: &[bool], combinators: &[Combinator]) -> Vec<Combinator> {
    compiled
        .iter()
        .enumerate()
        .filter(|(_, ok)| **ok)
        .skip(1)
        .map(|(i, _)| combinators.get(i - 1).copied().unwrap_or(Combinator::And))
        .collect()
}

// --- chains ---

/// An ordered list of filters with the combinators between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterChain {
    #[serde(default)]
    pub filters: Vec<RawFilter>,
    #[serde(default)]
    pub combinators: Vec<Combinator>,
}

/// The filtered table plus one error slot per input filter.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub table: Table,
    pub errors: Vec<Option<FilterError>>,
}

impl ChainOutcome {
    /// `(index, error)` for every filter that was skipped.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &FilterError)> + '_ {
        self.errors
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, e)))
    }

    /// Number of filters that contributed a mask.
    pub fn applied(&self) -> usize {
        self.errors.iter().filter(|e| e.is_none()).count()
    }
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter; `join` connects it to the previous one and is
    /// ignored for the first filter.
    pub fn push(&mut self, join: Combinator, filter: RawFilter) -> &mut Self {
        if !self.filters.is_empty() {
            self.combinators.push(join);
        }
        self.filters.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Load a chain from a `.json` or `.toml` file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => Ok(serde_json::from_str(&content)?),
            "toml" => toml::from_str(&content).map_err(|e| SieveError::Config(e.to_string())),
            other => Err(SieveError::Unsupported(format!("chain file extension '.{other}'"))),
        }
    }

    /// Compile every filter, skip the ones that fail, and combine the rest.
    pub fn apply(&self, table: &Table) -> Result<ChainOutcome> {
        apply_filters(table, &self.filters, &self.combinators)
    }
}

pub fn apply_filters(
    table: &Table,
    filters: &[RawFilter],
    combinators: &[Combinator],
) -> Result<ChainOutcome> {
    let mut masks = Vec::with_capacity(filters.len());
    let mut errors = Vec::with_capacity(filters.len());
    for (i, raw) in filters.iter().enumerate() {
        match raw.parse().and_then(|spec| compile(table, &spec)) {
            Ok(mask) => {
                masks.push(mask);
                errors.push(None);
            }
            Err(e) => {
                log::warn!("skipping filter {}: {e}", i + 1);
                errors.push(Some(e));
            }
        }
    }
    let compiled: Vec<bool> = errors.iter().map(Option::is_none).collect();
    let joins = reassociate(&compiled, combinators);
    log::debug!("combining {} of {} filters with {:?}", masks.len(), filters.len(), joins);
    let filtered = combine(table, &masks, &joins)?;
    Ok(ChainOutcome {
        table: filtered,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Value};
    use arrow::array::BooleanArray;

    fn table() -> Table {
        Table::from_columns(vec![
            ("age", Column::numeric([Some(10.0), Some(25.0), Some(40.0), None])),
            ("name", Column::text([Some("Ann"), Some("bob"), None, Some("Cid")])),
        ])
        .unwrap()
    }

    fn mask(bits: &[bool]) -> Mask {
        BooleanArray::from(bits.to_vec())
    }

    fn ages(t: &Table) -> Vec<Value<'_>> {
        (0..t.num_rows()).map(|r| t.value(r, 0)).collect()
    }

    #[test]
    fn empty_chain_is_identity() {
        let t = table();
        let out = combine(&t, &[], &[]).unwrap();
        assert_eq!(out, t);
        let outcome = FilterChain::new().apply(&t).unwrap();
        assert_eq!(outcome.table, t);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn fold_has_no_precedence() {
        // (T OR F) AND F = F, whereas T OR (F AND F) would be T
        let m = fold_masks(
            &[mask(&[true]), mask(&[false]), mask(&[false])],
            &[Combinator::Or, Combinator::And],
        )
        .unwrap()
        .unwrap();
        assert!(!m.value(0));
    }

    #[test]
    fn missing_combinator_defaults_to_and() {
        let m = fold_masks(&[mask(&[true, true]), mask(&[true, false])], &[])
            .unwrap()
            .unwrap();
        assert_eq!(m, mask(&[true, false]));
    }

    #[test]
    fn surplus_combinators_are_ignored() {
        let m = fold_masks(&[mask(&[false, true])], &[Combinator::Or]).unwrap().unwrap();
        assert_eq!(m, mask(&[false, true]));
    }

    #[test]
    fn combine_preserves_row_order() {
        let t = table();
        let out = combine(&t, &[mask(&[true, false, true, true])], &[]).unwrap();
        assert_eq!(ages(&out), [Value::Number(10.0), Value::Number(40.0), Value::Null]);
        assert_eq!(out.column_names(), t.column_names());
    }

    #[test]
    fn three_filter_chain() {
        let mut chain = FilterChain::new();
        chain
            .push(Combinator::And, RawFilter::new("age", "greater_than", Some("20")))
            .push(Combinator::Or, RawFilter::new("name", "starts_with", Some("A")))
            .push(Combinator::And, RawFilter::new("age", "is_not_null", None));
        assert_eq!(chain.combinators, [Combinator::Or, Combinator::And]);
        let outcome = chain.apply(&table()).unwrap();
        assert_eq!(outcome.applied(), 3);
        assert_eq!(
            ages(&outcome.table),
            [Value::Number(10.0), Value::Number(25.0), Value::Number(40.0)]
        );
    }

    #[test]
    fn failed_filter_drops_preceding_combinator() {
        assert_eq!(
            reassociate(&[true, false, true], &[Combinator::And, Combinator::Or]),
            [Combinator::Or]
        );
        // first filter failing drops the slot after it
        assert_eq!(
            reassociate(&[false, true, true], &[Combinator::Or, Combinator::And]),
            [Combinator::And]
        );
        // last filter failing drops the slot before it
        assert_eq!(
            reassociate(&[true, true, false], &[Combinator::Or, Combinator::And]),
            [Combinator::Or]
        );
        assert!(reassociate(&[false, true, false], &[Combinator::Or, Combinator::And]).is_empty());
    }

    #[test]
    fn reassociation_through_apply() {
        // age > 20 AND <bad> OR name starts with "C"  =>  age > 20 OR name starts with "C"
        let chain = FilterChain {
            filters: vec![
                RawFilter::new("age", "gt", Some("20")),
                RawFilter::new("age", "gt", Some("abc")),
                RawFilter::new("name", "starts_with", Some("c")),
            ],
            combinators: vec![Combinator::And, Combinator::Or],
        };
        let outcome = chain.apply(&table()).unwrap();
        let failures: Vec<_> = outcome.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 1);
        assert!(matches!(failures[0].1, FilterError::InvalidValue { .. }));
        assert_eq!(
            ages(&outcome.table),
            [Value::Number(25.0), Value::Number(40.0), Value::Null]
        );
    }

    #[test]
    fn every_filter_failing_is_identity() {
        let chain = FilterChain {
            filters: vec![
                RawFilter::new("height", "gt", Some("1")),
                RawFilter::new("age", "between", Some("1")),
                RawFilter::new("name", "gt", Some("1")),
            ],
            combinators: vec![Combinator::And, Combinator::And],
        };
        let outcome = chain.apply(&table()).unwrap();
        assert_eq!(outcome.applied(), 0);
        assert_eq!(outcome.table.num_rows(), 4);
        assert!(matches!(outcome.errors[0], Some(FilterError::UnknownColumn { .. })));
        assert!(matches!(outcome.errors[1], Some(FilterError::UnknownCriterion { .. })));
        assert!(matches!(outcome.errors[2], Some(FilterError::CriterionTypeMismatch { .. })));
    }

    #[test]
    fn combinator_parsing() {
        assert_eq!("and".parse::<Combinator>().unwrap(), Combinator::And);
        assert_eq!(" OR ".parse::<Combinator>().unwrap(), Combinator::Or);
        assert_eq!("||".parse::<Combinator>().unwrap(), Combinator::Or);
        assert!("xor".parse::<Combinator>().is_err());
    }

    #[test]
    fn chain_from_json_and_toml() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("chain.json");
        std::fs::write(
            &json,
            r#"{"filters":[{"column":"age","criterion":"gt","value":"20"},{"column":"age","criterion":"is_null"}],"combinators":["OR"]}"#,
        )
        .unwrap();
        let chain = FilterChain::from_path(&json).unwrap();
        assert_eq!(chain.filters[1].value, None);
        assert_eq!(chain.combinators, [Combinator::Or]);

        let toml_path = dir.path().join("chain.toml");
        std::fs::write(
            &toml_path,
            "combinators = [\"AND\"]\n\n[[filters]]\ncolumn = \"name\"\ncriterion = \"contains\"\nvalue = \"o\"\n\n[[filters]]\ncolumn = \"age\"\ncriterion = \"lt\"\nvalue = \"30\"\n",
        )
        .unwrap();
        let chain = FilterChain::from_path(&toml_path).unwrap();
        assert_eq!(chain.filters.len(), 2);
        let outcome = chain.apply(&table()).unwrap();
        assert_eq!(ages(&outcome.table), [Value::Number(25.0)]);

        let yaml = dir.path().join("chain.yaml");
        std::fs::write(&yaml, "").unwrap();
        assert!(matches!(FilterChain::from_path(&yaml), Err(SieveError::Unsupported(_))));
    }
}
