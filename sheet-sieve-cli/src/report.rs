use arrow::util::pretty::pretty_format_batches;
use sheet_sieve_core::{ChainOutcome, Criterion, FilterChain, Table};

pub fn print_schema(table: &Table) {
    println!("{:<16} {}", "Records:", table.num_rows());
    println!("{:<16} {}", "Columns:", table.num_columns());
    println!();
    println!("{:<24} {:<8} {:>6}  criteria", "column", "kind", "nulls");
    for (name, kind) in table.columns() {
        let criteria: Vec<&str> = Criterion::for_kind(kind).iter().map(|c| c.name()).collect();
        println!(
            "{:<24} {:<8} {:>6}  {}",
            name,
            kind.to_string(),
            table.null_count(name).unwrap_or(0),
            criteria.join(", ")
        );
    }
}

/// Echo the chain as it will be read: `f1 AND f2 OR f3`.
pub fn describe_chain(chain: &FilterChain) -> String {
    let mut out = String::new();
    for (i, f) in chain.filters.iter().enumerate() {
        if i > 0 {
            let join = chain
                .combinators
                .get(i - 1)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "AND".into());
            out.push_str(&format!(" {join} "));
        }
        out.push_str(&format!("[{} {}", f.column, f.criterion));
        if let Some(v) = &f.value {
            out.push_str(&format!(" {v:?}"));
        }
        out.push(']');
    }
    out
}

pub fn print_outcome(source: &Table, chain: &FilterChain, outcome: &ChainOutcome) {
    println!("{:<16} {}", "Records:", source.num_rows());
    if !chain.is_empty() {
        println!("{:<16} {}", "Chain:", describe_chain(chain));
        println!("{:<16} {}/{}", "Applied:", outcome.applied(), chain.filters.len());
    }
    // skipped filters go to stderr so stdout stays a clean preview
    for (i, err) in outcome.failures() {
        eprintln!("filter {}: {err} (skipped)", i + 1);
    }
    println!("{:<16} {}", "Filtered:", outcome.table.num_rows());
}

pub fn print_preview(table: &Table, limit: usize) -> anyhow::Result<()> {
    if limit == 0 || table.num_columns() == 0 {
        return Ok(());
    }
    let head = table.head(limit);
    println!("{}", pretty_format_batches(&[head.into_batch()])?);
    if table.num_rows() > limit {
        println!("... {} more rows", table.num_rows() - limit);
    }
    Ok(())
}
