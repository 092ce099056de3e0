mod report;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use sheet_sieve_common::Config;
use sheet_sieve_core::{
    export_table, list_sheets, load_file, ColumnKind, Combinator, Criterion, ExportFormat,
    ExportOptions, FilterChain, LoadOptions, RawFilter,
};

/// Parse `column:criterion[:value]`; the value keeps any further colons.
fn parse_where(s: &str) -> Result<RawFilter, String> {
    let mut parts = s.splitn(3, ':');
    let column = parts.next().unwrap_or("").trim();
    let criterion = parts.next().unwrap_or("").trim();
    if column.is_empty() || criterion.is_empty() {
        return Err(format!("expected column:criterion[:value], got '{s}'"));
    }
    Ok(RawFilter::new(column, criterion, parts.next()))
}

#[derive(Parser)]
#[command(name = "sheet-sieve", version, about = "Filter spreadsheet rows with AND/OR predicate chains")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets { path: PathBuf },
    /// Show columns, inferred kinds and applicable criteria
    Schema {
        path: PathBuf,
        #[arg(long)] sheet: Option<String>,
    },
    /// List criteria by column kind
    Criteria,
    /// Apply a filter chain, preview the result and optionally export it
    Filter {
        path: PathBuf,
        #[arg(long)] sheet: Option<String>,
        /// Filter as column:criterion[:value]; repeat for a chain
        #[arg(short = 'w', long = "where", value_parser = parse_where)]
        filters: Vec<RawFilter>,
        /// AND / OR between consecutive filters, in order
        #[arg(short = 'j', long = "join")]
        joins: Vec<Combinator>,
        /// Read the chain from a .json or .toml file instead
        #[arg(long, conflicts_with_all = ["filters", "joins"])]
        chain: Option<PathBuf>,
        #[arg(short, long)] output: Option<PathBuf>,
        /// Export to the configured default output path
        #[arg(long)] save: bool,
        #[arg(long)] format: Option<String>,
        #[arg(long)] limit: Option<usize>,
    },
    /// Print the config path and contents
    Config {
        /// Write the current (or default) config to disk
        #[arg(long)] init: bool,
    },
    /// Generate shell completions
    Completions { shell: clap_complete::Shell },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("ignoring config: {e}");
        Config::default()
    });
    match cli.command {
        Commands::Sheets { path } => run_sheets(&path)?,
        Commands::Schema { path, sheet } => run_schema(&path, sheet, &config)?,
        Commands::Criteria => run_criteria(),
        Commands::Filter { path, sheet, filters, joins, chain, output, save, format, limit } => {
            let chain = match chain {
                Some(p) => FilterChain::from_path(&p)
                    .with_context(|| format!("reading chain file {}", p.display()))?,
                None => FilterChain { filters, combinators: joins },
            };
            let target = export_target(output, save, format.as_deref(), &config)?;
            run_filter(&path, sheet, &chain, target, limit, &config)?
        }
        Commands::Config { init } => run_config(init, &config)?,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "sheet-sieve", &mut std::io::stdout());
        }
    }
    Ok(())
}

fn load(path: &Path, sheet: Option<String>, config: &Config) -> anyhow::Result<sheet_sieve_core::Table> {
    let opts = LoadOptions::from_config(&config.load).with_sheet(sheet);
    load_file(path, &opts).with_context(|| format!("loading {}", path.display()))
}

fn run_sheets(path: &Path) -> anyhow::Result<()> {
    for name in list_sheets(path).with_context(|| format!("reading {}", path.display()))? {
        println!("{name}");
    }
    Ok(())
}

fn run_schema(path: &Path, sheet: Option<String>, config: &Config) -> anyhow::Result<()> {
    let table = load(path, sheet, config)?;
    report::print_schema(&table);
    Ok(())
}

fn run_criteria() {
    for kind in [ColumnKind::Numeric, ColumnKind::Text] {
        println!("{kind}:");
        for c in Criterion::for_kind(kind) {
            let value = if c.needs_value() { "value" } else { "-" };
            println!("  {:<14} {:<18} {}", c.name(), c.label(), value);
        }
    }
}

/// Where and how to export, if at all. `--format` wins over the output
/// extension, which wins over the configured format. `--save` names the file
/// after the resolved format.
fn export_target(
    output: Option<PathBuf>,
    save: bool,
    format: Option<&str>,
    config: &Config,
) -> anyhow::Result<Option<(PathBuf, ExportFormat)>> {
    let explicit = format.map(str::parse::<ExportFormat>).transpose()?;
    match output {
        Some(path) => {
            let format = match explicit.or_else(|| ExportFormat::from_path(&path)) {
                Some(f) => f,
                None => config.export.format.parse::<ExportFormat>()?,
            };
            Ok(Some((path, format)))
        }
        None if save => {
            let format = match explicit {
                Some(f) => f,
                None => config.export.format.parse::<ExportFormat>()?,
            };
            let path = config.export.default_output_path().with_extension(format.extension());
            Ok(Some((path, format)))
        }
        None => Ok(None),
    }
}

fn run_filter(
    path: &Path,
    sheet: Option<String>,
    chain: &FilterChain,
    target: Option<(PathBuf, ExportFormat)>,
    limit: Option<usize>,
    config: &Config,
) -> anyhow::Result<()> {
    let table = load(path, sheet, config)?;
    if chain.combinators.len() + 1 < chain.filters.len() {
        eprintln!("note: fewer joins than filters; missing joins default to AND");
    }
    let outcome = chain.apply(&table)?;
    report::print_outcome(&table, chain, &outcome);
    report::print_preview(&outcome.table, limit.unwrap_or(config.display.max_rows_preview))?;

    let Some((out_path, format)) = target else {
        return Ok(());
    };
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let opts = ExportOptions { sheet_name: config.export.sheet_name.clone() };
    export_table(&outcome.table, &out_path, format, &opts)
        .with_context(|| format!("exporting to {}", out_path.display()))?;
    println!("Exported {} records to {}", outcome.table.num_rows(), out_path.display());
    Ok(())
}

fn run_config(init: bool, config: &Config) -> anyhow::Result<()> {
    let path = Config::config_path();
    if init {
        config.save()?;
        println!("Wrote {}", path.display());
    } else {
        println!("# {}", path.display());
    }
    println!("{:<20} {}", "max_rows_preview:", config.display.max_rows_preview);
    println!("{:<20} {}", "null_markers:", config.load.null_markers.join(" | "));
    println!("{:<20} {}", "default_sheet:", config.load.default_sheet.as_deref().unwrap_or("(first)"));
    println!("{:<20} {}", "export:", config.export.default_output_path().display());
    println!("{:<20} {}", "export sheet:", config.export.sheet_name);
    Ok(())
}
