use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use fragplan_core::assembler::PlanAssembler;
use fragplan_core::catalog::Catalog;
use fragplan_core::config::planner::PlannerConfig;
use fragplan_core::explain::node::ExplainNode;
use fragplan_core::partitioning::{PartitioningForStatement, PartitioningValue};
use fragplan_core::plan::compiled::CompiledPlan;
use fragplan_core::statement::ParsedStatement;
use fragplan_core::subplan::access_path::AccessPathProvider;
use fragplan_error::{DbError, Result, ResultExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

#[derive(Parser)]
#[clap(name = "fragplan")]
struct Arguments {
    /// Path to the catalog JSON file.
    #[clap(long)]
    catalog: PathBuf,
    /// Path to the parsed statement JSON file.
    #[clap(long)]
    statement: PathBuf,
    /// Plan the statement as declared to run on a single partition.
    #[clap(long)]
    single_partition: bool,
    /// Planner configuration JSON file.
    #[clap(long)]
    config: Option<PathBuf>,
    /// Override a planner setting, may be repeated.
    #[clap(long = "set", value_name = "NAME=VALUE")]
    settings: Vec<String>,
    /// Include output schemas in explain output.
    #[clap(short, long)]
    verbose: bool,
    /// Print plans as JSON.
    #[clap(long)]
    json: bool,
    /// Log level, overridden by RUST_LOG.
    #[clap(long, default_value = "error")]
    log_level: tracing::Level,
}

/// Print every candidate plan for a statement.
fn main() {
    let args = Arguments::parse();
    logutil::configure_global_logger(
        args.log_level,
        logutil::LogFormat::HumanReadable,
        io::stderr,
    );

    // Outer result for the panic, inner is the planning result.
    let result = std::panic::catch_unwind(|| inner(&args));

    match result {
        Ok(Err(err)) => {
            println!("ERROR: {err}");
            std::process::exit(1);
        }
        Err(err) => {
            println!("PANIC: {err:?}");
            std::process::exit(2);
        }
        Ok(Ok(())) => (),
    }
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    plan: usize,
    content_deterministic: bool,
    order_deterministic: bool,
    partitioning_key: Option<PartitioningValue>,
    fragments: Vec<ExplainNode>,
}

fn inner(args: &Arguments) -> Result<()> {
    let catalog: Catalog = read_json(&args.catalog)?;
    let statement: ParsedStatement = read_json(&args.statement)?;

    let mut config = match &args.config {
        Some(path) => read_json(path)?,
        None => PlannerConfig::default(),
    };
    for setting in &args.settings {
        let (name, value) = setting.split_once('=').ok_or_else(|| {
            DbError::new("Expected setting in the form NAME=VALUE").with_field("setting", setting)
        })?;
        config.set_from_str(name.trim(), value.trim())?;
    }
    debug!(?config, "planner config");

    let mut assembler = PlanAssembler::new(&catalog, &AccessPathProvider, config);
    assembler.setup_for_new_plans(statement, PartitioningForStatement::new(args.single_partition))?;

    let plans = assembler.plans().collect::<Result<Vec<_>>>()?;

    let mut stdout = BufWriter::new(io::stdout());
    if args.json {
        let output: Vec<_> = plans
            .iter()
            .enumerate()
            .map(|(idx, plan)| PlanOutput {
                plan: idx + 1,
                content_deterministic: plan.content_deterministic,
                order_deterministic: plan.order_deterministic,
                partitioning_key: plan.partitioning_key.clone(),
                fragments: plan.explain(args.verbose),
            })
            .collect();
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize plans")?;
        writeln!(stdout, "{json}")?;
        stdout.flush()?;
        // Keep stdout parseable.
        eprintln!("{} candidate plan(s)", plans.len());
        return Ok(());
    }

    for (idx, plan) in plans.iter().enumerate() {
        write_plan(&mut stdout, idx + 1, plan, args.verbose)?;
    }
    writeln!(stdout, "{} candidate plan(s)", plans.len())?;
    stdout.flush()?;

    Ok(())
}

fn write_plan(out: &mut impl Write, num: usize, plan: &CompiledPlan, verbose: bool) -> Result<()> {
    writeln!(out, "-- Plan {num} --")?;
    if let Some(key) = &plan.partitioning_key {
        writeln!(out, "partitioning key: {key}")?;
    }
    let fragments = plan.fragments();
    for (idx, (fragment, explain)) in fragments.iter().zip(plan.explain(verbose)).enumerate() {
        if fragment.multi_partition {
            writeln!(out, "Fragment {idx} (multi partition):")?;
        } else {
            writeln!(out, "Fragment {idx}:")?;
        }
        write!(out, "{}", explain.format_text())?;
    }
    writeln!(out)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .context_fn(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).context_fn(|| format!("Failed to parse {}", path.display()))
}
