//! `planviz` - analyze PostgreSQL EXPLAIN (FORMAT JSON) output from the
//! command line.
//!
//! Reads EXPLAIN JSON from a file or stdin, runs the analyzer, and prints
//! either the full annotated graph as JSON or a per-operator summary table.

use std::fs;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use planviz_analyzer::{
    Analysis, BuildOptions, HeatmapMaxima, HeatmapMode, Severity, analyze_with,
};

#[derive(Debug, Parser)]
#[command(
    name = "planviz",
    version,
    about = "Analyze PostgreSQL EXPLAIN (FORMAT JSON) output"
)]
struct Args {
    /// Path to a file with EXPLAIN JSON. Reads stdin when omitted or "-".
    input: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Table)]
    format: Format,

    /// Metric for the table's heat column.
    #[arg(long, value_enum, default_value_t = Heatmap::None)]
    heatmap: Heatmap,

    /// Abort analysis when the plan has more nodes than this.
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Abort analysis when the plan nests deeper than this.
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Heatmap {
    None,
    Time,
    Rows,
    Cost,
}

impl From<Heatmap> for HeatmapMode {
    fn from(value: Heatmap) -> Self {
        match value {
            Heatmap::None => HeatmapMode::None,
            Heatmap::Time => HeatmapMode::Time,
            Heatmap::Rows => HeatmapMode::Rows,
            Heatmap::Cost => HeatmapMode::Cost,
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    let input = read_input(args.input.as_deref())?;

    let mut options = BuildOptions::default();
    if let Some(max_nodes) = args.max_nodes {
        options.max_nodes = max_nodes;
    }
    if let Some(max_depth) = args.max_depth {
        options.max_depth = max_depth;
    }

    let analysis = analyze_with(&input, &options);
    if let Some(diagnostic) = &analysis.diagnostic {
        eprintln!("{}", diagnostic.message);
        eprintln!("{}", diagnostic.detail);
        return Ok(ExitCode::FAILURE);
    }
    tracing::debug!(nodes = analysis.nodes.len(), "analysis complete");

    match args.format {
        Format::Json => print_json(&analysis)?,
        Format::Table => print_table(&analysis, args.heatmap.into()),
    }
    Ok(ExitCode::SUCCESS)
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("planviz=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn print_json(analysis: &Analysis) -> Result<()> {
    let json = serde_json::to_string_pretty(analysis).context("failed to serialize analysis")?;
    println!("{json}");
    Ok(())
}

fn print_table(analysis: &Analysis, mode: HeatmapMode) {
    let maxima = HeatmapMaxima::compute(&analysis.nodes);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec!["Operation", "Self Time (ms)", "Total Time (ms)", "Rows", "Self Cost"];
    if mode != HeatmapMode::None {
        header.push("Heat");
    }
    header.push("Hints");
    table.set_header(header);

    for node in &analysis.nodes {
        let data = &node.data;

        // The id encodes the depth: one "-" per level below the root.
        let depth = node.id.matches('-').count();
        let mut operation = format!("{}{}", "  ".repeat(depth), data.label);
        if let Some(relation) = &data.relation_name {
            operation.push_str(&format!(" on {relation}"));
        }
        if data.never_executed {
            operation.push_str(" (never executed)");
        }

        let mut row = vec![
            Cell::new(operation),
            Cell::new(format!("{:.3}", data.exclusive.time_ms)),
            Cell::new(format!("{:.3}", data.inclusive.time_ms)),
            Cell::new(format!("{}", data.est_actual_total_rows)),
            Cell::new(format!("{:.2}", data.exclusive.cost)),
        ];
        if mode != HeatmapMode::None {
            let heat = mode
                .intensity(data, &maxima)
                .map(|pct| format!("{pct}%"))
                .unwrap_or_default();
            row.push(Cell::new(heat));
        }
        row.push(Cell::new(hints_summary(data)));
        table.add_row(row);
    }

    println!("{table}");

    if let Some(planning) = analysis.meta.planning_time {
        println!("Planning time:  {planning:.3} ms");
    }
    if let Some(execution) = analysis.meta.execution_time {
        println!("Execution time: {execution:.3} ms");
    }
    if let Some(jit) = analysis.meta.jit_total_time {
        println!("JIT time:       {jit:.3} ms");
    }
    for subplan in &analysis.subplan_roots {
        println!("Subplan: {} (node {})", subplan.name, subplan.id);
    }
}

fn hints_summary(data: &planviz_analyzer::PlanNodeData) -> String {
    let mut parts = Vec::new();
    if let Some(hint) = &data.slow_hint {
        parts.push(format!(
            "slow {} ({:.0}% of time)",
            severity_label(hint.severity),
            hint.self_time_share * 100.0
        ));
    }
    if let Some(hint) = &data.cost_hint {
        parts.push(format!("cost {}", severity_label(hint.severity)));
    }
    if let Some(direction) = data.est_direction {
        if let Some(factor) = data.est_factor {
            if factor >= 10.0 {
                parts.push(format!("rows {direction:?} by {factor:.0}x").to_lowercase());
            }
        }
    }
    parts.join(", ")
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Warn => "warning",
        Severity::Alert => "ALERT",
    }
}
