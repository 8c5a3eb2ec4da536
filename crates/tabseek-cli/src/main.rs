//! tabseek CLI: load tabular files and search across them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tabseek_core::config::EngineConfig;
use tabseek_core::progress::NoProgress;
use tabseek_core::types::Table;
use tabseek_exec::{progress_channel, Engine, SearchResult};

#[derive(Parser)]
#[command(name = "tabseek")]
#[command(about = "Substring search across CSV, spreadsheet, JSON, and SQLite files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every table of the given files for a term
    Search {
        /// Case-insensitive substring to look for
        #[arg(short, long)]
        term: String,

        /// Files to load
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Maximum rows returned per table (overrides config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Worker pool size (overrides config; still capped)
        #[arg(long)]
        max_workers: Option<usize>,

        /// Per-table timeout in milliseconds (overrides config)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the tables, column types, and column statistics of a file
    Inspect {
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Search {
            term,
            files,
            limit,
            max_workers,
            timeout_ms,
            json,
        } => run_search(&term, &files, limit, max_workers, timeout_ms, json),
        Commands::Inspect { file, json } => run_inspect(&file, json),
    };
    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_search(
    term: &str,
    files: &[PathBuf],
    limit: Option<usize>,
    max_workers: Option<usize>,
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::from_env();
    if let Some(n) = max_workers {
        config.max_workers = n;
    }
    if let Some(ms) = timeout_ms {
        config.task_timeout_ms = ms;
    }
    let limit = limit.unwrap_or(config.result_limit);
    let engine = Engine::new(config)?;

    for file in files {
        match engine.load(file.as_path(), &NoProgress) {
            Ok(source) => {
                if let Some(partial) = source.partial_failure() {
                    eprintln!("warning: {}: {}", source.identifier(), partial);
                }
            }
            Err(e) => eprintln!("warning: skipping {}: {}", file.display(), e),
        }
    }

    let stats = engine.stats();
    tracing::debug!(sources = stats.sources, tables = stats.tables, "sources loaded");

    let (tx, mut rx) = progress_channel();
    let pending = engine.spawn_search_global(term, limit, Arc::new(tx));
    while let Some(event) = rx.blocking_recv() {
        if !json {
            eprintln!("[{:>3}%] {}", event.percent, event.message);
        }
    }
    let result = pending.wait()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &SearchResult) {
    println!(
        "{} matches for {:?} in {} tables across {} sources ({} ms)",
        result.total_matches,
        result.term,
        result.tables_searched,
        result.sources_searched,
        result.elapsed_ms
    );
    for m in &result.matches {
        println!();
        let truncated = result
            .summary_for(&m.source, &m.table)
            .is_some_and(|s| s.truncated);
        println!(
            "== {} / {} ({} rows{})",
            m.source,
            m.table,
            m.rows.row_count(),
            if truncated { ", truncated" } else { "" }
        );
        print_table(&m.rows);
    }
    for e in &result.errors {
        eprintln!("error: {} / {}: {}", e.source, e.table, e.error);
    }
}

fn print_table(table: &Table) {
    let header: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
    println!("{}", header.join("\t"));
    for row in 0..table.row_count() {
        let cells: Vec<String> = table.row(row).iter().map(|v| v.to_string()).collect();
        println!("{}", cells.join("\t"));
    }
}

fn run_inspect(file: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::new(EngineConfig::from_env())?;
    let source = engine.load(file, &NoProgress)?;

    let mut report = Vec::new();
    for info in source.table_infos() {
        let stats = engine.table_stats(source.identifier(), &info.name)?;
        report.push((info, stats));
    }

    if json {
        let doc = serde_json::json!({
            "source": source.identifier(),
            "kind": source.kind(),
            "tables": report
                .iter()
                .map(|(info, stats)| serde_json::json!({ "info": info, "columns": stats }))
                .collect::<Vec<_>>(),
            "failures": source
                .failures()
                .iter()
                .map(|f| format!("{}: {}", f.table, f.reason))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{} ({})", source.identifier(), source.kind());
    for (info, stats) in &report {
        println!();
        println!("{}: {} rows", info.name, info.row_count);
        for s in stats {
            let mut line = format!(
                "  {:<24} {:<12} nulls={} unique={}",
                s.name, s.data_type.to_string(), s.null_count, s.unique_count
            );
            if let Some(n) = &s.numeric {
                line.push_str(&format!(" min={} max={} mean={:.3}", n.min, n.max, n.mean));
            }
            if let Some((lo, hi)) = &s.datetime_range {
                line.push_str(&format!(" from={lo} to={hi}"));
            }
            if !s.top_values.is_empty() {
                let top: Vec<String> = s.top_values.iter().map(|(v, c)| format!("{v}({c})")).collect();
                line.push_str(&format!(" top=[{}]", top.join(", ")));
            }
            println!("{line}");
        }
    }
    if let Some(partial) = source.partial_failure() {
        eprintln!("warning: {}", partial);
    }
    Ok(())
}
