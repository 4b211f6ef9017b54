//! CLI entrypoint for the ministdio conformance harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ministdio_harness::report::RunSummary;
use ministdio_harness::{all_checks, run_all, run_named};

/// Conformance tooling for ministdio.
#[derive(Debug, Parser)]
#[command(name = "ministdio-harness")]
#[command(about = "Live-descriptor conformance checks for ministdio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run conformance checks and emit one JSONL record per check.
    Run {
        /// Run a single named check (see `list`).
        #[arg(long)]
        check: Option<String>,
        /// Write JSONL records to this path instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List available checks.
    List,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { check, out } => {
            let records = match check {
                Some(name) => {
                    let record = run_named(&name)
                        .ok_or_else(|| format!("Unknown check '{name}', see `list`"))?;
                    vec![record]
                }
                None => run_all(),
            };

            let mut body = String::new();
            for record in &records {
                body.push_str(&record.to_jsonl()?);
                body.push('\n');
            }
            match out {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, body)?;
                    eprintln!("Wrote {} record(s) to {}", records.len(), path.display());
                }
                None => print!("{body}"),
            }

            let summary = RunSummary::from_records(&records);
            eprintln!(
                "Checks complete: total={}, passed={}, failed={}, skipped={}",
                summary.total, summary.passed, summary.failed, summary.skipped
            );
            if !summary.all_passed() {
                return Err("conformance checks failed".into());
            }
        }
        Command::List => {
            for check in all_checks() {
                println!("{:<34} {}", check.name, check.property);
            }
        }
    }

    Ok(())
}
