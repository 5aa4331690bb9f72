//! CLI entrypoint for the miostream equivalence harness.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miostream_harness::structured_log::{self, LogEmitter, LogEntry, LogLevel, Outcome};
use miostream_harness::{CaseResult, FixtureSet, Generator, RunReport, TestRunner};

/// File-versus-memory equivalence tooling for miostream.
#[derive(Debug, Parser)]
#[command(name = "miostream-harness")]
#[command(about = "Checks that file and memory streams behave alike")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate random scripts and run them.
    Run {
        /// Generator seed (decimal or 0x...).
        #[arg(long, default_value = "0x5EED")]
        seed: String,
        /// Number of scripts.
        #[arg(long, default_value_t = 64)]
        cases: usize,
        /// Operations per script.
        #[arg(long, default_value_t = 200)]
        ops: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run fixture scripts from a JSON file or a directory of them.
    Verify {
        /// Fixture JSON file or directory.
        #[arg(long)]
        fixture: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Write random scripts as a fixture file.
    Generate {
        /// Generator seed (decimal or 0x...).
        #[arg(long, default_value = "0x5EED")]
        seed: String,
        #[arg(long, default_value_t = 16)]
        cases: usize,
        #[arg(long, default_value_t = 100)]
        ops: usize,
        /// Output path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a structured JSONL log.
    ValidateLog {
        /// JSONL log path.
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Debug, clap::Args)]
struct OutputArgs {
    /// Directory for temporary stream files.
    #[arg(long)]
    workdir: Option<PathBuf>,
    /// Structured JSONL log path (if omitted, logs go to stderr).
    #[arg(long)]
    log: Option<PathBuf>,
    /// Markdown report path; a JSON twin is written next to it.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Optional fixed timestamp for deterministic reports.
    #[arg(long)]
    timestamp: Option<String>,
}

fn parse_seed(raw: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let cleaned = raw.replace('_', "");
    let seed = match cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16)?,
        None => cleaned.parse()?,
    };
    Ok(seed)
}

fn open_log(path: Option<&Path>, run_id: &str) -> std::io::Result<LogEmitter<Box<dyn Write>>> {
    let writer: Box<dyn Write> = match path {
        Some(path) => Box::new(std::io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(std::io::stderr()),
    };
    Ok(LogEmitter::new(writer, run_id))
}

fn execute(
    sets: &[FixtureSet],
    seed: Option<u64>,
    output: OutputArgs,
    run_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let workdir = output.workdir.unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&workdir)?;
    let mut log = open_log(output.log.as_deref(), run_id)?;
    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "run_start").with_details(serde_json::json!({
            "sets": sets.len(),
            "seed": seed,
            "workdir": workdir.display().to_string(),
        })),
    )?;

    let runner = TestRunner::new(run_id, workdir);
    let mut results: Vec<CaseResult> = Vec::new();
    for set in sets {
        results.extend(runner.run(set, &mut log)?);
    }

    let report = RunReport::from_results(
        "miostream Equivalence Report",
        output.timestamp.unwrap_or_else(structured_log::now_utc),
        seed,
        results,
    );
    let outcome = if report.all_passed() {
        Outcome::Pass
    } else {
        Outcome::Fail
    };
    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "run_done")
            .with_outcome(outcome)
            .with_details(serde_json::json!({
                "total": report.total,
                "passed": report.passed,
                "failed": report.failed,
                "deviations": report.deviations,
            })),
    )?;
    log.flush()?;

    eprintln!(
        "Run complete: total={}, passed={}, failed={}, deviations={}",
        report.total, report.passed, report.failed, report.deviations
    );

    if let Some(report_path) = output.report {
        std::fs::write(&report_path, report.to_markdown())?;
        std::fs::write(report_path.with_extension("json"), report.to_json())?;
        eprintln!("Wrote report to {}", report_path.display());
    }

    if !report.all_passed() {
        return Err("file and memory streams diverged".into());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            seed,
            cases,
            ops,
            output,
        } => {
            let seed = parse_seed(&seed)?;
            eprintln!("Generating {cases} scripts of {ops} operations from seed {seed}");
            let set = Generator::fixture_set(seed, cases, ops);
            execute(&[set], Some(seed), output, &format!("run-{seed}"))?;
        }
        Command::Verify { fixture, output } => {
            eprintln!("Verifying fixtures in {}", fixture.display());
            let sets = if fixture.is_dir() {
                FixtureSet::from_dir(&fixture)?
            } else {
                vec![FixtureSet::from_file(&fixture)?]
            };
            if sets.is_empty() {
                return Err(format!("No fixture JSON files found in {}", fixture.display()).into());
            }
            let seed = sets.iter().find_map(|set| set.seed);
            execute(&sets, seed, output, "verify")?;
        }
        Command::Generate {
            seed,
            cases,
            ops,
            output,
        } => {
            let seed = parse_seed(&seed)?;
            let json = Generator::fixture_set(seed, cases, ops).to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("Wrote {cases} scripts to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::ValidateLog { input } => {
            let (lines, errors) = structured_log::validate_log_file(&input)?;
            for err in &errors {
                eprintln!("{err}");
            }
            eprintln!("Checked {lines} log lines: {} errors", errors.len());
            if !errors.is_empty() {
                return Err("structured log validation failed".into());
            }
        }
    }

    Ok(())
}
