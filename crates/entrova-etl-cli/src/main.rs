#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use entrova_etl_core::ExitCode;
use entrova_etl_job::{run_job_with_events, CompositeWeights, EtlError, JobOptions};
use rusqlite::Connection;

#[derive(Parser)]
#[command(name = "entrova-etl")]
#[command(about = "Entrova analytics ETL operations CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one full pipeline run.
    Run {
        #[arg(long)]
        source_db: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
        #[arg(long)]
        analytics_db: PathBuf,
        /// Anchor for the days-since-signup derivation (YYYY-MM-DD). A fixed
        /// date, not invocation time, so reruns reproduce prior outputs.
        #[arg(long)]
        reference_date: NaiveDate,
        #[arg(long, default_value_t = 0.4)]
        login_weight: f64,
        #[arg(long, default_value_t = 0.6)]
        message_weight: f64,
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Summarize an analytics database: tables, row counts, sample rows.
    InspectDb {
        #[arg(long)]
        db: PathBuf,
        #[arg(long, default_value_t = 5)]
        sample_rows: usize,
    },
}

fn main() -> ProcessExitCode {
    match run() {
        Ok(()) => ProcessExitCode::from(ExitCode::Success as u8),
        Err(err) => {
            eprintln!("{err}");
            let code = match &err {
                EtlError::Validation(_) => ExitCode::Validation,
                EtlError::Source(_) | EtlError::Sink(_) => ExitCode::DependencyFailure,
            };
            ProcessExitCode::from(code as u8)
        }
    }
}

fn run() -> Result<(), EtlError> {
    match Cli::parse().command {
        Commands::Run {
            source_db,
            output_dir,
            analytics_db,
            reference_date,
            login_weight,
            message_weight,
            log_file,
        } => run_pipeline(JobOptions {
            source_db,
            output_dir,
            analytics_db,
            reference_date,
            weights: CompositeWeights {
                logins: login_weight,
                messages: message_weight,
            },
            log_destination: log_file,
        }),
        Commands::InspectDb { db, sample_rows } => inspect_db(db, sample_rows),
    }
}

fn run_pipeline(opts: JobOptions) -> Result<(), EtlError> {
    let (result, events) = run_job_with_events(&opts);
    let summary = result?;

    println!("run status: {}", summary.status);
    println!(
        "full data csv: {}",
        opts.output_dir.join(entrova_etl_job::FULL_DATA_CSV).display()
    );
    println!(
        "run manifest: {}",
        opts.output_dir
            .join(entrova_etl_job::RUN_MANIFEST_JSON)
            .display()
    );
    for (destination, stat) in &summary.outputs {
        println!("output {destination}: {} rows", stat.rows);
    }
    println!("run events: {}", events.len());
    Ok(())
}

fn inspect_db(db: PathBuf, sample_rows: usize) -> Result<(), EtlError> {
    let conn = Connection::open(&db)
        .map_err(|e| EtlError::Source(format!("open {}: {e}", db.display())))?;

    let schema_version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| EtlError::Source(e.to_string()))?;
    println!("schema_version={schema_version}");

    let mut table_stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .map_err(|e| EtlError::Source(e.to_string()))?;
    let tables = table_stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| EtlError::Source(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EtlError::Source(e.to_string()))?;
    println!(
        "tables={}",
        serde_json::to_string(&tables).map_err(|e| EtlError::Source(e.to_string()))?
    );

    for table in &tables {
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .map_err(|e| EtlError::Source(e.to_string()))?;
        println!("{table}_rows={count}");

        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {table} LIMIT {sample_rows}"))
            .map_err(|e| EtlError::Source(e.to_string()))?;
        let column_count = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                let mut cells = Vec::with_capacity(column_count);
                for index in 0..column_count {
                    let cell = match row.get_ref(index)? {
                        rusqlite::types::ValueRef::Null => String::new(),
                        rusqlite::types::ValueRef::Integer(v) => v.to_string(),
                        rusqlite::types::ValueRef::Real(v) => v.to_string(),
                        rusqlite::types::ValueRef::Text(t) => {
                            String::from_utf8_lossy(t).into_owned()
                        }
                        rusqlite::types::ValueRef::Blob(_) => "<blob>".to_string(),
                    };
                    cells.push(cell);
                }
                Ok(cells)
            })
            .map_err(|e| EtlError::Source(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EtlError::Source(e.to_string()))?;
        println!(
            "{table}_sample={}",
            serde_json::to_string(&rows).map_err(|e| EtlError::Source(e.to_string()))?
        );
    }
    Ok(())
}
