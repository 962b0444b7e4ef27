// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod aggregate;
mod clean;
mod derive;
mod join;
mod logging;
mod manifest;
mod sink;
mod source;

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use entrova_etl_model::{Entity, SchemaError, Table};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "entrova-etl-job";

pub use aggregate::{cumulative_sum, group_by, Reduce};
pub use clean::{clean_spec_for, clean_table, CleanRule, CleanSpec};
pub use derive::{days_since, weighted_score};
pub use join::left_join;
pub use logging::{rows_field, RunEvent, RunLog, RunStage, Severity};
pub use manifest::{build_summary, write_run_manifest, OutputStat, RunSummary};
pub use sink::{csv_bytes, AnalyticsSink, Sink, WriteMode};
pub use source::{Source, SqliteSource};

/// Flat-file destination, relative to the run's output directory.
pub const FULL_DATA_CSV: &str = "full_data.csv";
pub const RUN_MANIFEST_JSON: &str = "run_manifest.json";
pub const TABLE_CUMULATIVE_SIGNUPS: &str = "cumulative_signups";
pub const TABLE_DEMO_ATTENDANCE: &str = "demo_attendance_summary";
pub const TABLE_ENGAGEMENT_SUMMARY: &str = "engagement_summary";

#[derive(Debug)]
pub enum EtlError {
    Source(String),
    Validation(String),
    Sink(String),
}

impl EtlError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::Validation(_) => "validation",
            Self::Sink(_) => "sink",
        }
    }
}

impl Display for EtlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(msg) => write!(f, "source error: {msg}"),
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::Sink(msg) => write!(f, "sink error: {msg}"),
        }
    }
}

impl std::error::Error for EtlError {}

impl From<SchemaError> for EtlError {
    fn from(err: SchemaError) -> Self {
        Self::Validation(err.0)
    }
}

/// Weights of the engagement composite, fixed per run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositeWeights {
    pub logins: f64,
    pub messages: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            logins: 0.4,
            messages: 0.6,
        }
    }
}

/// Configuration owned by one run. No module-level connection or engine
/// state anywhere: everything a run needs arrives here.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub source_db: PathBuf,
    pub output_dir: PathBuf,
    pub analytics_db: PathBuf,
    pub reference_date: NaiveDate,
    pub weights: CompositeWeights,
    pub log_destination: Option<PathBuf>,
}

/// The tables a run publishes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutputs {
    pub full_data: Table,
    pub cumulative_signups: Table,
    pub demo_attendance: Table,
    pub engagement_summary: Table,
}

/// Production entry point: SQLite source, CSV + analytics-database sinks.
pub fn run_job(opts: &JobOptions) -> Result<RunSummary, EtlError> {
    run_job_with_events(opts).0
}

/// Same as [`run_job`], returning the collected run events alongside the
/// result. A failed run's events end with exactly one terminal error line;
/// the rendered log is appended to `log_destination` when configured.
pub fn run_job_with_events(opts: &JobOptions) -> (Result<RunSummary, EtlError>, Vec<RunEvent>) {
    let mut log = RunLog::default();
    log.info(RunStage::Prepare, "run.start", Default::default());

    let result = run_with_production_adapters(opts, &mut log);
    if let Err(err) = &result {
        log.error(log.last_stage(), err.to_string());
    }

    let mut result = result;
    if let Some(path) = &opts.log_destination {
        if let Err(err) = log.append_to(path) {
            let flush = EtlError::Sink(format!("append run log {}: {err}", path.display()));
            // A run that only failed to persist its log still failed.
            if result.is_ok() {
                result = Err(flush);
            }
        }
    }

    (result, log.events().to_vec())
}

fn run_with_production_adapters(
    opts: &JobOptions,
    log: &mut RunLog,
) -> Result<RunSummary, EtlError> {
    let source = SqliteSource::open(&opts.source_db)?;
    fs::create_dir_all(&opts.output_dir)
        .map_err(|e| EtlError::Sink(format!("create {}: {e}", opts.output_dir.display())))?;
    let mut sink = AnalyticsSink::open(&opts.analytics_db)?;
    execute(opts, &source, &mut sink, log)
}

/// Full pipeline against explicit adapters. Transforms run to completion
/// before the first sink call; a failure anywhere aborts with nothing
/// written.
pub fn execute<S: Source, K: Sink>(
    opts: &JobOptions,
    source: &S,
    sink: &mut K,
    log: &mut RunLog,
) -> Result<RunSummary, EtlError> {
    let outputs = run_transforms(opts, source, log)?;

    log.info(
        RunStage::Load,
        "load.begin",
        rows_field("full_data_rows", outputs.full_data.row_count()),
    );
    let csv_destination = opts.output_dir.join(FULL_DATA_CSV).display().to_string();
    sink.write(&outputs.full_data, &csv_destination, WriteMode::Overwrite)?;
    for (name, table) in [
        (TABLE_CUMULATIVE_SIGNUPS, &outputs.cumulative_signups),
        (TABLE_DEMO_ATTENDANCE, &outputs.demo_attendance),
        (TABLE_ENGAGEMENT_SUMMARY, &outputs.engagement_summary),
    ] {
        sink.write(table, name, WriteMode::Overwrite)?;
        log.info(RunStage::Load, format!("load.{name}"), rows_field("rows", table.row_count()));
    }
    sink.commit()?;

    let summary = build_summary(opts.reference_date, opts.weights, &outputs)?;
    write_run_manifest(&opts.output_dir.join(RUN_MANIFEST_JSON), &summary)?;
    log.info(
        RunStage::Finalize,
        "run.complete",
        rows_field("outputs", summary.outputs.len()),
    );
    Ok(summary)
}

/// Extract → Clean → Join → Derive → Aggregate, threading tables explicitly
/// from stage to stage. Intermediate tables live only inside this call.
pub fn run_transforms<S: Source>(
    opts: &JobOptions,
    source: &S,
    log: &mut RunLog,
) -> Result<RunOutputs, EtlError> {
    let mut cleaned: Vec<Table> = Vec::with_capacity(Entity::ALL.len());
    for entity in Entity::ALL {
        log.info(
            RunStage::Extract,
            format!("extract.{}", entity.table_name()),
            Default::default(),
        );
        let raw = source.fetch(entity)?;
        log.info(
            RunStage::Clean,
            format!("clean.{}", entity.table_name()),
            rows_field("rows", raw.row_count()),
        );
        cleaned.push(clean_table(&raw, &clean_spec_for(entity))?);
    }
    let [users, employers, demo_sessions, engagement]: [Table; 4] = cleaned
        .try_into()
        .map_err(|_| EtlError::Validation("expected four cleaned extracts".to_string()))?;

    // Base entity first, then activity tables, then organizational
    // attributes; every step is a key-preserving left join.
    log.info(
        RunStage::Join,
        "join.users.engagement",
        rows_field("left_rows", users.row_count()),
    );
    let joined = left_join(&users, &engagement, "user_id")?;
    log.info(
        RunStage::Join,
        "join.demo_sessions",
        rows_field("left_rows", joined.row_count()),
    );
    let joined = left_join(&joined, &demo_sessions, "user_id")?;
    log.info(
        RunStage::Join,
        "join.employers",
        rows_field("left_rows", joined.row_count()),
    );
    let joined = left_join(&joined, &employers, "employer_id")?;

    log.info(
        RunStage::Derive,
        "derive.features",
        rows_field("rows", joined.row_count()),
    );
    let derived = days_since(
        &joined,
        "signup_date",
        opts.reference_date,
        "days_since_signup",
    )?;
    let full_data = weighted_score(
        &derived,
        &[
            ("logins_last_30_days", opts.weights.logins),
            ("messages_sent", opts.weights.messages),
        ],
        "engagement_score",
    )?;

    log.info(
        RunStage::Aggregate,
        "aggregate.summaries",
        rows_field("rows", full_data.row_count()),
    );
    let signups_by_day = group_by(
        &users,
        "signup_date",
        &[Reduce::CountDistinct {
            column: "user_id".to_string(),
            output: "signups".to_string(),
        }],
    )?;
    let cumulative_signups = cumulative_sum(
        &signups_by_day,
        "signup_date",
        "signups",
        "cumulative_signups",
    )?;

    let demo_attendance = group_by(
        &demo_sessions,
        "session_date",
        &[Reduce::Sum {
            column: "attended_demo".to_string(),
            output: "total_attended_demo".to_string(),
        }],
    )?;

    let engagement_summary = group_by(
        &full_data,
        "signup_date",
        &[
            Reduce::CountDistinct {
                column: "user_id".to_string(),
                output: "users".to_string(),
            },
            Reduce::Sum {
                column: "active_user".to_string(),
                output: "active_users_sum".to_string(),
            },
            Reduce::Sum {
                column: "engagement_score".to_string(),
                output: "engagement_score_sum".to_string(),
            },
        ],
    )?;

    Ok(RunOutputs {
        full_data,
        cumulative_signups,
        demo_attendance,
        engagement_summary,
    })
}
