use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion};
use entrova_etl_job::{run_job, CompositeWeights, JobOptions};
use rusqlite::{params, Connection};
use std::path::Path;
use tempfile::tempdir;

const USERS: i64 = 2_000;

fn seed_source_db(path: &Path) {
    let mut conn = Connection::open(path).expect("create source db");
    conn.execute_batch(
        "CREATE TABLE users (user_id INTEGER, employer_id INTEGER, signup_date TEXT, country TEXT);
         CREATE TABLE employers (employer_id INTEGER, company_name TEXT, industry TEXT);
         CREATE TABLE demo_sessions (user_id INTEGER, session_date TEXT, attended_demo INTEGER);
         CREATE TABLE engagement (user_id INTEGER, logins_last_30_days INTEGER, messages_sent INTEGER, profile_complete INTEGER);",
    )
    .expect("schema");

    let tx = conn.transaction().expect("tx");
    for employer in 0..40 {
        tx.execute(
            "INSERT INTO employers VALUES (?1, ?2, 'logistics')",
            params![employer, format!("employer-{employer}")],
        )
        .expect("employer row");
    }
    for user in 0..USERS {
        let day = 1 + (user % 28);
        tx.execute(
            "INSERT INTO users VALUES (?1, ?2, ?3, ?4)",
            params![
                user,
                user % 40,
                format!("2025-01-{day:02}"),
                if user % 7 == 0 { None } else { Some("DE") }
            ],
        )
        .expect("user row");
        tx.execute(
            "INSERT INTO engagement VALUES (?1, ?2, ?3, ?4)",
            params![user, user % 9, user % 5, user % 2],
        )
        .expect("engagement row");
        if user % 3 == 0 {
            tx.execute(
                "INSERT INTO demo_sessions VALUES (?1, ?2, ?3)",
                params![user, format!("2025-02-{:02}", 1 + (user % 28)), user % 2],
            )
            .expect("session row");
        }
    }
    tx.commit().expect("commit");
}

fn bench_full_job(c: &mut Criterion) {
    let source = tempdir().expect("source dir");
    let source_db = source.path().join("ops.db");
    seed_source_db(&source_db);

    c.bench_function("full_job_2k_users", |b| {
        b.iter(|| {
            let out = tempdir().expect("out dir");
            let opts = JobOptions {
                source_db: source_db.clone(),
                output_dir: out.path().join("out"),
                analytics_db: out.path().join("analytics.db"),
                reference_date: NaiveDate::from_ymd_opt(2025, 3, 15).expect("date"),
                weights: CompositeWeights::default(),
                log_destination: None,
            };
            run_job(&opts).expect("benchmark run");
        })
    });
}

criterion_group!(benches, bench_full_job);
criterion_main!(benches);
