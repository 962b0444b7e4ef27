// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use entrova_etl_core::{canonical, sha256_hex};
use serde::{Deserialize, Serialize};

use crate::sink::csv_bytes;
use crate::{CompositeWeights, EtlError, RunOutputs};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputStat {
    pub rows: u64,
    pub sha256: String,
}

/// What a completed run produced. Deliberately excludes wall-clock fields:
/// identical sources and configuration must serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSummary {
    pub status: String,
    pub reference_date: NaiveDate,
    pub weights: CompositeWeights,
    pub outputs: BTreeMap<String, OutputStat>,
}

pub fn build_summary(
    reference_date: NaiveDate,
    weights: CompositeWeights,
    outputs: &RunOutputs,
) -> Result<RunSummary, EtlError> {
    let mut stats = BTreeMap::new();
    stats.insert(
        crate::FULL_DATA_CSV.to_string(),
        OutputStat {
            rows: outputs.full_data.row_count() as u64,
            sha256: sha256_hex(&csv_bytes(&outputs.full_data)?),
        },
    );
    for (name, table) in [
        (crate::TABLE_CUMULATIVE_SIGNUPS, &outputs.cumulative_signups),
        (crate::TABLE_DEMO_ATTENDANCE, &outputs.demo_attendance),
        (crate::TABLE_ENGAGEMENT_SUMMARY, &outputs.engagement_summary),
    ] {
        stats.insert(
            name.to_string(),
            OutputStat {
                rows: table.row_count() as u64,
                sha256: canonical::stable_json_hash_hex(table)
                    .map_err(|e| EtlError::Sink(format!("hash {name}: {e}")))?,
            },
        );
    }
    Ok(RunSummary {
        status: "succeeded".to_string(),
        reference_date,
        weights,
        outputs: stats,
    })
}

pub fn write_run_manifest(path: &Path, summary: &RunSummary) -> Result<(), EtlError> {
    let bytes = canonical::stable_json_bytes(summary)
        .map_err(|e| EtlError::Sink(format!("encode run manifest: {e}")))?;
    fs::write(path, bytes).map_err(|e| EtlError::Sink(format!("write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::{build_summary, write_run_manifest, RunSummary};
    use crate::{CompositeWeights, RunOutputs};
    use chrono::NaiveDate;
    use entrova_etl_model::Table;
    use tempfile::tempdir;

    fn empty_outputs() -> RunOutputs {
        RunOutputs {
            full_data: Table::empty(&["user_id"]).expect("empty"),
            cumulative_signups: Table::empty(&["signup_date", "signups", "cumulative_signups"])
                .expect("empty"),
            demo_attendance: Table::empty(&["session_date", "total_attended_demo"])
                .expect("empty"),
            engagement_summary: Table::empty(&["signup_date", "users", "active_users_sum"])
                .expect("empty"),
        }
    }

    #[test]
    fn summary_serializes_to_identical_bytes_for_identical_outputs() {
        let reference = NaiveDate::from_ymd_opt(2025, 3, 15).expect("date");
        let a = build_summary(reference, CompositeWeights::default(), &empty_outputs())
            .expect("summary a");
        let b = build_summary(reference, CompositeWeights::default(), &empty_outputs())
            .expect("summary b");
        assert_eq!(a, b);

        let dir = tempdir().expect("tmp");
        let path_a = dir.path().join("a.json");
        let path_b = dir.path().join("b.json");
        write_run_manifest(&path_a, &a).expect("write a");
        write_run_manifest(&path_b, &b).expect("write b");
        assert_eq!(
            std::fs::read(path_a).expect("bytes a"),
            std::fs::read(path_b).expect("bytes b")
        );
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let reference = NaiveDate::from_ymd_opt(2025, 3, 15).expect("date");
        let summary = build_summary(reference, CompositeWeights::default(), &empty_outputs())
            .expect("summary");
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("run_manifest.json");
        write_run_manifest(&path, &summary).expect("write");

        let raw = std::fs::read_to_string(&path).expect("read");
        let parsed: RunSummary = serde_json::from_str(&raw).expect("parse");
        assert_eq!(parsed, summary);
        assert_eq!(parsed.status, "succeeded");
        assert_eq!(parsed.outputs.len(), 4);
    }
}
