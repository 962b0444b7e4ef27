// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Prepare,
    Extract,
    Clean,
    Join,
    Derive,
    Aggregate,
    Load,
    Finalize,
}

impl RunStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Extract => "extract",
            Self::Clean => "clean",
            Self::Join => "join",
            Self::Derive => "derive",
            Self::Aggregate => "aggregate",
            Self::Load => "load",
            Self::Finalize => "finalize",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunEvent {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub stage: RunStage,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl RunEvent {
    /// One log line: `<RFC3339 UTC> <SEVERITY> [<stage>] <message> k=v ...`
    #[must_use]
    pub fn render_line(&self) -> String {
        let mut line = format!(
            "{} {} [{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.severity.as_str(),
            self.stage.as_str(),
            self.message
        );
        for (key, value) in &self.fields {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunLog {
    events: Vec<RunEvent>,
}

impl RunLog {
    pub fn info(
        &mut self,
        stage: RunStage,
        message: impl Into<String>,
        fields: BTreeMap<String, String>,
    ) {
        self.emit(Severity::Info, stage, message, fields);
    }

    pub fn error(&mut self, stage: RunStage, message: impl Into<String>) {
        self.emit(Severity::Error, stage, message, BTreeMap::new());
    }

    fn emit(
        &mut self,
        severity: Severity,
        stage: RunStage,
        message: impl Into<String>,
        fields: BTreeMap<String, String>,
    ) {
        self.events.push(RunEvent {
            timestamp: Utc::now(),
            severity,
            stage,
            message: message.into(),
            fields,
        });
    }

    #[must_use]
    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    /// Stage of the most recent event; failure events are attributed to the
    /// stage that was running when the pipeline stopped.
    #[must_use]
    pub fn last_stage(&self) -> RunStage {
        self.events
            .last()
            .map_or(RunStage::Prepare, |event| event.stage)
    }

    pub fn append_to(&self, path: &Path) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for event in &self.events {
            writeln!(file, "{}", event.render_line())?;
        }
        Ok(())
    }
}

/// Field map for the common "how many rows" case.
#[must_use]
pub fn rows_field(label: &str, count: usize) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert(label.to_string(), count.to_string());
    fields
}
