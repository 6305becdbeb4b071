//! Run summary record persisted as `summary.json`

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::exit_code::ExitCode;
use crate::platform::E2eExecution;

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
    Timeout,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
            RunStatus::Timeout => "timeout",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the run includes an end-to-end test phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    E2e,
    PlatformOnly,
}

impl RunMode {
    pub fn from_e2e_configured(configured: bool) -> Self {
        if configured {
            RunMode::E2e
        } else {
            RunMode::PlatformOnly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::E2e => "e2e",
            RunMode::PlatformOnly => "platform-only",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal artefact of a run. Built once at finalize and never mutated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    #[serde(serialize_with = "iso_millis")]
    pub start_time: DateTime<Utc>,
    #[serde(serialize_with = "iso_millis")]
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub exit_code: ExitCode,
    pub status: RunStatus,
    pub mode: RunMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e2e_result: Option<E2eExecution>,
}

impl RunSummary {
    pub fn new(
        run_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exit_code: ExitCode,
        status: RunStatus,
        mode: RunMode,
        e2e_result: Option<E2eExecution>,
    ) -> Self {
        let duration_ms = (end_time - start_time).num_milliseconds().max(0) as u64;
        Self {
            run_id: run_id.into(),
            start_time,
            end_time,
            duration_ms,
            exit_code,
            status,
            mode,
            e2e_result,
        }
    }
}

fn iso_millis<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}
