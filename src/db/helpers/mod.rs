use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{RunStatus, SwipeOutcome};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} is out of range: {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_run_status(value: &str) -> Result<RunStatus> {
    match value {
        "Running" => Ok(RunStatus::Running),
        "Completed" => Ok(RunStatus::Completed),
        "Stopped" => Ok(RunStatus::Stopped),
        "Failed" => Ok(RunStatus::Failed),
        "Interrupted" => Ok(RunStatus::Interrupted),
        other => Err(anyhow!("unknown run status {other}")),
    }
}

pub fn parse_optional_outcome(value: Option<String>) -> Result<Option<SwipeOutcome>> {
    match value.as_deref() {
        None => Ok(None),
        Some("Like") => Ok(Some(SwipeOutcome::Like)),
        Some("Pass") => Ok(Some(SwipeOutcome::Pass)),
        Some(other) => Err(anyhow!("unknown swipe outcome {other}")),
    }
}
