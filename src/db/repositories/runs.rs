use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_datetime, parse_run_status, to_i64, to_u32, to_u64},
};
use crate::ledger::LedgerSummary;
use crate::models::{Run, RunStatus};

fn run_from_row(row: &Row<'_>) -> Result<Run> {
    Ok(Run {
        id: row.get::<_, String>(0)?,
        started_at: parse_datetime(&row.get::<_, String>(1)?, "started_at")?,
        stopped_at: parse_optional_datetime(row.get::<_, Option<String>>(2)?, "stopped_at")?,
        status: parse_run_status(&row.get::<_, String>(3)?)?,
        similarity_threshold: row.get::<_, f64>(4)?,
        delay_between_swipes_ms: to_u64(row.get::<_, i64>(5)?, "delay_between_swipes_ms")?,
        max_swipes: to_u32(row.get::<_, i64>(6)?, "max_swipes")?,
        swipes_performed: to_u32(row.get::<_, i64>(7)?, "swipes_performed")?,
        likes: to_u64(row.get::<_, i64>(8)?, "likes")?,
        passes: to_u64(row.get::<_, i64>(9)?, "passes")?,
        errors: to_u64(row.get::<_, i64>(10)?, "errors")?,
        matches: to_u64(row.get::<_, i64>(11)?, "matches")?,
        fatal_error: row.get::<_, Option<String>>(12)?,
        created_at: parse_datetime(&row.get::<_, String>(13)?, "created_at")?,
        updated_at: parse_datetime(&row.get::<_, String>(14)?, "updated_at")?,
    })
}

const RUN_COLUMNS: &str = "id, started_at, stopped_at, status, similarity_threshold, \
     delay_between_swipes_ms, max_swipes, swipes_performed, likes, passes, errors, \
     matches, fatal_error, created_at, updated_at";

impl Database {
    pub async fn insert_run(&self, run: &Run) -> Result<()> {
        let record = run.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO runs (id, started_at, stopped_at, status, similarity_threshold,
                                   delay_between_swipes_ms, max_swipes, swipes_performed,
                                   likes, passes, errors, matches, fatal_error,
                                   created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    record.id,
                    record.started_at.to_rfc3339(),
                    record.stopped_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    record.similarity_threshold,
                    to_i64(record.delay_between_swipes_ms)?,
                    i64::from(record.max_swipes),
                    i64::from(record.swipes_performed),
                    to_i64(record.likes)?,
                    to_i64(record.passes)?,
                    to_i64(record.errors)?,
                    to_i64(record.matches)?,
                    record.fatal_error,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert run")?;
            Ok(())
        })
        .await
    }

    pub async fn update_run_progress(
        &self,
        run_id: &str,
        summary: &LedgerSummary,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let run_id = run_id.to_string();
        let summary = summary.clone();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE runs
                 SET swipes_performed = ?1,
                     likes = ?2,
                     passes = ?3,
                     errors = ?4,
                     matches = ?5,
                     updated_at = ?6
                 WHERE id = ?7",
                params![
                    i64::from(summary.swipes_performed),
                    to_i64(summary.likes)?,
                    to_i64(summary.passes)?,
                    to_i64(summary.errors)?,
                    to_i64(summary.matches)?,
                    updated_at.to_rfc3339(),
                    run_id,
                ],
            )
            .with_context(|| "failed to update run progress")?;
            Ok(())
        })
        .await
    }

    pub async fn mark_run_status(
        &self,
        run_id: &str,
        status: RunStatus,
        fatal_error: Option<String>,
        stopped_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE runs
                 SET status = ?1,
                     fatal_error = ?2,
                     stopped_at = ?3,
                     updated_at = ?4
                 WHERE id = ?5",
                params![
                    status.as_str(),
                    fatal_error,
                    stopped_at.map(|dt| dt.to_rfc3339()),
                    updated_at.to_rfc3339(),
                    run_id,
                ],
            )
            .with_context(|| "failed to update run status")?;
            Ok(())
        })
        .await
    }

    /// Runs still marked `Running` — only possible after a crash.
    pub async fn get_incomplete_runs(&self) -> Result<Vec<Run>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM runs WHERE status = 'Running' ORDER BY started_at DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut runs = Vec::new();
            while let Some(row) = rows.next()? {
                runs.push(run_from_row(row)?);
            }

            Ok(runs)
        })
        .await
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Option<Run>> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"
            ))?;

            let mut rows = stmt.query(params![run_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(run_from_row(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn list_runs(&self) -> Result<Vec<Run>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM runs ORDER BY started_at DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut runs = Vec::new();
            while let Some(row) = rows.next()? {
                runs.push(run_from_row(row)?);
            }

            Ok(runs)
        })
        .await
    }
}
