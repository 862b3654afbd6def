use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_outcome},
};
use crate::models::Decision;

fn decision_from_row(row: &Row<'_>) -> Result<Decision> {
    Ok(Decision {
        id: row.get::<_, String>(0)?,
        run_id: row.get::<_, String>(1)?,
        timestamp: parse_datetime(&row.get::<_, String>(2)?, "timestamp")?,
        best_reference_id: row.get::<_, Option<String>>(3)?,
        similarity: row.get::<_, f64>(4)?,
        outcome: parse_optional_outcome(row.get::<_, Option<String>>(5)?)?,
        swipe_attempted: row.get::<_, bool>(6)?,
        error: row.get::<_, Option<String>>(7)?,
        screenshot_path: row.get::<_, Option<String>>(8)?,
    })
}

const DECISION_COLUMNS: &str = "id, run_id, timestamp, best_reference_id, similarity, \
     outcome, swipe_attempted, error, screenshot_path";

impl Database {
    pub async fn insert_decision(&self, decision: &Decision) -> Result<()> {
        let record = decision.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO decisions (id, run_id, timestamp, best_reference_id, similarity,
                                        outcome, swipe_attempted, error, screenshot_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.run_id,
                    record.timestamp.to_rfc3339(),
                    record.best_reference_id,
                    record.similarity,
                    record.outcome.map(|outcome| outcome.as_str()),
                    record.swipe_attempted,
                    record.error,
                    record.screenshot_path,
                ],
            )
            .with_context(|| "failed to insert decision")?;
            Ok(())
        })
        .await
    }

    pub async fn set_decision_swipe_attempted(
        &self,
        decision_id: &str,
        attempted: bool,
    ) -> Result<()> {
        let decision_id = decision_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE decisions SET swipe_attempted = ?1 WHERE id = ?2",
                params![attempted, decision_id],
            )
            .with_context(|| "failed to update decision swipe flag")?;
            Ok(())
        })
        .await
    }

    pub async fn get_decisions_for_run(&self, run_id: &str) -> Result<Vec<Decision>> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DECISION_COLUMNS} FROM decisions
                 WHERE run_id = ?1
                 ORDER BY timestamp ASC"
            ))?;

            let mut rows = stmt.query(params![run_id])?;
            let mut decisions = Vec::new();
            while let Some(row) = rows.next()? {
                decisions.push(decision_from_row(row)?);
            }

            Ok(decisions)
        })
        .await
    }
}
