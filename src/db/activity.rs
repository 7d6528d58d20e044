//! Store-facing activity operations: stale listing, summaries, stale
//! marking and heuristic commit linking.

use super::Database;
use super::tasks::query_tasks;
use crate::activity::{classify, hours_inactive, is_stale};
use crate::types::{ActivityState, ActivitySummary, LinkSummary, StaleTask, Task};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;
use std::collections::BTreeMap;
use tracing::info;

impl Database {
    fn open_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "SELECT * FROM tasks WHERE status != 'completed' ORDER BY start_time, id",
                &[],
            )
        })
    }

    /// Tasks stale at `now`, by start time.
    pub fn get_stale_tasks(&self, now: DateTime<Utc>, threshold_hours: f64) -> Result<Vec<StaleTask>> {
        Ok(self
            .open_tasks()?
            .into_iter()
            .filter(|task| is_stale(task, now, threshold_hours))
            .map(|task| StaleTask {
                hours_inactive: hours_inactive(&task, now),
                task,
            })
            .collect())
    }

    /// Task counts per derived activity state.
    pub fn get_activity_summary(
        &self,
        now: DateTime<Utc>,
        threshold_hours: f64,
    ) -> Result<ActivitySummary> {
        let tasks = self.with_conn(|conn| {
            query_tasks(conn, "SELECT * FROM tasks ORDER BY start_time, id", &[])
        })?;

        let mut by_state: BTreeMap<String, usize> = [
            ActivityState::Pending,
            ActivityState::InProgress,
            ActivityState::Completed,
            ActivityState::Stale,
        ]
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();

        let total = tasks.len();
        let mut stale = Vec::new();
        for task in tasks {
            let state = classify(&task, now, threshold_hours);
            *by_state.entry(state.as_str().to_string()).or_default() += 1;
            if state == ActivityState::Stale {
                stale.push(StaleTask {
                    hours_inactive: hours_inactive(&task, now),
                    task,
                });
            }
        }

        Ok(ActivitySummary {
            now,
            threshold_hours,
            total,
            by_state,
            stale,
        })
    }

    /// Persist the stale flag on tasks stale at `now`. Returns how many
    /// tasks were newly flagged.
    pub fn mark_stale_tasks(&self, now: DateTime<Utc>, threshold_hours: f64) -> Result<usize> {
        let stale: Vec<String> = self
            .get_stale_tasks(now, threshold_hours)?
            .into_iter()
            .filter(|s| s.task.is_stale != Some(true))
            .map(|s| s.task.id)
            .collect();

        let flagged = self.transaction(|tx| {
            let mut flagged = 0;
            for id in &stale {
                flagged += tx.execute(
                    "UPDATE tasks SET is_stale = 1, updated_at = ?1 WHERE id = ?2",
                    params![now.timestamp_millis(), id],
                )?;
            }
            Ok(flagged)
        })?;

        if flagged > 0 {
            info!(flagged, "Stale tasks marked");
        }
        Ok(flagged)
    }

    /// Link commits to tasks that require a skill the commit demonstrates,
    /// when the commit falls inside the task's planned window.
    ///
    /// Idempotent. Linked tasks get `last_activity` advanced to their newest
    /// implementing commit.
    pub fn link_commits_to_tasks(&self) -> Result<LinkSummary> {
        let summary = self.transaction(|tx| {
            let created = tx.execute(
                "INSERT OR IGNORE INTO commit_tasks (commit_hash, task_id)
                 SELECT DISTINCT c.hash, t.id
                 FROM commits c
                 INNER JOIN commit_skills cs ON cs.commit_hash = c.hash
                 INNER JOIN task_skills ts ON ts.skill = cs.skill
                 INNER JOIN tasks t ON t.id = ts.task_id
                 WHERE c.timestamp >= t.start_time AND c.timestamp <= t.end_time",
                [],
            )?;

            tx.execute(
                "WITH latest AS (
                     SELECT ct.task_id, MAX(c.timestamp) AS at
                     FROM commit_tasks ct
                     INNER JOIN commits c ON c.hash = ct.commit_hash
                     GROUP BY ct.task_id
                 )
                 UPDATE tasks SET
                     last_activity = (SELECT at FROM latest WHERE latest.task_id = tasks.id),
                     is_stale = NULL
                 WHERE id IN (
                     SELECT l.task_id FROM latest l
                     INNER JOIN tasks t2 ON t2.id = l.task_id
                     WHERE t2.last_activity IS NULL OR t2.last_activity < l.at
                 )",
                [],
            )?;

            let total: i64 =
                tx.query_row("SELECT COUNT(*) FROM commit_tasks", [], |row| row.get(0))?;
            Ok(LinkSummary {
                created,
                total: total as usize,
            })
        })?;

        info!(created = summary.created, total = summary.total, "Commits linked to tasks");
        Ok(summary)
    }
}
