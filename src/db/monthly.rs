//! Monthly skill snapshots and trends.

use super::{Database, now_ms};
use crate::classifier::normalize_skill;
use crate::error::ToolError;
use crate::levels::{classify_trend, level_from_commits};
use crate::timefmt::month_window;
use crate::types::{MonthlySkillLevel, SkillTrend, TrendDirection};
use anyhow::Result;
use rusqlite::params;
use serde_json::json;
use tracing::info;

/// Months considered by trend queries when not configured.
pub const DEFAULT_TREND_MONTHS: usize = 12;

const LEVEL_COLUMNS: &str =
    "month_id AS month, skill, level, commits, tasks_completed";

impl Database {
    /// Compute and store one level per skill for a `YYYY-MM` month.
    ///
    /// Re-running for the same month overwrites the previous values.
    pub fn calculate_monthly_snapshot(&self, month: &str) -> Result<Vec<MonthlySkillLevel>> {
        let month = month.trim();
        let (start, end) = month_window(month).ok_or_else(|| {
            ToolError::invalid_value("month", &format!("expected YYYY-MM, got {}", month))
        })?;
        let (start, end) = (start.timestamp_millis(), end.timestamp_millis());
        let computed_at = now_ms();

        let levels = self.transaction(|tx| {
            let mut stmt = tx.prepare(
                "SELECT s.name,
                    (SELECT COUNT(DISTINCT c.hash)
                     FROM commit_skills cs
                     INNER JOIN commits c ON c.hash = cs.commit_hash
                     WHERE cs.skill = s.name AND c.timestamp >= ?1 AND c.timestamp < ?2)
                        AS commits,
                    (SELECT COUNT(DISTINCT t.id)
                     FROM task_skills ts
                     INNER JOIN tasks t ON t.id = ts.task_id
                     WHERE ts.skill = s.name AND t.status = 'completed'
                       AND t.completed_at >= ?1 AND t.completed_at < ?2)
                        AS tasks_completed
                 FROM skills s
                 ORDER BY s.name",
            )?;
            let levels = stmt
                .query_map(params![start, end], |row| {
                    let commits: i64 = row.get(1)?;
                    Ok(MonthlySkillLevel {
                        month: month.to_string(),
                        skill: row.get(0)?,
                        level: level_from_commits(commits),
                        commits,
                        tasks_completed: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            tx.execute("INSERT OR IGNORE INTO months (id) VALUES (?1)", params![month])?;
            for level in &levels {
                tx.execute(
                    "INSERT INTO month_skill_levels
                        (month_id, skill, level, commits, tasks_completed, computed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(month_id, skill) DO UPDATE SET
                        level = excluded.level,
                        commits = excluded.commits,
                        tasks_completed = excluded.tasks_completed,
                        computed_at = excluded.computed_at",
                    params![
                        month,
                        level.skill,
                        level.level,
                        level.commits,
                        level.tasks_completed,
                        computed_at,
                    ],
                )?;
            }
            Ok(levels)
        })?;

        info!(month, skills = levels.len(), "Monthly snapshot stored");
        Ok(levels)
    }

    /// Recorded levels for a month, highest first.
    pub fn get_monthly_progress(&self, month: &str) -> Result<Vec<MonthlySkillLevel>> {
        let month = month.trim();
        if month_window(month).is_none() {
            return Err(ToolError::invalid_value(
                "month",
                &format!("expected YYYY-MM, got {}", month),
            )
            .into());
        }
        self.query_as(
            &format!(
                "SELECT {} FROM month_skill_levels WHERE month_id = ?1 ORDER BY level DESC, skill",
                LEVEL_COLUMNS
            ),
            &[json!(month)],
        )
    }

    /// Months with a stored snapshot, newest first.
    pub fn list_months(&self) -> Result<Vec<String>> {
        Ok(self
            .execute("SELECT id FROM months ORDER BY id DESC", &[])?
            .into_iter()
            .filter_map(|row| row.get("id").and_then(|v| v.as_str()).map(str::to_string))
            .collect())
    }

    /// Compare the earliest and latest of the `months` most recent levels.
    pub fn get_skill_improvement_trend(&self, skill: &str, months: usize) -> Result<SkillTrend> {
        let skill = normalize_skill(skill).ok_or_else(|| ToolError::missing_field("skill"))?;

        let mut points: Vec<MonthlySkillLevel> = self.query_as(
            &format!(
                "SELECT {} FROM month_skill_levels WHERE skill = ?1
                 ORDER BY month_id DESC LIMIT ?2",
                LEVEL_COLUMNS
            ),
            &[json!(skill), json!(months.max(1))],
        )?;
        points.reverse();

        let first_level = points.first().map(|p| p.level);
        let latest_level = points.last().map(|p| p.level);
        let (trend, change) = match (first_level, latest_level) {
            (Some(first), Some(latest)) if points.len() > 1 => {
                (classify_trend(first, latest), latest as i32 - first as i32)
            }
            _ => (TrendDirection::Stable, 0),
        };

        Ok(SkillTrend {
            skill,
            trend,
            first_level,
            latest_level,
            change,
            points,
        })
    }
}
