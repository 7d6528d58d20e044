//! Task CRUD.

use super::{Database, ensure_skill, get_instant, get_opt_instant, now_ms};
use crate::classifier::{extract_keywords, normalize_skill};
use crate::error::ToolError;
use crate::timefmt::{day_window, parse_instant};
use crate::types::{NewTask, Task, TaskFilter, TaskStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use tracing::{debug, info};
use uuid::Uuid;

/// Row limit when a listing does not ask for one.
pub const DEFAULT_TASK_LIMIT: i64 = 100;

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let status: String = row.get("status")?;
    let keywords_json: Option<String> = row.get("keywords")?;
    let is_stale: Option<i64> = row.get("is_stale")?;

    Ok(Task {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get::<_, Option<String>>("description")?.unwrap_or_default(),
        start_time: get_instant(row, "start_time")?,
        end_time: get_instant(row, "end_time")?,
        status: TaskStatus::from_str(&status).unwrap_or_default(),
        created_at: get_instant(row, "created_at")?,
        updated_at: get_instant(row, "updated_at")?,
        completed_at: get_opt_instant(row, "completed_at")?,
        last_activity: get_opt_instant(row, "last_activity")?,
        is_stale: is_stale.map(|v| v != 0),
        keywords: keywords_json
            .map(|s| serde_json::from_str(&s).unwrap_or_default())
            .unwrap_or_default(),
        skills: Vec::new(),
    })
}

/// Required skills of one task, sorted.
pub(crate) fn task_skills(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT skill FROM task_skills WHERE task_id = ?1 ORDER BY skill")?;
    let skills = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(skills)
}

/// Load a task with its skills.
pub(crate) fn fetch_task(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT * FROM tasks WHERE id = ?1",
            params![task_id],
            parse_task_row,
        )
        .optional()?;
    match task {
        Some(mut task) => {
            task.skills = task_skills(conn, &task.id)?;
            Ok(Some(task))
        }
        None => Ok(None),
    }
}

/// Run a task query and attach skills to every row.
pub(crate) fn query_tasks(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let mut tasks = stmt
        .query_map(params, parse_task_row)?
        .collect::<rusqlite::Result<Vec<Task>>>()?;
    for task in &mut tasks {
        task.skills = task_skills(conn, &task.id)?;
    }
    Ok(tasks)
}

pub(crate) fn task_exists(conn: &Connection, task_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM tasks WHERE id = ?1", params![task_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

fn required_instant(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    if raw.trim().is_empty() {
        return Err(ToolError::missing_field(field).into());
    }
    parse_instant(raw).ok_or_else(|| {
        ToolError::invalid_value(field, &format!("{} is not a valid instant: {}", field, raw))
            .into()
    })
}

impl Database {
    /// Create a task, or update it in place when the id already exists.
    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ToolError::missing_field("name").into());
        }
        let start = required_instant("start_time", &input.start_time)?;
        let end = required_instant("end_time", &input.end_time)?;
        if end <= start {
            return Err(
                ToolError::invalid_value("end_time", "end_time must be after start_time").into(),
            );
        }

        let id = input
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let description = input.description.unwrap_or_default();
        let status = input.status.unwrap_or_default();

        let text = format!("{} {}", name, description);
        let keywords = extract_keywords(&text);
        let mut skills: Vec<String> = input
            .skills
            .iter()
            .filter_map(|s| normalize_skill(s))
            .chain(self.classifier().classify_text(&text))
            .collect();
        skills.sort();
        skills.dedup();

        let now = now_ms();
        let completed_at = (status == TaskStatus::Completed).then(|| end.timestamp_millis());
        let keywords_json = serde_json::to_string(&keywords)?;

        let task = self.transaction(|tx| {
            tx.execute(
                "INSERT INTO tasks (id, name, description, start_time, end_time, status,
                                    keywords, completed_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    start_time = excluded.start_time,
                    end_time = excluded.end_time,
                    status = excluded.status,
                    keywords = excluded.keywords,
                    completed_at = CASE
                        WHEN excluded.status = 'completed'
                        THEN COALESCE(tasks.completed_at, excluded.completed_at)
                        ELSE NULL
                    END,
                    updated_at = excluded.updated_at",
                params![
                    id,
                    name,
                    description,
                    start.timestamp_millis(),
                    end.timestamp_millis(),
                    status.as_str(),
                    keywords_json,
                    completed_at,
                    now,
                ],
            )?;

            tx.execute("DELETE FROM task_skills WHERE task_id = ?1", params![id])?;
            for skill in &skills {
                ensure_skill(tx, skill)?;
                tx.execute(
                    "INSERT OR IGNORE INTO task_skills (task_id, skill) VALUES (?1, ?2)",
                    params![id, skill],
                )?;
            }

            fetch_task(tx, &id)?
                .ok_or_else(|| ToolError::internal(format!("task {} vanished on write", id)).into())
        })?;

        info!(task_id = %task.id, skills = task.skills.len(), "Task stored");
        Ok(task)
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| fetch_task(conn, task_id))
    }

    /// Tasks starting within the given UTC day, by start time.
    pub fn get_tasks_by_date(&self, date: &str) -> Result<Vec<Task>> {
        let (from, to) = day_window(date).ok_or_else(|| {
            ToolError::invalid_value("date", &format!("expected YYYY-MM-DD, got {}", date))
        })?;
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "SELECT * FROM tasks WHERE start_time >= ?1 AND start_time < ?2
                 ORDER BY start_time, id",
                &[&from.timestamp_millis(), &to.timestamp_millis()],
            )
        })
    }

    /// All tasks by start time, at most `limit`.
    pub fn get_all_tasks(&self, limit: i64) -> Result<Vec<Task>> {
        self.list_tasks(&TaskFilter {
            limit: Some(limit),
            ..TaskFilter::default()
        })
    }

    /// Tasks matching a date/status filter, by start time.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(date) = filter.date.as_deref() {
            let (from, to) = day_window(date).ok_or_else(|| {
                ToolError::invalid_value("date", &format!("expected YYYY-MM-DD, got {}", date))
            })?;
            conditions.push("start_time >= ? AND start_time < ?");
            values.push(Box::new(from.timestamp_millis()));
            values.push(Box::new(to.timestamp_millis()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Box::new(status.as_str()));
        }

        let limit = filter.limit.unwrap_or(DEFAULT_TASK_LIMIT).max(1);
        values.push(Box::new(limit));

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT * FROM tasks {} ORDER BY start_time, id LIMIT ?",
            where_clause
        );

        self.with_conn(|conn| {
            let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            query_tasks(conn, &sql, &refs)
        })
    }

    /// Set a task's status. `None` when the task does not exist.
    pub fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<Option<Task>> {
        let now = now_ms();
        self.transaction(|tx| {
            let changed = tx.execute(
                "UPDATE tasks SET
                    status = ?1,
                    updated_at = ?2,
                    completed_at = CASE
                        WHEN ?1 = 'completed' THEN COALESCE(completed_at, ?2)
                        ELSE NULL
                    END
                 WHERE id = ?3",
                params![status.as_str(), now, task_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            debug!(task_id, status = status.as_str(), "Task status updated");
            fetch_task(tx, task_id)
        })
    }

    /// Record activity on a task, clearing any explicit stale flag.
    pub fn record_task_activity(&self, task_id: &str, at: DateTime<Utc>) -> Result<Task> {
        let now = now_ms();
        self.transaction(|tx| {
            let changed = tx.execute(
                "UPDATE tasks SET last_activity = ?1, is_stale = NULL, updated_at = ?2
                 WHERE id = ?3",
                params![at.timestamp_millis(), now, task_id],
            )?;
            if changed == 0 {
                return Err(ToolError::task_not_found(task_id).into());
            }
            fetch_task(tx, task_id)?.ok_or_else(|| ToolError::task_not_found(task_id).into())
        })
    }

    /// Delete a task and every edge touching it. Commits survive.
    pub fn delete_task(&self, task_id: &str) -> Result<bool> {
        let deleted = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?)
        })?;
        if deleted > 0 {
            info!(task_id, "Task deleted");
        }
        Ok(deleted > 0)
    }
}
