//! Task and activity tools.

use super::{get_i64, get_now, get_string, get_string_array, make_tool, require_string, respond};
use crate::error::ToolError;
use crate::source::FallbackSource;
use crate::types::{NewTask, TaskFilter, TaskStatus};
use anyhow::Result;
use rmcp::model::Tool;
use serde_json::{Value, json};

pub fn get_tools() -> Vec<Tool> {
    let status_enum = json!(["pending", "in_progress", "completed"]);
    vec![
        make_tool(
            "list_tasks",
            "List tasks, earliest start first. Filter by day (YYYY-MM-DD, matched against the UTC start time) and status.",
            json!({
                "date": { "type": "string", "description": "Day to list (YYYY-MM-DD)" },
                "status": { "type": "string", "enum": status_enum },
                "limit": { "type": "integer", "description": "Maximum rows (default from config)" }
            }),
            vec![],
        ),
        make_tool(
            "get_task",
            "Get a task by id, including its keywords and required skills.",
            json!({
                "task_id": { "type": "string", "description": "Task ID" }
            }),
            vec!["task_id"],
        ),
        make_tool(
            "create_task",
            "Create a task, or replace the task with the same id. Skills are inferred from the name and description and merged with any given explicitly.",
            json!({
                "id": { "type": "string", "description": "Task ID (generated when omitted)" },
                "name": { "type": "string" },
                "description": { "type": "string" },
                "start_time": { "type": "string", "description": "ISO-8601 instant" },
                "end_time": { "type": "string", "description": "ISO-8601 instant, after start_time" },
                "status": { "type": "string", "enum": status_enum },
                "skills": { "type": "array", "items": { "type": "string" } }
            }),
            vec!["name", "start_time", "end_time"],
        ),
        make_tool(
            "update_task_status",
            "Set a task's status. Completing a task records its completion time once.",
            json!({
                "task_id": { "type": "string" },
                "status": { "type": "string", "enum": status_enum }
            }),
            vec!["task_id", "status"],
        ),
        make_tool(
            "delete_task",
            "Delete a task and every edge touching it. Commits are kept.",
            json!({
                "task_id": { "type": "string" }
            }),
            vec!["task_id"],
        ),
        make_tool(
            "record_activity",
            "Record activity on a task: sets last_activity and clears the stale flag.",
            json!({
                "task_id": { "type": "string" },
                "at": { "type": "string", "description": "Activity instant (default: now)" }
            }),
            vec!["task_id"],
        ),
        make_tool(
            "stale_tasks",
            "Open tasks with no activity for longer than the stale threshold, with hours inactive.",
            json!({
                "now": { "type": "string", "description": "Evaluation instant (default: now)" }
            }),
            vec![],
        ),
        make_tool(
            "activity_summary",
            "Count tasks by activity state (pending, in_progress, completed, stale) and list the stale ones.",
            json!({
                "now": { "type": "string", "description": "Evaluation instant (default: now)" }
            }),
            vec![],
        ),
        make_tool(
            "mark_stale",
            "Persist the stale flag on open tasks past the threshold. Returns how many were newly flagged.",
            json!({
                "now": { "type": "string", "description": "Evaluation instant (default: now)" }
            }),
            vec![],
        ),
    ]
}

fn parse_status(args: &Value, key: &str) -> Result<Option<TaskStatus>> {
    match get_string(args, key) {
        None => Ok(None),
        Some(raw) => TaskStatus::from_str(&raw).map(Some).ok_or_else(|| {
            ToolError::invalid_value(key, &format!("Unknown status: {}", raw)).into()
        }),
    }
}

pub fn list_tasks(source: &FallbackSource, args: Value) -> Result<Value> {
    let filter = TaskFilter {
        date: get_string(&args, "date"),
        status: parse_status(&args, "status")?,
        limit: get_i64(&args, "limit"),
    };
    respond(source.run("list_tasks", |s| s.list_tasks(&filter))?)
}

pub fn get_task(source: &FallbackSource, args: Value) -> Result<Value> {
    let task_id = require_string(&args, "task_id")?;
    respond(source.run("get_task", |s| {
        s.get_task(&task_id)?
            .ok_or_else(|| ToolError::task_not_found(&task_id).into())
    })?)
}

pub fn create_task(source: &FallbackSource, args: Value) -> Result<Value> {
    let input = NewTask {
        id: get_string(&args, "id"),
        name: require_string(&args, "name")?,
        description: get_string(&args, "description"),
        start_time: require_string(&args, "start_time")?,
        end_time: require_string(&args, "end_time")?,
        status: parse_status(&args, "status")?,
        skills: get_string_array(&args, "skills").unwrap_or_default(),
    };
    respond(source.run("create_task", |s| s.create_task(input.clone()))?)
}

pub fn update_task_status(source: &FallbackSource, args: Value) -> Result<Value> {
    let task_id = require_string(&args, "task_id")?;
    let status = parse_status(&args, "status")?.ok_or_else(|| ToolError::missing_field("status"))?;
    respond(source.run("update_task_status", |s| {
        s.update_task_status(&task_id, status)?
            .ok_or_else(|| ToolError::task_not_found(&task_id).into())
    })?)
}

pub fn delete_task(source: &FallbackSource, args: Value) -> Result<Value> {
    let task_id = require_string(&args, "task_id")?;
    let sourced = source.run("delete_task", |s| s.delete_task(&task_id))?;
    Ok(json!({
        "data": { "task_id": task_id, "deleted": sourced.data },
        "is_demo": sourced.is_demo
    }))
}

pub fn record_activity(source: &FallbackSource, args: Value) -> Result<Value> {
    let task_id = require_string(&args, "task_id")?;
    let at = match get_string(&args, "at") {
        Some(raw) => crate::timefmt::parse_instant(&raw).ok_or_else(|| {
            ToolError::invalid_value("at", &format!("Unrecognized instant: {}", raw))
        })?,
        None => get_now(&args)?,
    };
    respond(source.run("record_activity", |s| s.record_task_activity(&task_id, at))?)
}

pub fn stale_tasks(source: &FallbackSource, args: Value) -> Result<Value> {
    let now = get_now(&args)?;
    respond(source.run("stale_tasks", |s| s.get_stale_tasks(now))?)
}

pub fn activity_summary(source: &FallbackSource, args: Value) -> Result<Value> {
    let now = get_now(&args)?;
    respond(source.run("activity_summary", |s| s.get_activity_summary(now))?)
}

pub fn mark_stale(source: &FallbackSource, args: Value) -> Result<Value> {
    let now = get_now(&args)?;
    let sourced = source.run("mark_stale", |s| s.mark_stale_tasks(now))?;
    Ok(json!({
        "data": { "marked": sourced.data },
        "is_demo": sourced.is_demo
    }))
}
