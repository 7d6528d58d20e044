//! Dependency and impact tools.

use super::{get_i64, get_now, get_string, make_tool, require_path, require_string, respond};
use crate::error::ToolError;
use crate::source::FallbackSource;
use anyhow::Result;
use rmcp::model::Tool;
use serde_json::{Value, json};

/// Largest accepted file_impact window, about a century.
const MAX_WINDOW_DAYS: i64 = 36_525;

pub fn get_tools() -> Vec<Tool> {
    vec![
        make_tool(
            "link_dependency",
            "Record that task_id depends on depends_on_id. Linking the same pair twice is a no-op. Links that would close a cycle are rejected unless dependencies.reject_cycles is off.",
            json!({
                "task_id": { "type": "string", "description": "The dependent task" },
                "depends_on_id": { "type": "string", "description": "The task it waits for" }
            }),
            vec!["task_id", "depends_on_id"],
        ),
        make_tool(
            "unlink_dependency",
            "Remove a dependency link.",
            json!({
                "task_id": { "type": "string" },
                "depends_on_id": { "type": "string" }
            }),
            vec!["task_id", "depends_on_id"],
        ),
        make_tool(
            "blocked_tasks",
            "Incomplete tasks transitively waiting on a task. Without task_id, every incomplete task with an incomplete dependency.",
            json!({
                "task_id": { "type": "string" }
            }),
            vec![],
        ),
        make_tool(
            "critical_path",
            "Tasks ranked by how many tasks they transitively block.",
            json!({
                "limit": { "type": "integer", "description": "Maximum rows (default from config)" }
            }),
            vec![],
        ),
        make_tool(
            "file_impact",
            "Files that transitively import a file, recent commits touching it and the tasks those commits implement.",
            json!({
                "file": { "type": "string", "description": "File path, optionally percent-encoded" },
                "window_days": { "type": "integer", "description": "Recent-commit window in days, 0 to 36525 (default from config)" },
                "now": { "type": "string", "description": "End of the window (default: now)" }
            }),
            vec!["file"],
        ),
        make_tool(
            "add_import",
            "Record that one file imports another.",
            json!({
                "file": { "type": "string", "description": "Importing file" },
                "imports": { "type": "string", "description": "Imported file" }
            }),
            vec!["file", "imports"],
        ),
    ]
}

pub fn link_dependency(source: &FallbackSource, args: Value) -> Result<Value> {
    let task_id = require_string(&args, "task_id")?;
    let depends_on_id = require_string(&args, "depends_on_id")?;
    respond(source.run("link_dependency", |s| {
        s.add_task_dependency(&task_id, &depends_on_id)
    })?)
}

pub fn unlink_dependency(source: &FallbackSource, args: Value) -> Result<Value> {
    let task_id = require_string(&args, "task_id")?;
    let depends_on_id = require_string(&args, "depends_on_id")?;
    let sourced = source.run("unlink_dependency", |s| {
        s.remove_task_dependency(&task_id, &depends_on_id)
    })?;
    Ok(json!({
        "data": {
            "task_id": task_id,
            "depends_on_id": depends_on_id,
            "removed": sourced.data
        },
        "is_demo": sourced.is_demo
    }))
}

pub fn blocked_tasks(source: &FallbackSource, args: Value) -> Result<Value> {
    let task_id = get_string(&args, "task_id").filter(|id| !id.trim().is_empty());
    respond(source.run("blocked_tasks", |s| s.get_blocked_tasks(task_id.as_deref()))?)
}

pub fn critical_path(source: &FallbackSource, args: Value) -> Result<Value> {
    let limit = match get_i64(&args, "limit") {
        Some(n) if n < 1 => {
            return Err(ToolError::invalid_value("limit", "limit must be at least 1").into());
        }
        Some(n) => Some(n as usize),
        None => None,
    };
    respond(source.run("critical_path", |s| s.get_critical_path(limit))?)
}

pub fn file_impact(source: &FallbackSource, args: Value) -> Result<Value> {
    let file = require_path(&args, "file")?;
    let window_days = match get_i64(&args, "window_days") {
        Some(n) if !(0..=MAX_WINDOW_DAYS).contains(&n) => {
            return Err(ToolError::invalid_value(
                "window_days",
                &format!("window_days must be between 0 and {}", MAX_WINDOW_DAYS),
            )
            .into());
        }
        other => other,
    };
    let now = get_now(&args)?;
    respond(source.run("file_impact", |s| s.get_file_impact(&file, window_days, now))?)
}

pub fn add_import(source: &FallbackSource, args: Value) -> Result<Value> {
    let file = require_path(&args, "file")?;
    let imports = require_path(&args, "imports")?;
    let sourced = source.run("add_import", |s| s.add_file_import(&file, &imports))?;
    Ok(json!({
        "data": { "file": file, "imports": imports, "created": sourced.data },
        "is_demo": sourced.is_demo
    }))
}
