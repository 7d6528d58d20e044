//! MCP tool implementations.

pub mod commits;
pub mod context;
pub mod deps;
pub mod monthly;
pub mod skills;
pub mod tasks;
pub mod videos;

pub use context::ToolContext;

use crate::error::ToolError;
use crate::source::{FallbackSource, Sourced};
use crate::timefmt::parse_instant;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rmcp::model::Tool;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Tool handler that processes MCP tool calls.
pub struct ToolHandler {
    pub source: Arc<FallbackSource>,
}

impl ToolHandler {
    pub fn new(source: Arc<FallbackSource>) -> Self {
        Self { source }
    }

    /// Get all available tools.
    pub fn get_tools(&self) -> Vec<Tool> {
        let mut tools = Vec::new();
        tools.extend(tasks::get_tools());
        tools.extend(deps::get_tools());
        tools.extend(commits::get_tools());
        tools.extend(skills::get_tools());
        tools.extend(monthly::get_tools());
        tools.extend(videos::get_tools());
        tools
    }

    /// Call a tool by name.
    pub async fn call_tool(&self, name: &str, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let source = self.source.as_ref();
        let result = match name {
            // Task tools
            "list_tasks" => tasks::list_tasks(source, arguments),
            "get_task" => tasks::get_task(source, arguments),
            "create_task" => tasks::create_task(source, arguments),
            "update_task_status" => tasks::update_task_status(source, arguments),
            "delete_task" => tasks::delete_task(source, arguments),
            "record_activity" => tasks::record_activity(source, arguments),
            "stale_tasks" => tasks::stale_tasks(source, arguments),
            "activity_summary" => tasks::activity_summary(source, arguments),
            "mark_stale" => tasks::mark_stale(source, arguments),

            // Dependency and impact tools
            "link_dependency" => deps::link_dependency(source, arguments),
            "unlink_dependency" => deps::unlink_dependency(source, arguments),
            "blocked_tasks" => deps::blocked_tasks(source, arguments),
            "critical_path" => deps::critical_path(source, arguments),
            "file_impact" => deps::file_impact(source, arguments),
            "add_import" => deps::add_import(source, arguments),

            // Commit tools
            "store_commit" => commits::store_commit(source, arguments),
            "link_commits" => commits::link_commits(source, arguments),
            "link_commit" => commits::link_commit(source, arguments),

            // Skill tools
            "skill_summary" => skills::skill_summary(source, arguments),
            "skill_levels" => skills::skill_levels(source, arguments),
            "knowledge_gaps" => skills::knowledge_gaps(source, arguments),
            "skill_path" => skills::skill_path(source, arguments),
            "add_prerequisite" => skills::add_prerequisite(source, arguments),
            "add_resource" => skills::add_resource(source, arguments),

            // Monthly tools
            "monthly_progress" => monthly::monthly_progress(source, arguments),
            "skill_trend" => monthly::skill_trend(source, arguments),
            "calculate_snapshot" => monthly::calculate_snapshot(source, arguments),

            // Video tools
            "list_videos" => videos::list_videos(source, arguments),
            "save_video" => videos::save_video(source, arguments),

            _ => Err(ToolError::unknown_tool(name).into()),
        };

        if let Ok(value) = &result
            && value.get("is_demo").and_then(Value::as_bool) == Some(true)
        {
            ctx.logger.warning("Store unavailable, response served from demo data");
        }
        result
    }
}

/// Helper to create a tool with JSON schema.
pub fn make_tool(name: &str, description: &str, properties: Value, required: Vec<&str>) -> Tool {
    let input_schema = rmcp::model::JsonObject::from_iter([
        ("type".to_string(), serde_json::json!("object")),
        ("properties".to_string(), properties),
        ("required".to_string(), serde_json::json!(required)),
    ]);

    Tool::new(name.to_string(), description.to_string(), input_schema)
}

/// Serialize a sourced result as the tool response.
pub fn respond<T: Serialize>(sourced: Sourced<T>) -> Result<Value> {
    Ok(serde_json::to_value(sourced)?)
}

/// Helper to get a string from arguments.
pub fn get_string(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str().map(String::from))
}

/// A non-blank string argument.
pub fn require_string(args: &Value, key: &str) -> Result<String> {
    get_string(args, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::missing_field(key).into())
}

/// A file path argument. Clients may send it percent-encoded.
pub fn get_path(args: &Value, key: &str) -> Option<String> {
    get_string(args, key).map(|raw| match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    })
}

pub fn require_path(args: &Value, key: &str) -> Result<String> {
    get_path(args, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::missing_field(key).into())
}

/// Helper to get an i64 from arguments.
pub fn get_i64(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(|v| v.as_i64())
}

/// Helper to get a string array from arguments.
pub fn get_string_array(args: &Value, key: &str) -> Option<Vec<String>> {
    args.get(key).and_then(|v| {
        v.as_array().map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
    })
}

/// The optional `now` argument, defaulting to the current instant.
pub fn get_now(args: &Value) -> Result<DateTime<Utc>> {
    match get_string(args, "now") {
        None => Ok(Utc::now()),
        Some(raw) => parse_instant(&raw).ok_or_else(|| {
            ToolError::invalid_value("now", &format!("Unrecognized instant: {}", raw)).into()
        }),
    }
}
