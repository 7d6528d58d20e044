//! Skill analysis tools.

use super::{get_i64, get_string, get_string_array, make_tool, require_string, respond};
use crate::error::ToolError;
use crate::source::FallbackSource;
use crate::types::NewResource;
use anyhow::Result;
use rmcp::model::Tool;
use serde_json::{Value, json};

pub fn get_tools() -> Vec<Tool> {
    vec![
        make_tool(
            "skill_summary",
            "Every skill with commit, task and file counts plus its prerequisite edges.",
            json!({}),
            vec![],
        ),
        make_tool(
            "skill_levels",
            "Skill levels derived from the share of required tasks completed, highest first.",
            json!({}),
            vec![],
        ),
        make_tool(
            "knowledge_gaps",
            "Skills required by pending tasks but demonstrated by fewer than threshold commits, with learning resources.",
            json!({
                "threshold": { "type": "integer", "description": "Demonstration threshold (default from config)" }
            }),
            vec![],
        ),
        make_tool(
            "skill_path",
            "Prerequisites of a skill in learning order, deepest first. Unknown skills give an empty path.",
            json!({
                "skill": { "type": "string" }
            }),
            vec!["skill"],
        ),
        make_tool(
            "add_prerequisite",
            "Record that one skill must be learned before another.",
            json!({
                "prerequisite": { "type": "string" },
                "skill": { "type": "string" }
            }),
            vec!["prerequisite", "skill"],
        ),
        make_tool(
            "add_resource",
            "Add a learning resource and the skills it teaches.",
            json!({
                "id": { "type": "string", "description": "Resource ID (generated when omitted)" },
                "title": { "type": "string" },
                "url": { "type": "string" },
                "skills": { "type": "array", "items": { "type": "string" } }
            }),
            vec!["title", "skills"],
        ),
    ]
}

pub fn skill_summary(source: &FallbackSource, _args: Value) -> Result<Value> {
    respond(source.run("skill_summary", |s| s.get_skill_graph())?)
}

pub fn skill_levels(source: &FallbackSource, _args: Value) -> Result<Value> {
    respond(source.run("skill_levels", |s| s.get_skill_levels())?)
}

pub fn knowledge_gaps(source: &FallbackSource, args: Value) -> Result<Value> {
    let threshold = get_i64(&args, "threshold");
    if matches!(threshold, Some(n) if n < 0) {
        return Err(ToolError::invalid_value("threshold", "threshold must not be negative").into());
    }
    respond(source.run("knowledge_gaps", |s| s.find_knowledge_gaps(threshold))?)
}

pub fn skill_path(source: &FallbackSource, args: Value) -> Result<Value> {
    let skill = require_string(&args, "skill")?;
    respond(source.run("skill_path", |s| s.get_skill_path(&skill))?)
}

pub fn add_prerequisite(source: &FallbackSource, args: Value) -> Result<Value> {
    let prerequisite = require_string(&args, "prerequisite")?;
    let skill = require_string(&args, "skill")?;
    let sourced = source.run("add_prerequisite", |s| {
        s.add_skill_prerequisite(&prerequisite, &skill)
    })?;
    Ok(json!({
        "data": { "prerequisite": prerequisite, "skill": skill, "created": sourced.data },
        "is_demo": sourced.is_demo
    }))
}

pub fn add_resource(source: &FallbackSource, args: Value) -> Result<Value> {
    let skills = get_string_array(&args, "skills").unwrap_or_default();
    if skills.is_empty() {
        return Err(ToolError::missing_field("skills").into());
    }
    let input = NewResource {
        id: get_string(&args, "id"),
        title: require_string(&args, "title")?,
        url: get_string(&args, "url"),
        skills,
    };
    respond(source.run("add_resource", |s| s.add_learning_resource(input.clone()))?)
}
