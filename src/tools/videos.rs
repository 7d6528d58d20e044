//! Briefing video records.

use super::{get_i64, get_string, make_tool, require_string, respond};
use crate::source::FallbackSource;
use crate::types::NewVideo;
use anyhow::Result;
use rmcp::model::Tool;
use serde_json::{Value, json};

pub fn get_tools() -> Vec<Tool> {
    vec![
        make_tool(
            "list_videos",
            "Saved briefing videos, newest first.",
            json!({
                "limit": { "type": "integer" }
            }),
            vec![],
        ),
        make_tool(
            "save_video",
            "Save a briefing video record with the analysis and script it was generated from.",
            json!({
                "id": { "type": "string", "description": "Video ID (generated when omitted)" },
                "url": { "type": "string" },
                "date": { "type": "string", "description": "ISO-8601 instant" },
                "analysis": { "type": "object" },
                "script": { "type": "string" }
            }),
            vec!["url", "date"],
        ),
    ]
}

pub fn list_videos(source: &FallbackSource, args: Value) -> Result<Value> {
    let limit = get_i64(&args, "limit");
    respond(source.run("list_videos", |s| s.list_videos(limit))?)
}

pub fn save_video(source: &FallbackSource, args: Value) -> Result<Value> {
    let input = NewVideo {
        id: get_string(&args, "id"),
        url: require_string(&args, "url")?,
        date: require_string(&args, "date")?,
        analysis: args.get("analysis").cloned().unwrap_or(Value::Null),
        script: get_string(&args, "script").unwrap_or_default(),
    };
    respond(source.run("save_video", |s| s.save_video(input.clone()))?)
}
