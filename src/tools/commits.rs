//! Commit ingestion and linking tools.

use super::{get_i64, get_string, get_string_array, make_tool, require_string, respond};
use crate::source::FallbackSource;
use crate::types::NewCommit;
use anyhow::Result;
use rmcp::model::Tool;
use serde_json::{Value, json};

pub fn get_tools() -> Vec<Tool> {
    vec![
        make_tool(
            "store_commit",
            "Store a commit keyed by hash. Re-storing a known hash changes nothing and reports created=false. Touched files and skills inferred from the message and file extensions are merged into the graph.",
            json!({
                "hash": { "type": "string" },
                "message": { "type": "string" },
                "timestamp": { "type": "string", "description": "ISO-8601 instant or epoch millis" },
                "author": { "type": "string" },
                "branch": { "type": "string" },
                "additions": { "type": "integer" },
                "deletions": { "type": "integer" },
                "files": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Touched file paths, optionally percent-encoded"
                }
            }),
            vec!["hash", "message", "timestamp"],
        ),
        make_tool(
            "link_commits",
            "Link every commit to the tasks whose time window contains its timestamp. Safe to re-run.",
            json!({}),
            vec![],
        ),
        make_tool(
            "link_commit",
            "Link one commit to one task explicitly.",
            json!({
                "hash": { "type": "string" },
                "task_id": { "type": "string" }
            }),
            vec!["hash", "task_id"],
        ),
    ]
}

pub fn store_commit(source: &FallbackSource, args: Value) -> Result<Value> {
    let files = get_string_array(&args, "files")
        .unwrap_or_default()
        .into_iter()
        .map(|raw| match urlencoding::decode(&raw) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw,
        })
        .collect();
    let input = NewCommit {
        hash: require_string(&args, "hash")?,
        message: require_string(&args, "message")?,
        timestamp: require_string(&args, "timestamp")?,
        author: get_string(&args, "author").unwrap_or_default(),
        branch: get_string(&args, "branch").unwrap_or_default(),
        additions: get_i64(&args, "additions").unwrap_or(0),
        deletions: get_i64(&args, "deletions").unwrap_or(0),
        files,
    };
    respond(source.run("store_commit", |s| s.store_commit(input.clone()))?)
}

pub fn link_commits(source: &FallbackSource, _args: Value) -> Result<Value> {
    respond(source.run("link_commits", |s| s.link_commits_to_tasks())?)
}

pub fn link_commit(source: &FallbackSource, args: Value) -> Result<Value> {
    let hash = require_string(&args, "hash")?;
    let task_id = require_string(&args, "task_id")?;
    let sourced = source.run("link_commit", |s| s.link_commit_to_task(&hash, &task_id))?;
    Ok(json!({
        "data": { "hash": hash, "task_id": task_id, "created": sourced.data },
        "is_demo": sourced.is_demo
    }))
}
