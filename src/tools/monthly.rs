//! Monthly progress tools.

use super::{get_string, make_tool, require_string, respond};
use crate::source::FallbackSource;
use crate::timefmt::month_id;
use anyhow::Result;
use chrono::Utc;
use rmcp::model::Tool;
use serde_json::{Value, json};

pub fn get_tools() -> Vec<Tool> {
    vec![
        make_tool(
            "monthly_progress",
            "Stored skill levels for a month, plus the list of months that have snapshots.",
            json!({
                "month": { "type": "string", "description": "YYYY-MM (default: current month)" }
            }),
            vec![],
        ),
        make_tool(
            "skill_trend",
            "Monthly levels of one skill over recent months, classified as improving, declining or stable.",
            json!({
                "skill": { "type": "string" }
            }),
            vec!["skill"],
        ),
        make_tool(
            "calculate_snapshot",
            "Compute and store every skill's level for a month from its commits. Re-running overwrites the month.",
            json!({
                "month": { "type": "string", "description": "YYYY-MM (default: current month)" }
            }),
            vec![],
        ),
    ]
}

fn month_arg(args: &Value) -> String {
    get_string(args, "month")
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| month_id(&Utc::now()))
}

pub fn monthly_progress(source: &FallbackSource, args: Value) -> Result<Value> {
    let month = month_arg(&args);
    let sourced = source.run("monthly_progress", |s| {
        Ok((s.get_monthly_progress(&month)?, s.list_months()?))
    })?;
    let (levels, months) = sourced.data;
    Ok(json!({
        "data": { "month": month, "levels": levels, "months": months },
        "is_demo": sourced.is_demo
    }))
}

pub fn skill_trend(source: &FallbackSource, args: Value) -> Result<Value> {
    let skill = require_string(&args, "skill")?;
    respond(source.run("skill_trend", |s| s.get_skill_improvement_trend(&skill))?)
}

pub fn calculate_snapshot(source: &FallbackSource, args: Value) -> Result<Value> {
    let month = month_arg(&args);
    respond(source.run("calculate_snapshot", |s| s.calculate_monthly_snapshot(&month))?)
}
