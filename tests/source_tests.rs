//! Tests for the data sources and the MCP tool surface.

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use skill_graph_mcp::config::Config;
use skill_graph_mcp::db::Database;
use skill_graph_mcp::error::{ErrorCode, ToolError};
use skill_graph_mcp::logging::Logger;
use skill_graph_mcp::source::{DataSource, DemoSource, FallbackSource, LiveSource};
use skill_graph_mcp::tools::{ToolContext, ToolHandler};
use std::sync::Arc;

fn live_source() -> (Arc<Database>, FallbackSource) {
    let db = Arc::new(Database::open_in_memory().expect("Failed to create in-memory database"));
    let config = Arc::new(Config::default());
    let live: Arc<dyn DataSource> = Arc::new(LiveSource::new(Arc::clone(&db), config));
    (db, FallbackSource::new(live))
}

fn closed_source_with_demo() -> FallbackSource {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.close().unwrap();
    let config = Arc::new(Config::default());
    let live: Arc<dyn DataSource> = Arc::new(LiveSource::new(db, Arc::clone(&config)));
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 16, 0, 0).unwrap();
    let demo: Arc<dyn DataSource> = Arc::new(DemoSource::new(config, now).unwrap());
    FallbackSource::with_demo(live, demo)
}

fn ctx() -> ToolContext {
    ToolContext::new(Logger::new())
}

mod fallback_tests {
    use super::*;

    #[test]
    fn live_results_are_not_demo() {
        let (_db, source) = live_source();
        let tasks = source.run("list", |s| s.get_all_tasks(None)).unwrap();
        assert!(!tasks.is_demo);
        assert!(tasks.data.is_empty());
    }

    #[test]
    fn unavailable_store_serves_demo_data() {
        let source = closed_source_with_demo();
        let tasks = source.run("list", |s| s.get_all_tasks(None)).unwrap();
        assert!(tasks.is_demo);
        assert_eq!(tasks.data.len(), 5);
    }

    #[test]
    fn engine_errors_are_not_masked() {
        let (_db, source) = live_source();
        let err = source
            .run("trend", |s| s.calculate_monthly_snapshot("not-a-month"))
            .unwrap_err();
        let tool_err: ToolError = err.into();
        assert_eq!(tool_err.code, ErrorCode::InvalidFieldValue);
    }

    #[test]
    fn closing_the_store_switches_to_demo() {
        let (db, source) = live_source();
        assert!(!source.run("gaps", |s| s.find_knowledge_gaps(None)).unwrap().is_demo);

        db.close().unwrap();
        let gaps = source.run("gaps", |s| s.find_knowledge_gaps(None)).unwrap();
        assert!(gaps.is_demo);
    }

    #[test]
    fn sqlite_io_failure_serves_demo_data() {
        let (_db, live) = live_source();
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 16, 0, 0).unwrap();
        let demo: Arc<dyn DataSource> =
            Arc::new(DemoSource::new(Arc::new(Config::default()), now).unwrap());
        let source = FallbackSource::with_demo(Arc::clone(live.primary()), demo);

        let tasks = source
            .run("list", |s| {
                if s.is_demo() {
                    s.get_all_tasks(None)
                } else {
                    let io = rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR);
                    Err(rusqlite::Error::SqliteFailure(io, None).into())
                }
            })
            .unwrap();
        assert!(tasks.is_demo);
        assert_eq!(tasks.data.len(), 5);
    }

    #[test]
    fn demo_source_blocked_tasks() {
        let source = closed_source_with_demo();
        let blocked = source
            .run("blocked", |s| s.get_blocked_tasks(Some("demo-dashboard")))
            .unwrap();
        let ids: Vec<&str> = blocked.data.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["demo-tests", "demo-perf"]);
    }
}

mod tool_tests {
    use super::*;

    fn handler() -> ToolHandler {
        let (_db, source) = live_source();
        ToolHandler::new(Arc::new(source))
    }

    async fn call(handler: &ToolHandler, name: &str, args: Value) -> Value {
        handler
            .call_tool(name, args, &ctx())
            .await
            .unwrap_or_else(|e| panic!("{} failed: {}", name, e))
    }

    #[test]
    fn every_tool_has_a_schema() {
        let tools = handler().get_tools();
        assert_eq!(tools.len(), 29);
        let mut names: Vec<String> = tools.iter().map(|t| t.name.to_string()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 29);
    }

    #[tokio::test]
    async fn create_link_and_query_through_tools() {
        let handler = handler();
        call(
            &handler,
            "create_task",
            json!({
                "id": "t1",
                "name": "Checkout flow",
                "start_time": "2024-03-07T09:00:00Z",
                "end_time": "2024-03-07T12:00:00Z",
                "skills": ["testing"]
            }),
        )
        .await;
        let stored = call(
            &handler,
            "store_commit",
            json!({
                "hash": "c1",
                "message": "Add tests for checkout",
                "timestamp": "2024-03-07T10:30:00Z",
                "files": ["src%2Fcheckout.test.ts"]
            }),
        )
        .await;
        assert_eq!(stored["is_demo"], false);
        assert_eq!(stored["data"]["created"], true);
        assert_eq!(stored["data"]["files"], json!(["src/checkout.test.ts"]));
        assert_eq!(stored["data"]["timestamp"], "2024-03-07T10:30:00.000Z");

        let linked = call(&handler, "link_commits", json!({})).await;
        assert_eq!(linked["data"]["created"], 1);

        let task = call(&handler, "get_task", json!({ "task_id": "t1" })).await;
        assert_eq!(task["data"]["last_activity"], "2024-03-07T10:30:00.000Z");

        let stale = call(
            &handler,
            "stale_tasks",
            json!({ "now": "2024-03-07T16:00:00Z" }),
        )
        .await;
        assert_eq!(stale["data"][0]["hours_inactive"], 5);
    }

    #[tokio::test]
    async fn task_listing_matches_tool_descriptions() {
        let handler = handler();
        for (id, start) in [("late", "2024-03-07T15:00:00Z"), ("early", "2024-03-07T08:00:00Z")] {
            call(
                &handler,
                "create_task",
                json!({
                    "id": id,
                    "name": "Plan work",
                    "start_time": start,
                    "end_time": "2024-03-07T18:00:00Z"
                }),
            )
            .await;
        }
        let tools = handler.get_tools();
        let description = |name: &str| {
            tools
                .iter()
                .find(|t| t.name == name)
                .and_then(|t| t.description.as_ref())
                .map(|d| d.to_string())
                .unwrap()
        };

        let listed = call(&handler, "list_tasks", json!({})).await;
        let ids: Vec<&str> = listed["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert!(description("list_tasks").contains("earliest start first"));

        let summary = call(
            &handler,
            "activity_summary",
            json!({ "now": "2024-03-07T16:00:00Z" }),
        )
        .await;
        let summary_description = description("activity_summary");
        for state in summary["data"]["by_state"].as_object().unwrap().keys() {
            assert!(summary_description.contains(state.as_str()), "{}", state);
        }
    }

    #[tokio::test]
    async fn missing_arguments_are_validation_errors() {
        let handler = handler();
        let err = handler
            .call_tool("get_task", json!({}), &ctx())
            .await
            .unwrap_err();
        let tool_err: ToolError = err.into();
        assert_eq!(tool_err.code, ErrorCode::MissingRequiredField);
        assert_eq!(tool_err.field.as_deref(), Some("task_id"));
    }

    #[tokio::test]
    async fn file_impact_rejects_out_of_range_window() {
        let handler = handler();
        for window in [json!(i64::MAX), json!(-1)] {
            let err = handler
                .call_tool(
                    "file_impact",
                    json!({ "file": "src/a.rs", "window_days": window }),
                    &ctx(),
                )
                .await
                .unwrap_err();
            let tool_err = ToolError::from(err);
            assert_eq!(tool_err.code, ErrorCode::InvalidFieldValue);
            assert_eq!(tool_err.field.as_deref(), Some("window_days"));
        }

        let ok = call(
            &handler,
            "file_impact",
            json!({ "file": "src/a.rs", "window_days": 36525 }),
        )
        .await;
        assert_eq!(ok["is_demo"], false);
    }

    #[tokio::test]
    async fn unknown_task_and_tool() {
        let handler = handler();
        let err = handler
            .call_tool("get_task", json!({ "task_id": "nope" }), &ctx())
            .await
            .unwrap_err();
        assert_eq!(ToolError::from(err).code, ErrorCode::TaskNotFound);

        let err = handler
            .call_tool("rebase_everything", json!({}), &ctx())
            .await
            .unwrap_err();
        assert_eq!(ToolError::from(err).code, ErrorCode::UnknownTool);
    }

    #[tokio::test]
    async fn tools_fall_back_to_demo_data() {
        let handler = ToolHandler::new(Arc::new(closed_source_with_demo()));
        let summary = call(&handler, "skill_summary", json!({})).await;
        assert_eq!(summary["is_demo"], true);
        assert!(!summary["data"].as_array().unwrap().is_empty());
    }
}
