//! Integration tests for the graph engine.
//!
//! These tests run the engine operations against an in-memory SQLite database.
//! Tests are organized by engine.

use chrono::{DateTime, TimeZone, Utc};
use skill_graph_mcp::config::DependenciesConfig;
use skill_graph_mcp::db::Database;
use skill_graph_mcp::error::{ErrorCode, error_code};
use skill_graph_mcp::types::{NewCommit, NewResource, NewTask, TaskFilter, TaskStatus};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 7, hour, minute, 0).unwrap()
}

fn iso(hour: u32, minute: u32) -> String {
    format!("2024-03-07T{:02}:{:02}:00Z", hour, minute)
}

fn task(
    db: &Database,
    id: &str,
    name: &str,
    window: (u32, u32),
    status: TaskStatus,
    skills: &[&str],
) {
    db.create_task(NewTask {
        id: Some(id.to_string()),
        name: name.to_string(),
        description: None,
        start_time: iso(window.0, 0),
        end_time: iso(window.1, 0),
        status: Some(status),
        skills: skills.iter().map(|s| s.to_string()).collect(),
    })
    .expect("Failed to create task");
}

fn commit(db: &Database, hash: &str, message: &str, timestamp: &str, files: &[&str]) -> bool {
    db.store_commit(NewCommit {
        hash: hash.to_string(),
        message: message.to_string(),
        timestamp: timestamp.to_string(),
        files: files.iter().map(|f| f.to_string()).collect(),
        ..Default::default()
    })
    .expect("Failed to store commit")
    .created
}

mod task_tests {
    use super::*;

    #[test]
    fn create_task_infers_skills_and_keywords() {
        let db = setup_db();
        let created = db
            .create_task(NewTask {
                id: None,
                name: "Build checkout API endpoint".to_string(),
                description: Some("Validate payment payloads".to_string()),
                start_time: iso(9, 0),
                end_time: iso(11, 0),
                status: None,
                skills: vec!["  Payments ".to_string()],
            })
            .unwrap();

        assert!(!created.id.is_empty());
        assert_eq!(created.status, TaskStatus::Pending);
        assert!(created.skills.contains(&"api".to_string()));
        assert!(created.skills.contains(&"payments".to_string()));
        assert!(created.keywords.contains(&"checkout".to_string()));
        assert!(created.completed_at.is_none());
    }

    #[test]
    fn create_task_rejects_inverted_window() {
        let db = setup_db();
        let err = db
            .create_task(NewTask {
                name: "Backwards".to_string(),
                start_time: iso(12, 0),
                end_time: iso(9, 0),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::InvalidFieldValue));
    }

    #[test]
    fn list_tasks_filters_by_day_and_status() {
        let db = setup_db();
        task(&db, "t1", "Morning planning", (9, 10), TaskStatus::Completed, &[]);
        task(&db, "t2", "Afternoon review", (13, 14), TaskStatus::Pending, &[]);

        let all = db.get_tasks_by_date("2024-03-07").unwrap();
        assert_eq!(all.len(), 2);
        assert!(db.get_tasks_by_date("2024-03-08").unwrap().is_empty());

        let pending = db
            .list_tasks(&TaskFilter {
                date: Some("2024-03-07".to_string()),
                status: Some(TaskStatus::Pending),
                limit: None,
            })
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "t2");
    }

    #[test]
    fn completing_a_task_records_completion_once() {
        let db = setup_db();
        task(&db, "t1", "Write report", (9, 10), TaskStatus::Pending, &[]);

        let done = db
            .update_task_status("t1", TaskStatus::Completed)
            .unwrap()
            .unwrap();
        let first = done.completed_at.expect("completed_at set");

        let again = db
            .update_task_status("t1", TaskStatus::Completed)
            .unwrap()
            .unwrap();
        assert_eq!(again.completed_at, Some(first));

        assert!(db
            .update_task_status("missing", TaskStatus::Completed)
            .unwrap()
            .is_none());
    }

    #[test]
    fn record_activity_clears_stale_flag() {
        let db = setup_db();
        task(&db, "t1", "Afternoon review", (13, 15), TaskStatus::Pending, &[]);
        assert_eq!(db.mark_stale_tasks(at(16, 0), 2.0).unwrap(), 1);
        assert_eq!(db.get_task("t1").unwrap().unwrap().is_stale, Some(true));

        let touched = db.record_task_activity("t1", at(16, 30)).unwrap();
        assert_eq!(touched.last_activity, Some(at(16, 30)));
        assert_ne!(touched.is_stale, Some(true));

        let err = db.record_task_activity("missing", at(16, 30)).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::TaskNotFound));
    }

    #[test]
    fn delete_task_detaches_edges_but_keeps_commits() {
        let db = setup_db();
        task(&db, "a", "First step", (9, 10), TaskStatus::Pending, &[]);
        task(&db, "b", "Second step", (10, 11), TaskStatus::Pending, &[]);
        db.add_task_dependency("b", "a", &DependenciesConfig::default())
            .unwrap();
        commit(&db, "c1", "Initial import", &iso(9, 30), &[]);
        assert!(db.link_commit_to_task("c1", "a").unwrap());

        assert!(db.delete_task("a").unwrap());
        assert!(!db.delete_task("a").unwrap());

        assert!(db.get_task("a").unwrap().is_none());
        assert!(db.get_all_dependencies().unwrap().is_empty());
        assert!(db.get_commit("c1").unwrap().is_some());
        assert!(db.get_blocked_tasks("a").unwrap().is_empty());
    }
}

mod commit_tests {
    use super::*;

    #[test]
    fn store_commit_is_idempotent() {
        let db = setup_db();
        let files = ["src/parser.rs", "src/parser.rs", "README.md"];

        assert!(commit(&db, "abc123", "Add parser tests", &iso(10, 30), &files));
        assert!(!commit(&db, "abc123", "Add parser tests", &iso(10, 30), &files));

        let stored = db.get_commit("abc123").unwrap().unwrap();
        assert_eq!(stored.files.len(), 2);
        let mut skills = stored.skills.clone();
        skills.dedup();
        assert_eq!(skills, stored.skills);
        assert!(stored.skills.contains(&"rust".to_string()));
        assert!(stored.skills.contains(&"testing".to_string()));
        assert!(stored.skills.contains(&"documentation".to_string()));

        assert_eq!(db.list_commits(10).unwrap().len(), 1);
    }

    #[test]
    fn store_commit_accepts_epoch_millis() {
        let db = setup_db();
        commit(&db, "ms1", "Initial import", "1709807400000", &[]);
        let stored = db.get_commit("ms1").unwrap().unwrap();
        assert_eq!(stored.timestamp, at(10, 30));
    }

    #[test]
    fn link_commits_creates_one_edge_and_is_idempotent() {
        let db = setup_db();
        task(&db, "t", "Checkout flow", (9, 12), TaskStatus::Pending, &["testing"]);
        commit(&db, "c", "Add tests for checkout", &iso(10, 30), &[]);

        let first = db.link_commits_to_tasks().unwrap();
        assert_eq!(first.created, 1);
        assert_eq!(first.total, 1);

        let second = db.link_commits_to_tasks().unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.total, 1);

        let linked = db.get_task("t").unwrap().unwrap();
        assert_eq!(linked.last_activity, Some(at(10, 30)));
    }

    #[test]
    fn link_commits_ignores_commits_outside_window() {
        let db = setup_db();
        task(&db, "t", "Checkout flow", (9, 12), TaskStatus::Pending, &["testing"]);
        commit(&db, "late", "Add tests for checkout", &iso(13, 0), &[]);

        assert_eq!(db.link_commits_to_tasks().unwrap().total, 0);
    }

    #[test]
    fn link_commit_requires_both_ends() {
        let db = setup_db();
        task(&db, "t", "Checkout flow", (9, 12), TaskStatus::Pending, &[]);

        let err = db.link_commit_to_task("nope", "t").unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::CommitNotFound));

        commit(&db, "c", "Initial import", &iso(10, 0), &[]);
        let err = db.link_commit_to_task("c", "nope").unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::TaskNotFound));

        assert!(db.link_commit_to_task("c", "t").unwrap());
        assert!(!db.link_commit_to_task("c", "t").unwrap());
    }
}

mod dependency_tests {
    use super::*;

    #[test]
    fn blocked_tasks_terminate_on_cycles() {
        let db = setup_db();
        let allow_cycles = DependenciesConfig {
            reject_cycles: false,
        };
        task(&db, "a", "First step", (9, 10), TaskStatus::Pending, &[]);
        task(&db, "b", "Second step", (10, 11), TaskStatus::Pending, &[]);
        db.add_task_dependency("b", "a", &allow_cycles).unwrap();
        db.add_task_dependency("a", "b", &allow_cycles).unwrap();

        let blocked = db.get_blocked_tasks("a").unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].id, "b");
    }

    #[test]
    fn cycles_rejected_when_configured() {
        let db = setup_db();
        let config = DependenciesConfig::default();
        task(&db, "a", "First step", (9, 10), TaskStatus::Pending, &[]);
        task(&db, "b", "Second step", (10, 11), TaskStatus::Pending, &[]);
        task(&db, "c", "Third step", (11, 12), TaskStatus::Pending, &[]);
        db.add_task_dependency("b", "a", &config).unwrap();
        db.add_task_dependency("c", "b", &config).unwrap();

        let err = db.add_task_dependency("a", "c", &config).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::DependencyCycle));

        let err = db.add_task_dependency("a", "a", &config).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::DependencyCycle));
    }

    #[test]
    fn duplicate_links_merge() {
        let db = setup_db();
        let config = DependenciesConfig::default();
        task(&db, "a", "First step", (9, 10), TaskStatus::Pending, &[]);
        task(&db, "b", "Second step", (10, 11), TaskStatus::Pending, &[]);

        assert!(db.add_task_dependency("b", "a", &config).unwrap().created);
        assert!(!db.add_task_dependency("b", "a", &config).unwrap().created);
        assert_eq!(db.get_all_dependencies().unwrap().len(), 1);

        let err = db.add_task_dependency("b", "ghost", &config).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::TaskNotFound));
    }

    #[test]
    fn blocked_tasks_are_transitive_and_skip_completed() {
        let db = setup_db();
        let config = DependenciesConfig::default();
        task(&db, "root", "Design", (9, 10), TaskStatus::Pending, &[]);
        task(&db, "mid", "Build", (10, 11), TaskStatus::Completed, &[]);
        task(&db, "leaf", "Ship", (11, 12), TaskStatus::Pending, &[]);
        db.add_task_dependency("mid", "root", &config).unwrap();
        db.add_task_dependency("leaf", "mid", &config).unwrap();

        let blocked: Vec<String> = db
            .get_blocked_tasks("root")
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(blocked, vec!["leaf"]);
        assert!(db.get_blocked_tasks("unknown").unwrap().is_empty());
    }

    #[test]
    fn critical_path_orders_by_count_then_start() {
        let db = setup_db();
        let config = DependenciesConfig::default();
        task(&db, "z", "Zulu", (9, 10), TaskStatus::Pending, &[]);
        task(&db, "b", "Bravo", (10, 11), TaskStatus::Pending, &[]);
        task(&db, "c", "Charlie", (11, 12), TaskStatus::Pending, &[]);
        for (id, hour) in [("z1", 13), ("z2", 14), ("z3", 15)] {
            task(&db, id, "Follow up", (hour, hour + 1), TaskStatus::Pending, &[]);
            db.add_task_dependency(id, "z", &config).unwrap();
        }
        for (id, hour) in [("c1", 13), ("c2", 14), ("c3", 15)] {
            task(&db, id, "Follow up", (hour, hour + 1), TaskStatus::Pending, &[]);
            db.add_task_dependency(id, "c", &config).unwrap();
        }
        task(&db, "b1", "Follow up", (16, 17), TaskStatus::Pending, &[]);
        db.add_task_dependency("b1", "b", &config).unwrap();

        // z sorts after c by id but starts earlier.
        let path = db.get_critical_path(10).unwrap();
        let ranked: Vec<(&str, usize)> = path
            .iter()
            .map(|e| (e.task.id.as_str(), e.blocks_count))
            .collect();
        assert_eq!(ranked, vec![("z", 3), ("c", 3), ("b", 1)]);

        assert_eq!(db.get_critical_path(1).unwrap().len(), 1);
    }

    #[test]
    fn file_impact_follows_importers_and_recent_commits() {
        let db = setup_db();
        db.add_file_import("src/app.ts", "src/api.ts").unwrap();
        db.add_file_import("src/main.ts", "src/app.ts").unwrap();
        db.add_file_import("src/api.ts", "src/main.ts").unwrap();
        task(&db, "t", "Wire requests", (9, 12), TaskStatus::Pending, &[]);
        commit(&db, "c1", "Initial import", &iso(10, 0), &["src/api.ts"]);
        db.link_commit_to_task("c1", "t").unwrap();

        let impact = db.get_file_impact("src/api.ts", 30, at(18, 0)).unwrap();
        let dependents: Vec<(&str, usize)> = impact
            .dependents
            .iter()
            .map(|f| (f.name.as_str(), f.depth))
            .collect();
        assert_eq!(dependents, vec![("src/app.ts", 1), ("src/main.ts", 2)]);
        assert_eq!(impact.recent_commits.len(), 1);
        assert_eq!(impact.affected_tasks.len(), 1);
        assert_eq!(impact.affected_tasks[0].id, "t");
    }

    #[test]
    fn file_impact_window_beyond_calendar_covers_all_history() {
        let db = setup_db();
        commit(&db, "old", "Ancient import", "1971-01-01T00:00:00Z", &["src/a.rs"]);
        commit(&db, "new", "Recent fix", &iso(10, 0), &["src/a.rs"]);

        for window in [100_000_000, i64::MAX] {
            let impact = db.get_file_impact("src/a.rs", window, at(18, 0)).unwrap();
            assert_eq!(impact.recent_commits.len(), 2);
        }
        let impact = db.get_file_impact("src/a.rs", 1, at(18, 0)).unwrap();
        assert_eq!(impact.recent_commits.len(), 1);
    }
}

mod activity_tests {
    use super::*;

    #[test]
    fn stale_scenario_reports_only_open_task() {
        let db = setup_db();
        task(&db, "t1", "Morning planning", (9, 12), TaskStatus::Completed, &[]);
        task(&db, "t2", "Afternoon review", (13, 15), TaskStatus::Pending, &[]);

        let stale = db.get_stale_tasks(at(16, 0), 2.0).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].task.id, "t2");
        assert_eq!(stale[0].hours_inactive, 3);
    }

    #[test]
    fn future_tasks_are_not_stale() {
        let db = setup_db();
        task(&db, "t", "Evening review", (18, 19), TaskStatus::Pending, &[]);
        assert!(db.get_stale_tasks(at(16, 0), 2.0).unwrap().is_empty());
    }

    #[test]
    fn mark_stale_counts_newly_flagged() {
        let db = setup_db();
        task(&db, "t2", "Afternoon review", (13, 15), TaskStatus::Pending, &[]);

        assert_eq!(db.mark_stale_tasks(at(16, 0), 2.0).unwrap(), 1);
        assert_eq!(db.mark_stale_tasks(at(16, 0), 2.0).unwrap(), 0);
    }

    #[test]
    fn activity_summary_counts_every_state() {
        let db = setup_db();
        task(&db, "t1", "Morning planning", (9, 12), TaskStatus::Completed, &[]);
        task(&db, "t2", "Afternoon review", (13, 15), TaskStatus::Pending, &[]);
        task(&db, "t3", "Evening review", (18, 19), TaskStatus::Pending, &[]);

        let summary = db.get_activity_summary(at(16, 0), 2.0).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_state.len(), 4);
        assert_eq!(summary.by_state["completed"], 1);
        assert_eq!(summary.by_state["stale"], 1);
        assert_eq!(summary.by_state["pending"], 1);
        assert_eq!(summary.stale.len(), 1);
    }
}

mod skill_tests {
    use super::*;

    #[test]
    fn knowledge_gap_threshold() {
        let db = setup_db();
        task(&db, "t", "Harden parser", (9, 10), TaskStatus::Pending, &["testing"]);
        commit(&db, "c1", "Add tests round one", &iso(8, 0), &[]);
        commit(&db, "c2", "Add tests round two", &iso(8, 30), &[]);
        db.add_learning_resource(NewResource {
            id: Some("guide".to_string()),
            title: "Testing guide".to_string(),
            url: None,
            skills: vec!["testing".to_string()],
        })
        .unwrap();

        let gaps = db.find_knowledge_gaps(3).unwrap();
        let testing = gaps
            .iter()
            .find(|g| g.skill == "testing")
            .expect("testing is a gap");
        assert_eq!(testing.demonstrations, 2);
        assert_eq!(testing.required_by, vec!["t"]);
        assert_eq!(testing.resources[0].id, "guide");

        commit(&db, "c3", "Add tests round three", &iso(9, 0), &[]);
        let gaps = db.find_knowledge_gaps(3).unwrap();
        assert!(gaps.iter().all(|g| g.skill != "testing"));
    }

    #[test]
    fn gaps_sorted_weakest_first() {
        let db = setup_db();
        task(&db, "t", "Harden parser", (9, 10), TaskStatus::Pending, &["testing", "fuzzing"]);
        commit(&db, "c1", "Add tests round one", &iso(8, 0), &[]);

        let gaps = db.find_knowledge_gaps(3).unwrap();
        let order: Vec<(&str, i64)> = gaps
            .iter()
            .map(|g| (g.skill.as_str(), g.demonstrations))
            .collect();
        assert_eq!(order, vec![("fuzzing", 0), ("testing", 1)]);
    }

    #[test]
    fn skill_path_lists_prerequisites_first() {
        let db = setup_db();
        db.add_skill_prerequisite("javascript", "typescript").unwrap();
        db.add_skill_prerequisite("typescript", "react native").unwrap();
        db.add_skill_prerequisite("react native", "javascript").unwrap();

        let path = db.get_skill_path("React Native").unwrap();
        let skills: Vec<&str> = path.iter().map(|e| e.skill.as_str()).collect();
        assert_eq!(skills, vec!["javascript", "typescript", "react native"]);
        assert!(db.get_skill_path("cobol").unwrap().is_empty());
        assert!(!db.add_skill_prerequisite("rust", "rust").unwrap_or(false));
    }

    #[test]
    fn skill_levels_follow_completion_ratio() {
        let db = setup_db();
        task(&db, "t1", "Step one", (9, 10), TaskStatus::Completed, &["fuzzing"]);
        task(&db, "t2", "Step two", (10, 11), TaskStatus::Pending, &["fuzzing"]);

        let levels = db.get_skill_levels().unwrap();
        let fuzzing = levels.iter().find(|l| l.skill == "fuzzing").unwrap();
        assert_eq!(fuzzing.completed_tasks, 1);
        assert_eq!(fuzzing.total_tasks, 2);
        assert_eq!(fuzzing.level, 5);
    }
}

mod monthly_tests {
    use super::*;

    #[test]
    fn snapshot_recomputation_overwrites() {
        let db = setup_db();
        commit(&db, "c1", "Add tests round one", "2024-03-02T10:00:00Z", &[]);

        let first = db.calculate_monthly_snapshot("2024-03").unwrap();
        let testing = first.iter().find(|l| l.skill == "testing").unwrap();
        assert_eq!((testing.commits, testing.level), (1, 3));

        commit(&db, "c2", "Add tests round two", "2024-03-05T10:00:00Z", &[]);
        commit(&db, "c3", "Add tests round three", "2024-03-09T10:00:00Z", &[]);
        commit(&db, "c4", "Add tests next month", "2024-04-01T00:00:00Z", &[]);
        db.calculate_monthly_snapshot("2024-03").unwrap();

        let stored = db.get_monthly_progress("2024-03").unwrap();
        let testing: Vec<_> = stored.iter().filter(|l| l.skill == "testing").collect();
        assert_eq!(testing.len(), 1);
        assert_eq!((testing[0].commits, testing[0].level), (3, 5));
        assert_eq!(db.list_months().unwrap(), vec!["2024-03"]);
    }

    #[test]
    fn snapshot_rejects_bad_month() {
        let db = setup_db();
        let err = db.calculate_monthly_snapshot("March").unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::InvalidFieldValue));
    }

    #[test]
    fn trend_compares_first_and_latest_month() {
        let db = setup_db();
        commit(&db, "c1", "Add tests round one", "2024-01-10T10:00:00Z", &[]);
        for (i, day) in [3, 6, 9, 12, 15].iter().enumerate() {
            commit(
                &db,
                &format!("m{}", i),
                "Add tests again",
                &format!("2024-03-{:02}T10:00:00Z", day),
                &[],
            );
        }
        for month in ["2024-01", "2024-02", "2024-03"] {
            db.calculate_monthly_snapshot(month).unwrap();
        }

        let trend = db.get_skill_improvement_trend("Testing", 12).unwrap();
        assert_eq!(trend.points.len(), 3);
        assert_eq!(trend.first_level, Some(3));
        assert_eq!(trend.latest_level, Some(6));
        assert_eq!(trend.change, 3);
        assert_eq!(
            serde_json::to_value(trend.trend).unwrap(),
            serde_json::json!("improving")
        );
    }

    #[test]
    fn trend_with_single_point_is_stable() {
        let db = setup_db();
        commit(&db, "c1", "Add tests round one", "2024-01-10T10:00:00Z", &[]);
        db.calculate_monthly_snapshot("2024-01").unwrap();

        let trend = db.get_skill_improvement_trend("testing", 12).unwrap();
        assert_eq!(trend.change, 0);
        assert_eq!(
            serde_json::to_value(trend.trend).unwrap(),
            serde_json::json!("stable")
        );
    }
}
