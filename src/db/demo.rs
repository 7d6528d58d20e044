//! Static demo dataset, anchored to the current day.

use super::Database;
use crate::config::DependenciesConfig;
use crate::timefmt::{format_instant, month_id};
use crate::types::{NewCommit, NewResource, NewTask, NewVideo, TaskStatus};
use anyhow::Result;
use chrono::{DateTime, Duration, Months, Utc};
use serde_json::json;
use tracing::debug;

struct DemoTask {
    id: &'static str,
    name: &'static str,
    /// Hours after midnight of the anchor day.
    start_hour: i64,
    hours: i64,
    status: TaskStatus,
    skills: &'static [&'static str],
}

const TASKS: &[DemoTask] = &[
    DemoTask {
        id: "demo-auth",
        name: "Implement authentication API endpoints",
        start_hour: 9,
        hours: 2,
        status: TaskStatus::Completed,
        skills: &["api", "security"],
    },
    DemoTask {
        id: "demo-dashboard",
        name: "Build React dashboard components",
        start_hour: 11,
        hours: 2,
        status: TaskStatus::InProgress,
        skills: &["react", "typescript"],
    },
    DemoTask {
        id: "demo-tests",
        name: "Write integration tests for the dashboard",
        start_hour: 13,
        hours: 2,
        status: TaskStatus::Pending,
        skills: &["testing", "react"],
    },
    DemoTask {
        id: "demo-docker",
        name: "Containerize services",
        start_hour: 15,
        hours: 2,
        status: TaskStatus::Pending,
        skills: &["docker", "devops"],
    },
    DemoTask {
        id: "demo-perf",
        name: "Tune slow report queries",
        start_hour: 33,
        hours: 2,
        status: TaskStatus::Pending,
        skills: &["database", "performance"],
    },
];

/// `(task, depends_on)`
const DEPENDENCIES: &[(&str, &str)] = &[
    ("demo-tests", "demo-dashboard"),
    ("demo-docker", "demo-auth"),
    ("demo-perf", "demo-tests"),
];

struct DemoCommit {
    hash: &'static str,
    message: &'static str,
    /// Minutes after midnight of the anchor day.
    minute: i64,
    files: &'static [&'static str],
}

const COMMITS: &[DemoCommit] = &[
    DemoCommit {
        hash: "d3m0a1",
        message: "Add login API endpoint with token validation",
        minute: 9 * 60 + 30,
        files: &["src/api/auth.ts", "src/api/auth.test.ts"],
    },
    DemoCommit {
        hash: "d3m0a2",
        message: "Fix security issue in session handling",
        minute: 10 * 60 + 40,
        files: &["src/api/session.ts"],
    },
    DemoCommit {
        hash: "d3m0b1",
        message: "Add React dashboard layout component",
        minute: 11 * 60 + 45,
        files: &["src/components/Dashboard.tsx"],
    },
    DemoCommit {
        hash: "d3m0b2",
        message: "Style dashboard cards",
        minute: 12 * 60 + 30,
        files: &["src/components/Dashboard.css"],
    },
];

const IMPORTS: &[(&str, &str)] = &[
    ("src/components/Dashboard.tsx", "src/api/auth.ts"),
    ("src/App.tsx", "src/components/Dashboard.tsx"),
    ("src/api/session.ts", "src/api/auth.ts"),
];

/// `(prerequisite, skill)`
const PREREQUISITES: &[(&str, &str)] = &[
    ("javascript", "typescript"),
    ("javascript", "react"),
    ("react", "testing"),
    ("docker", "devops"),
    ("database", "performance"),
];

const RESOURCES: &[(&str, &str, &str, &[&str])] = &[
    (
        "demo-docker-guide",
        "Docker getting started",
        "https://docs.docker.com/get-started/",
        &["docker"],
    ),
    (
        "demo-testing-library",
        "React Testing Library",
        "https://testing-library.com/docs/react-testing-library/intro/",
        &["testing", "react"],
    ),
];

/// Build an in-memory database holding the demo dataset for `now`'s day.
pub fn demo_database(now: DateTime<Utc>) -> Result<Database> {
    let db = Database::open_in_memory()?;
    seed(&db, now)?;
    Ok(db)
}

/// Write the demo dataset into `db`.
pub fn seed(db: &Database, now: DateTime<Utc>) -> Result<()> {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);

    for task in TASKS {
        let start = midnight + Duration::hours(task.start_hour);
        db.create_task(NewTask {
            id: Some(task.id.to_string()),
            name: task.name.to_string(),
            description: None,
            start_time: format_instant(&start),
            end_time: format_instant(&(start + Duration::hours(task.hours))),
            status: Some(task.status),
            skills: task.skills.iter().map(|s| s.to_string()).collect(),
        })?;
    }

    let deps = DependenciesConfig::default();
    for (task, depends_on) in DEPENDENCIES {
        db.add_task_dependency(task, depends_on, &deps)?;
    }

    for commit in COMMITS {
        db.store_commit(NewCommit {
            hash: commit.hash.to_string(),
            message: commit.message.to_string(),
            timestamp: format_instant(&(midnight + Duration::minutes(commit.minute))),
            author: "demo".to_string(),
            branch: "main".to_string(),
            additions: 40,
            deletions: 8,
            files: commit.files.iter().map(|f| f.to_string()).collect(),
        })?;
    }

    // A little history so trends have more than one point.
    let previous = midnight.checked_sub_months(Months::new(1)).unwrap_or(midnight);
    db.store_commit(NewCommit {
        hash: "d3m0p1".to_string(),
        message: "Refactor API error handling".to_string(),
        timestamp: format_instant(&previous),
        author: "demo".to_string(),
        branch: "main".to_string(),
        additions: 12,
        deletions: 30,
        files: vec!["src/api/errors.ts".to_string()],
    })?;

    for (file, imported) in IMPORTS {
        db.add_file_import(file, imported)?;
    }
    for (prerequisite, skill) in PREREQUISITES {
        db.add_skill_prerequisite(prerequisite, skill)?;
    }
    for (id, title, url, skills) in RESOURCES {
        db.add_learning_resource(NewResource {
            id: Some(id.to_string()),
            title: title.to_string(),
            url: Some(url.to_string()),
            skills: skills.iter().map(|s| s.to_string()).collect(),
        })?;
    }

    db.link_commits_to_tasks()?;
    db.calculate_monthly_snapshot(&month_id(&previous))?;
    db.calculate_monthly_snapshot(&month_id(&midnight))?;

    db.save_video(NewVideo {
        id: Some("demo-briefing".to_string()),
        url: "https://example.com/briefings/demo.mp4".to_string(),
        date: format_instant(&midnight),
        analysis: json!({
            "tasks": TASKS.len(),
            "commits": COMMITS.len() + 1,
        }),
        script: "Today's plan covers authentication, the dashboard and its tests.".to_string(),
    })?;

    debug!(day = %midnight.date_naive(), "Demo dataset seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_demo_dataset_is_consistent() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 16, 0, 0).unwrap();
        let db = demo_database(now).unwrap();

        let tasks = db.get_tasks_by_date("2024-05-10").unwrap();
        assert_eq!(tasks.len(), 4);

        let blocked = db.get_blocked_tasks("demo-dashboard").unwrap();
        let ids: Vec<&str> = blocked.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["demo-tests", "demo-perf"]);

        let months = db.list_months().unwrap();
        assert_eq!(months, vec!["2024-05".to_string(), "2024-04".to_string()]);

        assert!(db.get_video("demo-briefing").unwrap().is_some());
    }
}
