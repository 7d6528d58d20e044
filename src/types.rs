//! Core types for the skill graph.

use crate::timefmt::canonical;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Planned-work status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

/// A task in the planning graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(with = "canonical")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "canonical")]
    pub end_time: DateTime<Utc>,
    pub status: TaskStatus,
    #[serde(with = "canonical")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "canonical")]
    pub updated_at: DateTime<Utc>,
    #[serde(with = "canonical::option", default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(with = "canonical::option", default)]
    pub last_activity: Option<DateTime<Utc>>,
    /// Explicitly persisted stale flag. `None` means "derive from time".
    #[serde(default)]
    pub is_stale: Option<bool>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Skills this task requires (REQUIRES_SKILL).
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Input for creating (or re-creating) a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Explicit skills in addition to those inferred from the text.
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Read filter for task listings.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// `YYYY-MM-DD`, matched against the start time.
    pub date: Option<String>,
    pub status: Option<TaskStatus>,
    pub limit: Option<i64>,
}

/// A commit ingested from version-control history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub message: String,
    #[serde(with = "canonical")]
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub branch: String,
    pub additions: i64,
    pub deletions: i64,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Input for storing a commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCommit {
    pub hash: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Result of a commit upsert.
#[derive(Debug, Clone, Serialize)]
pub struct StoredCommit {
    #[serde(flatten)]
    pub commit: Commit,
    /// False when the hash was already known.
    pub created: bool,
}

/// A DEPENDS_ON edge: `task_id` cannot finish before `depends_on_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub task_id: String,
    pub depends_on_id: String,
}

/// Outcome of a dependency merge.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyLink {
    pub task_id: String,
    pub depends_on_id: String,
    /// False when the edge already existed.
    pub created: bool,
}

/// A task ranked by how many incomplete tasks wait on it.
#[derive(Debug, Clone, Serialize)]
pub struct CriticalPathEntry {
    #[serde(flatten)]
    pub task: Task,
    pub blocks_count: usize,
}

/// A file reached through IMPORTS, with its hop distance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactedFile {
    pub name: String,
    pub depth: usize,
}

/// Blast radius of a change to one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileImpact {
    pub file: String,
    pub dependents: Vec<ImpactedFile>,
    pub recent_commits: Vec<Commit>,
    pub affected_tasks: Vec<TaskRef>,
}

/// Compact task reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
}

/// Derived activity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Pending,
    InProgress,
    Completed,
    Stale,
}

impl ActivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityState::Pending => "pending",
            ActivityState::InProgress => "in_progress",
            ActivityState::Completed => "completed",
            ActivityState::Stale => "stale",
        }
    }
}

/// A task classified stale, with whole hours since its last activity.
#[derive(Debug, Clone, Serialize)]
pub struct StaleTask {
    #[serde(flatten)]
    pub task: Task,
    pub hours_inactive: i64,
}

/// Counts per derived activity state.
#[derive(Debug, Clone, Serialize)]
pub struct ActivitySummary {
    #[serde(with = "canonical")]
    pub now: DateTime<Utc>,
    pub threshold_hours: f64,
    pub total: usize,
    pub by_state: BTreeMap<String, usize>,
    pub stale: Vec<StaleTask>,
}

/// Outcome of heuristic commit-to-task linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    /// Edges created by this run.
    pub created: usize,
    /// IMPLEMENTS edges in the store afterwards.
    pub total: usize,
}

/// A node that teaches a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningResource {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
}

/// Input for a learning resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewResource {
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// A skill required by outstanding work but rarely demonstrated.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeGap {
    pub skill: String,
    pub demonstrations: i64,
    pub required_by: Vec<String>,
    pub resources: Vec<LearningResource>,
}

/// One step of a learning path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillPathEntry {
    pub skill: String,
    /// Hops from the requested skill (0 for the skill itself).
    pub depth: usize,
}

/// One-hop summary of a skill node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillSummary {
    pub name: String,
    pub commit_count: i64,
    pub task_count: i64,
    pub file_count: i64,
    pub prerequisites: Vec<String>,
    pub enables: Vec<String>,
}

/// Completion-derived skill level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillLevel {
    pub skill: String,
    pub level: u8,
    pub completed_tasks: i64,
    pub total_tasks: i64,
}

/// A HAS_SKILL_LEVEL edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySkillLevel {
    pub month: String,
    pub skill: String,
    pub level: u8,
    pub commits: i64,
    pub tasks_completed: i64,
}

/// Direction of a skill trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// Comparison of the earliest and latest recorded monthly level.
#[derive(Debug, Clone, Serialize)]
pub struct SkillTrend {
    pub skill: String,
    pub trend: TrendDirection,
    pub first_level: Option<u8>,
    pub latest_level: Option<u8>,
    pub change: i32,
    /// Oldest first.
    pub points: Vec<MonthlySkillLevel>,
}

/// A generated briefing video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub url: String,
    #[serde(with = "canonical")]
    pub date: DateTime<Utc>,
    pub analysis: serde_json::Value,
    pub script: String,
}

/// Input for saving a video record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewVideo {
    pub id: Option<String>,
    pub url: String,
    pub date: String,
    #[serde(default)]
    pub analysis: serde_json::Value,
    #[serde(default)]
    pub script: String,
}
