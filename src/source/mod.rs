//! Data sources behind the tool and CLI surfaces.
//!
//! A [`DataSource`] hands out a [`Database`] plus the configuration the
//! engines read their thresholds from. Every engine operation is a provided
//! method, so an implementation only decides where the store comes from.
//! [`FallbackSource`] is what the server talks to: it calls the live source
//! and re-runs the call against the demo dataset when the store is down.

mod demo;
mod live;

pub use demo::DemoSource;
pub use live::LiveSource;

use crate::config::Config;
use crate::db::Database;
use crate::error::is_store_unavailable;
use crate::types::*;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::warn;

pub trait DataSource: Send + Sync {
    /// The store to run against.
    fn database(&self) -> Result<Arc<Database>>;

    fn config(&self) -> &Config;

    /// True when results come from the static demo dataset.
    fn is_demo(&self) -> bool {
        false
    }

    // Tasks

    fn create_task(&self, input: NewTask) -> Result<Task> {
        self.database()?.create_task(input)
    }

    fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.database()?.get_task(task_id)
    }

    fn get_tasks_by_date(&self, date: &str) -> Result<Vec<Task>> {
        self.database()?.get_tasks_by_date(date)
    }

    fn get_all_tasks(&self, limit: Option<i64>) -> Result<Vec<Task>> {
        let limit = self.config().tasks.effective_limit(limit);
        self.database()?.get_all_tasks(limit)
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let filter = TaskFilter {
            limit: Some(self.config().tasks.effective_limit(filter.limit)),
            ..filter.clone()
        };
        self.database()?.list_tasks(&filter)
    }

    fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<Option<Task>> {
        self.database()?.update_task_status(task_id, status)
    }

    fn record_task_activity(&self, task_id: &str, at: DateTime<Utc>) -> Result<Task> {
        self.database()?.record_task_activity(task_id, at)
    }

    fn delete_task(&self, task_id: &str) -> Result<bool> {
        self.database()?.delete_task(task_id)
    }

    // Commits and edges

    fn store_commit(&self, input: NewCommit) -> Result<StoredCommit> {
        self.database()?.store_commit(input)
    }

    fn get_commit(&self, hash: &str) -> Result<Option<Commit>> {
        self.database()?.get_commit(hash)
    }

    fn list_commits(&self, limit: Option<i64>) -> Result<Vec<Commit>> {
        let limit = self.config().tasks.effective_limit(limit);
        self.database()?.list_commits(limit)
    }

    fn add_task_dependency(&self, task_id: &str, depends_on_id: &str) -> Result<DependencyLink> {
        self.database()?
            .add_task_dependency(task_id, depends_on_id, &self.config().dependencies)
    }

    fn remove_task_dependency(&self, task_id: &str, depends_on_id: &str) -> Result<bool> {
        self.database()?.remove_task_dependency(task_id, depends_on_id)
    }

    fn add_file_import(&self, file: &str, imported: &str) -> Result<bool> {
        self.database()?.add_file_import(file, imported)
    }

    fn add_skill_prerequisite(&self, prerequisite: &str, skill: &str) -> Result<bool> {
        self.database()?.add_skill_prerequisite(prerequisite, skill)
    }

    fn add_learning_resource(&self, input: NewResource) -> Result<LearningResource> {
        self.database()?.add_learning_resource(input)
    }

    fn link_commit_to_task(&self, hash: &str, task_id: &str) -> Result<bool> {
        self.database()?.link_commit_to_task(hash, task_id)
    }

    // Videos

    fn save_video(&self, input: NewVideo) -> Result<Video> {
        self.database()?.save_video(input)
    }

    fn get_video(&self, id: &str) -> Result<Option<Video>> {
        self.database()?.get_video(id)
    }

    fn list_videos(&self, limit: Option<i64>) -> Result<Vec<Video>> {
        let limit = self.config().tasks.effective_limit(limit);
        self.database()?.list_videos(limit)
    }

    // Dependency & impact

    /// Blocked by one task, or every blocked task when `task_id` is `None`.
    fn get_blocked_tasks(&self, task_id: Option<&str>) -> Result<Vec<Task>> {
        let db = self.database()?;
        match task_id {
            Some(id) => db.get_blocked_tasks(id),
            None => db.get_all_blocked_tasks(),
        }
    }

    fn get_critical_path(&self, limit: Option<usize>) -> Result<Vec<CriticalPathEntry>> {
        let limit = limit.unwrap_or(self.config().analysis.critical_path_limit);
        self.database()?.get_critical_path(limit)
    }

    fn get_file_impact(
        &self,
        file: &str,
        window_days: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<FileImpact> {
        let window = window_days.unwrap_or(self.config().analysis.impact_window_days);
        self.database()?.get_file_impact(file, window, now)
    }

    // Activity

    fn get_stale_tasks(&self, now: DateTime<Utc>) -> Result<Vec<StaleTask>> {
        let threshold = self.config().analysis.stale_threshold_hours;
        self.database()?.get_stale_tasks(now, threshold)
    }

    fn get_activity_summary(&self, now: DateTime<Utc>) -> Result<ActivitySummary> {
        let threshold = self.config().analysis.stale_threshold_hours;
        self.database()?.get_activity_summary(now, threshold)
    }

    fn mark_stale_tasks(&self, now: DateTime<Utc>) -> Result<usize> {
        let threshold = self.config().analysis.stale_threshold_hours;
        self.database()?.mark_stale_tasks(now, threshold)
    }

    fn link_commits_to_tasks(&self) -> Result<LinkSummary> {
        self.database()?.link_commits_to_tasks()
    }

    // Skills

    fn find_knowledge_gaps(&self, threshold: Option<i64>) -> Result<Vec<KnowledgeGap>> {
        let threshold = threshold.unwrap_or(self.config().analysis.gap_threshold);
        self.database()?.find_knowledge_gaps(threshold)
    }

    fn get_skill_path(&self, skill: &str) -> Result<Vec<SkillPathEntry>> {
        self.database()?.get_skill_path(skill)
    }

    fn get_skill_graph(&self) -> Result<Vec<SkillSummary>> {
        self.database()?.get_skill_graph()
    }

    fn get_skill_levels(&self) -> Result<Vec<SkillLevel>> {
        self.database()?.get_skill_levels()
    }

    // Monthly

    fn calculate_monthly_snapshot(&self, month: &str) -> Result<Vec<MonthlySkillLevel>> {
        self.database()?.calculate_monthly_snapshot(month)
    }

    fn get_monthly_progress(&self, month: &str) -> Result<Vec<MonthlySkillLevel>> {
        self.database()?.get_monthly_progress(month)
    }

    fn list_months(&self) -> Result<Vec<String>> {
        self.database()?.list_months()
    }

    fn get_skill_improvement_trend(&self, skill: &str) -> Result<SkillTrend> {
        let months = self.config().analysis.trend_months;
        self.database()?.get_skill_improvement_trend(skill, months)
    }
}

/// A result tagged with where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct Sourced<T> {
    pub data: T,
    pub is_demo: bool,
}

/// Live source with a demo fallback for when the store is unreachable.
pub struct FallbackSource {
    primary: Arc<dyn DataSource>,
    demo: Mutex<Option<Arc<dyn DataSource>>>,
}

impl FallbackSource {
    pub fn new(primary: Arc<dyn DataSource>) -> Self {
        Self {
            primary,
            demo: Mutex::new(None),
        }
    }

    /// Use a prepared fallback instead of building the demo dataset on demand.
    pub fn with_demo(primary: Arc<dyn DataSource>, demo: Arc<dyn DataSource>) -> Self {
        Self {
            primary,
            demo: Mutex::new(Some(demo)),
        }
    }

    pub fn primary(&self) -> &Arc<dyn DataSource> {
        &self.primary
    }

    fn demo(&self) -> Result<Arc<dyn DataSource>> {
        let mut slot = self
            .demo
            .lock()
            .map_err(|_| anyhow::anyhow!("demo source lock poisoned"))?;
        if let Some(demo) = slot.as_ref() {
            return Ok(Arc::clone(demo));
        }
        let config = Arc::new(self.primary.config().clone());
        let demo: Arc<dyn DataSource> = Arc::new(DemoSource::new(config, Utc::now())?);
        *slot = Some(Arc::clone(&demo));
        Ok(demo)
    }

    /// Run `op` against the primary source, or the demo source if the
    /// store is unavailable.
    pub fn run<T>(
        &self,
        operation: &str,
        op: impl Fn(&dyn DataSource) -> Result<T>,
    ) -> Result<Sourced<T>> {
        match op(self.primary.as_ref()) {
            Ok(data) => Ok(Sourced {
                data,
                is_demo: self.primary.is_demo(),
            }),
            Err(err) if is_store_unavailable(&err) && !self.primary.is_demo() => {
                warn!(operation, error = %err, "Store unavailable, serving demo data");
                let demo = self.demo()?;
                let data = op(demo.as_ref())?;
                Ok(Sourced {
                    data,
                    is_demo: true,
                })
            }
            Err(err) => Err(err),
        }
    }
}
