//! Configuration types and structures.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Which data source the server starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Live store, falling back to demo data if it is unreachable (default).
    #[default]
    Live,
    /// Static demo dataset only.
    Demo,
}

impl SourceMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" => Some(SourceMode::Live),
            "demo" => Some(SourceMode::Demo),
            _ => None,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// How long a statement may wait on a lock before failing with a timeout.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default)]
    pub mode: SourceMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            mode: SourceMode::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("skill-graph/graph.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Thresholds used by the analysis engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Hours of inactivity after which a started task is stale.
    #[serde(default = "default_stale_threshold_hours")]
    pub stale_threshold_hours: f64,

    /// Demonstrations below this count make a required skill a gap.
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold: i64,

    /// Number of entries returned by the critical path query.
    #[serde(default = "default_critical_path_limit")]
    pub critical_path_limit: usize,

    /// Trailing window for commits in file impact queries.
    #[serde(default = "default_impact_window_days")]
    pub impact_window_days: i64,

    /// Most recent months considered by trend queries.
    #[serde(default = "default_trend_months")]
    pub trend_months: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stale_threshold_hours: default_stale_threshold_hours(),
            gap_threshold: default_gap_threshold(),
            critical_path_limit: default_critical_path_limit(),
            impact_window_days: default_impact_window_days(),
            trend_months: default_trend_months(),
        }
    }
}

fn default_stale_threshold_hours() -> f64 {
    crate::activity::DEFAULT_STALE_THRESHOLD_HOURS
}

fn default_gap_threshold() -> i64 {
    crate::db::skills::DEFAULT_GAP_THRESHOLD
}

fn default_critical_path_limit() -> usize {
    10
}

fn default_impact_window_days() -> i64 {
    30
}

fn default_trend_months() -> usize {
    crate::db::monthly::DEFAULT_TREND_MONTHS
}

/// Task listing bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default = "default_task_limit")]
    pub default_limit: i64,

    #[serde(default = "default_task_max_limit")]
    pub max_limit: i64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_limit: default_task_limit(),
            max_limit: default_task_max_limit(),
        }
    }
}

fn default_task_limit() -> i64 {
    crate::db::tasks::DEFAULT_TASK_LIMIT
}

fn default_task_max_limit() -> i64 {
    1000
}

impl TasksConfig {
    /// Clamp a requested limit into `1..=max_limit`.
    pub fn effective_limit(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

/// Dependency edge policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependenciesConfig {
    /// Refuse DEPENDS_ON edges that would close a cycle.
    #[serde(default = "default_reject_cycles")]
    pub reject_cycles: bool,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            reject_cycles: default_reject_cycles(),
        }
    }
}

fn default_reject_cycles() -> bool {
    true
}

/// Overrides for the skill inference tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// `skill -> regex`; replaces the built-in rule for that skill.
    #[serde(default)]
    pub patterns: BTreeMap<String, String>,

    /// `extension -> skills`; replaces the built-in rule for that extension.
    #[serde(default)]
    pub extensions: BTreeMap<String, Vec<String>>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub tasks: TasksConfig,

    #[serde(default)]
    pub dependencies: DependenciesConfig,

    #[serde(default)]
    pub skills: SkillsConfig,
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.analysis.stale_threshold_hours.is_finite()
            && self.analysis.stale_threshold_hours > 0.0)
        {
            return Err(anyhow!("analysis.stale_threshold_hours must be positive"));
        }
        if self.analysis.gap_threshold < 1 {
            return Err(anyhow!("analysis.gap_threshold must be at least 1"));
        }
        if self.analysis.impact_window_days < 0 {
            return Err(anyhow!("analysis.impact_window_days must not be negative"));
        }
        if self.analysis.trend_months == 0 {
            return Err(anyhow!("analysis.trend_months must be at least 1"));
        }
        if self.tasks.default_limit < 1 || self.tasks.max_limit < self.tasks.default_limit {
            return Err(anyhow!(
                "tasks.default_limit must be at least 1 and not exceed tasks.max_limit"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.analysis.stale_threshold_hours, 2.0);
        assert_eq!(config.analysis.gap_threshold, 3);
        assert_eq!(config.analysis.impact_window_days, 30);
        assert_eq!(config.analysis.trend_months, 12);
        assert_eq!(config.tasks.default_limit, 100);
        assert!(config.dependencies.reject_cycles);
        assert_eq!(config.store.mode, SourceMode::Live);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str(
            "analysis:\n  gap_threshold: 5\nstore:\n  mode: demo\n",
        )
        .unwrap();
        assert_eq!(config.analysis.gap_threshold, 5);
        assert_eq!(config.analysis.stale_threshold_hours, 2.0);
        assert_eq!(config.store.mode, SourceMode::Demo);
        assert_eq!(config.store.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_effective_limit_clamps() {
        let tasks = TasksConfig::default();
        assert_eq!(tasks.effective_limit(None), 100);
        assert_eq!(tasks.effective_limit(Some(0)), 1);
        assert_eq!(tasks.effective_limit(Some(5000)), 1000);
        assert_eq!(tasks.effective_limit(Some(20)), 20);
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = Config::default();
        config.analysis.stale_threshold_hours = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.analysis.gap_threshold = 0;
        assert!(config.validate().is_err());
    }
}
