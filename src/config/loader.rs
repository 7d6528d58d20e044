//! Configuration loader with tier-based merging.

use super::merge::{Layer, Merged, merge_layers};
use super::types::{Config, SourceMode};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Built-in defaults
    Defaults = 0,
    /// Project-level config ($CWD/skill-graph/)
    Project = 1,
    /// User-level config (~/.skill-graph/)
    User = 2,
    /// Environment variables
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        let user_dir = std::env::var("SKILL_GRAPH_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".skill-graph")));

        let project_dir = std::env::var("SKILL_GRAPH_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("skill-graph")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Loads and merges configuration tiers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Config files that contributed, lowest tier first.
    sources: Vec<PathBuf>,
    provenance: BTreeMap<String, ConfigTier>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with(ConfigPaths::discover(), |key| std::env::var(key).ok())
    }

    /// Load configuration with explicit paths and the process environment.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        Self::load_with(paths, |key| std::env::var(key).ok())
    }

    /// Load configuration with explicit paths and an environment lookup.
    pub fn load_with(paths: ConfigPaths, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // An explicit file replaces the project and user tiers.
        let explicit = env("SKILL_GRAPH_CONFIG_PATH").map(PathBuf::from);

        let mut layers = vec![Layer::new(
            ConfigTier::Defaults,
            serde_json::to_value(Config::default())?,
        )];
        let mut sources = Vec::new();

        match explicit {
            Some(path) => {
                let value = read_yaml(&path)?
                    .with_context(|| format!("config file not found: {}", path.display()))?;
                layers.push(Layer::new(ConfigTier::Project, value));
                sources.push(path);
            }
            None => {
                let tiers = [
                    (ConfigTier::Project, paths.project_dir.as_deref()),
                    (ConfigTier::User, paths.user_dir.as_deref()),
                ];
                for (tier, dir) in tiers {
                    let Some(dir) = dir else { continue };
                    let file = dir.join("config.yaml");
                    match read_yaml(&file) {
                        Ok(Some(value)) => {
                            debug!(tier = %tier, path = %file.display(), "Loaded config tier");
                            layers.push(Layer::new(tier, value));
                            sources.push(file);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(tier = %tier, path = %file.display(), error = %e, "Ignoring unreadable config file");
                        }
                    }
                }
            }
        }

        let env_layer = env_overrides(&env);
        if env_layer.as_object().is_some_and(|m| !m.is_empty()) {
            layers.push(Layer::new(ConfigTier::Environment, env_layer));
        }

        let Merged { value, provenance } = merge_layers(layers);
        let config: Config = serde_json::from_value(value).context("invalid configuration")?;
        config.validate()?;

        Ok(Self {
            paths,
            config,
            sources,
            provenance,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Config files that were read.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Tier that supplied a dotted setting, e.g. `analysis.gap_threshold`.
    pub fn tier_of(&self, key: &str) -> Option<ConfigTier> {
        self.provenance.get(key).copied()
    }
}

/// Read a YAML file into JSON. `Ok(None)` when the file does not exist.
fn read_yaml(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("invalid YAML in {}", path.display()))?;
    Ok(Some(value))
}

/// Build the environment tier. Unparseable values are ignored with a warning.
fn env_overrides(env: &impl Fn(&str) -> Option<String>) -> Value {
    let mut store = serde_json::Map::new();
    let mut analysis = serde_json::Map::new();

    if let Some(db_path) = env("SKILL_GRAPH_DB_PATH") {
        store.insert("db_path".into(), Value::String(db_path));
    }
    if let Some(mode) = env("SKILL_GRAPH_MODE") {
        match SourceMode::from_str(&mode) {
            Some(SourceMode::Live) => {
                store.insert("mode".into(), "live".into());
            }
            Some(SourceMode::Demo) => {
                store.insert("mode".into(), "demo".into());
            }
            None => warn!(value = %mode, "Ignoring SKILL_GRAPH_MODE"),
        }
    }
    if let Some(hours) = env("SKILL_GRAPH_STALE_HOURS") {
        match hours.parse::<f64>() {
            Ok(h) => {
                analysis.insert("stale_threshold_hours".into(), serde_json::json!(h));
            }
            Err(_) => warn!(value = %hours, "Ignoring SKILL_GRAPH_STALE_HOURS"),
        }
    }
    if let Some(threshold) = env("SKILL_GRAPH_GAP_THRESHOLD") {
        match threshold.parse::<i64>() {
            Ok(t) => {
                analysis.insert("gap_threshold".into(), serde_json::json!(t));
            }
            Err(_) => warn!(value = %threshold, "Ignoring SKILL_GRAPH_GAP_THRESHOLD"),
        }
    }

    let mut root = serde_json::Map::new();
    if !store.is_empty() {
        root.insert("store".into(), Value::Object(store));
    }
    if !analysis.is_empty() {
        root.insert("analysis".into(), Value::Object(analysis));
    }
    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_load_defaults_only() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );

        let loader = ConfigLoader::load_with(paths, no_env).unwrap();
        assert_eq!(loader.config().analysis.gap_threshold, 3);
        assert!(loader.sources().is_empty());
        assert_eq!(
            loader.tier_of("analysis.gap_threshold"),
            Some(ConfigTier::Defaults)
        );
    }

    #[test]
    fn test_user_config_overrides_project() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("skill-graph");
        let user_dir = temp.path().join("user");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::create_dir_all(&user_dir).unwrap();

        std::fs::write(
            project_dir.join("config.yaml"),
            "analysis:\n  gap_threshold: 4\n  impact_window_days: 14\n",
        )
        .unwrap();
        std::fs::write(user_dir.join("config.yaml"), "analysis:\n  gap_threshold: 6\n").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), Some(user_dir));
        let loader = ConfigLoader::load_with(paths, no_env).unwrap();
        let config = loader.config();

        assert_eq!(config.analysis.gap_threshold, 6);
        assert_eq!(config.analysis.impact_window_days, 14);
        assert_eq!(loader.sources().len(), 2);
        assert_eq!(loader.tier_of("analysis.gap_threshold"), Some(ConfigTier::User));
        assert_eq!(
            loader.tier_of("analysis.impact_window_days"),
            Some(ConfigTier::Project)
        );
    }

    #[test]
    fn test_environment_wins() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("skill-graph");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "store:\n  db_path: project.db\n").unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("SKILL_GRAPH_DB_PATH", "env.db"),
            ("SKILL_GRAPH_MODE", "demo"),
            ("SKILL_GRAPH_STALE_HOURS", "not-a-number"),
        ]);
        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        let loader =
            ConfigLoader::load_with(paths, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(loader.config().store.db_path, PathBuf::from("env.db"));
        assert_eq!(loader.config().store.mode, SourceMode::Demo);
        assert_eq!(loader.config().analysis.stale_threshold_hours, 2.0);
        assert_eq!(loader.tier_of("store.db_path"), Some(ConfigTier::Environment));
    }

    #[test]
    fn test_explicit_path_replaces_tiers() {
        let temp = TempDir::new().unwrap();
        let explicit = temp.path().join("custom.yaml");
        std::fs::write(&explicit, "tasks:\n  default_limit: 25\n").unwrap();
        let explicit_str = explicit.to_string_lossy().to_string();

        let paths = ConfigPaths::with_dirs(None, None);
        let loader = ConfigLoader::load_with(paths, |k| {
            (k == "SKILL_GRAPH_CONFIG_PATH").then(|| explicit_str.clone())
        })
        .unwrap();

        assert_eq!(loader.config().tasks.default_limit, 25);
        assert_eq!(loader.sources(), &[explicit]);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let paths = ConfigPaths::with_dirs(None, None);
        let result = ConfigLoader::load_with(paths, |k| {
            (k == "SKILL_GRAPH_CONFIG_PATH").then(|| "/nonexistent/skill-graph.yaml".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("skill-graph");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "analysis:\n  trend_months: 0\n").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        assert!(ConfigLoader::load_with(paths, no_env).is_err());
    }
}
