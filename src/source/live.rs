use super::DataSource;
use crate::classifier::{PatternClassifier, SkillClassifier};
use crate::config::Config;
use crate::db::{self, Database};
use anyhow::Result;
use std::sync::Arc;

enum Handle {
    /// The process-wide handle, opened on first use.
    Shared(Arc<dyn SkillClassifier>),
    Fixed(Arc<Database>),
}

/// The configured SQLite store.
pub struct LiveSource {
    handle: Handle,
    config: Arc<Config>,
}

impl LiveSource {
    /// Use the process-wide handle for `config.store`, classifying skills
    /// with the configured pattern table.
    pub fn shared(config: Arc<Config>) -> Result<Self> {
        let classifier =
            PatternClassifier::with_overrides(&config.skills.patterns, &config.skills.extensions)?;
        Ok(Self {
            handle: Handle::Shared(Arc::new(classifier)),
            config,
        })
    }

    /// Use a specific database.
    pub fn new(db: Arc<Database>, config: Arc<Config>) -> Self {
        Self {
            handle: Handle::Fixed(db),
            config,
        }
    }
}

impl DataSource for LiveSource {
    fn database(&self) -> Result<Arc<Database>> {
        match &self.handle {
            Handle::Shared(classifier) => {
                db::shared_with_classifier(&self.config.store, Arc::clone(classifier))
            }
            Handle::Fixed(db) => Ok(Arc::clone(db)),
        }
    }

    fn config(&self) -> &Config {
        &self.config
    }
}
