use super::DataSource;
use crate::config::Config;
use crate::db::Database;
use crate::db::demo::demo_database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Static demo dataset in an in-memory store.
pub struct DemoSource {
    db: Arc<Database>,
    config: Arc<Config>,
}

impl DemoSource {
    /// Seed a fresh dataset anchored to `now`'s day.
    pub fn new(config: Arc<Config>, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            db: Arc::new(demo_database(now)?),
            config,
        })
    }
}

impl DataSource for DemoSource {
    fn database(&self) -> Result<Arc<Database>> {
        Ok(Arc::clone(&self.db))
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn is_demo(&self) -> bool {
        true
    }
}
