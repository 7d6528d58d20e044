//! Database layer for the skill graph.

pub mod activity;
pub mod commits;
pub mod demo;
pub mod deps;
pub mod graph;
pub mod monthly;
pub mod skills;
pub mod tasks;
pub mod videos;

use crate::classifier::{PatternClassifier, SkillClassifier};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::timefmt::InstantRepr;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::{Connection, ToSql, Transaction};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// A result row keyed by column name.
pub type Row = Map<String, Value>;

/// Database handle wrapping a SQLite connection.
///
/// Cloning shares the connection. After [`Database::close`] every clone
/// fails with [`StoreError::Unavailable`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
    classifier: Arc<dyn SkillClassifier>,
}

impl Database {
    /// Open or create the database described by `config`.
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(&config.db_path).map_err(StoreError::classify)?;

        // WAL for concurrent readers
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout={};",
            config.busy_timeout_ms
        ))
        .map_err(StoreError::classify)?;

        let db = Self::from_connection(conn);
        db.run_migrations()?;

        info!(path = %config.db_path.display(), "Database opened");
        Ok(db)
    }

    /// Open an in-memory database (tests and the demo dataset).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self::from_connection(conn);
        db.run_migrations()?;

        Ok(db)
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            classifier: Arc::new(PatternClassifier::default()),
        }
    }

    /// Replace the skill classifier used by writes.
    pub fn with_classifier(mut self, classifier: Arc<dyn SkillClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn classifier(&self) -> &dyn SkillClassifier {
        self.classifier.as_ref()
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<()> {
        self.with_conn_mut(|conn| {
            let report = embedded::migrations::runner()
                .run(conn)
                .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))?;
            debug!(applied = report.applied_migrations().len(), "Migrations run");
            Ok(())
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self.lock()?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("connection closed".into()))?;
        f(conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut guard = self.lock()?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| StoreError::Unavailable("connection closed".into()))?;
        f(conn)
    }

    /// Run `f` inside one transaction, committing only if it succeeds.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    /// Parameterized query returning rows keyed by column name.
    ///
    /// Statements that return no columns yield an empty list.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let bound: Vec<Box<dyn ToSql>> = params.iter().map(bind_json).collect();
        let refs: Vec<&dyn ToSql> = bound.iter().map(|b| b.as_ref()).collect();

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

            let mut rows = stmt.query(refs.as_slice())?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = Map::new();
                for (i, name) in columns.iter().enumerate() {
                    record.insert(name.clone(), json_from_ref(row.get_ref(i)?));
                }
                out.push(record);
            }
            Ok(out)
        })
    }

    /// [`Database::execute`] deserialized into typed records.
    pub fn query_as<T: DeserializeOwned>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        self.execute(sql, params)?
            .into_iter()
            .map(|row| Ok(serde_json::from_value(Value::Object(row))?))
            .collect()
    }

    /// Drop the connection. Every later call fails with `StoreUnavailable`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| StoreError::classify(e))?;
            info!("Database closed");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

static SHARED: Mutex<Option<Arc<Database>>> = Mutex::new(None);

/// Process-wide handle, opened on first use.
pub fn shared(config: &StoreConfig) -> Result<Arc<Database>> {
    shared_with_classifier(config, Arc::new(PatternClassifier::default()))
}

/// Process-wide handle; `classifier` is installed when the handle is opened.
pub fn shared_with_classifier(
    config: &StoreConfig,
    classifier: Arc<dyn SkillClassifier>,
) -> Result<Arc<Database>> {
    let mut slot = SHARED
        .lock()
        .map_err(|_| StoreError::Unavailable("shared handle lock poisoned".into()))?;
    if let Some(db) = slot.as_ref()
        && db.is_open()
    {
        return Ok(Arc::clone(db));
    }
    let db = Arc::new(Database::connect(config)?.with_classifier(classifier));
    *slot = Some(Arc::clone(&db));
    Ok(db)
}

/// Close and forget the process-wide handle.
pub fn close_shared() -> Result<()> {
    let taken = SHARED
        .lock()
        .map_err(|_| StoreError::Unavailable("shared handle lock poisoned".into()))?
        .take();
    if let Some(db) = taken {
        db.close()?;
    }
    Ok(())
}

fn bind_json(value: &Value) -> Box<dyn ToSql> {
    match value {
        Value::Null => Box::new(rusqlite::types::Null),
        Value::Bool(b) => Box::new(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Box::new(i),
            None => Box::new(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Box::new(s.clone()),
        other => Box::new(other.to_string()),
    }
}

fn json_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(s) => json!(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => json!(b),
    }
}

/// An instant column stored as epoch milliseconds or as text.
pub(crate) struct StoredInstant(pub DateTime<Utc>);

impl FromSql for StoredInstant {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let repr = match value {
            ValueRef::Integer(ms) => InstantRepr::Millis(ms),
            ValueRef::Real(ms) => InstantRepr::Millis(ms as i64),
            ValueRef::Text(s) => InstantRepr::Text(String::from_utf8_lossy(s).to_string()),
            _ => return Err(FromSqlError::InvalidType),
        };
        repr.to_datetime()
            .map(StoredInstant)
            .ok_or(FromSqlError::InvalidType)
    }
}

pub(crate) fn get_instant(row: &rusqlite::Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    Ok(row.get::<_, StoredInstant>(column)?.0)
}

pub(crate) fn get_opt_instant(
    row: &rusqlite::Row,
    column: &str,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row.get::<_, Option<StoredInstant>>(column)?.map(|i| i.0))
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Merge a Skill node.
pub(crate) fn ensure_skill(conn: &Connection, skill: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO skills (name) VALUES (?1)",
        rusqlite::params![skill],
    )?;
    Ok(())
}

/// Merge a File node.
pub(crate) fn ensure_file(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO files (name) VALUES (?1)",
        rusqlite::params![name],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, error_code};
    use serde::Deserialize;

    #[test]
    fn test_execute_returns_keyed_rows() {
        let db = Database::open_in_memory().unwrap();
        db.execute(
            "INSERT INTO skills (name) VALUES (?1), (?2)",
            &[json!("rust"), json!("sql")],
        )
        .unwrap();

        let rows = db
            .execute("SELECT name FROM skills WHERE name = ?1", &[json!("rust")])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "rust");
    }

    #[test]
    fn test_query_as() {
        #[derive(Deserialize)]
        struct Count {
            n: i64,
        }

        let db = Database::open_in_memory().unwrap();
        let counts: Vec<Count> = db.query_as("SELECT COUNT(*) AS n FROM tasks", &[]).unwrap();
        assert_eq!(counts[0].n, 0);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.transaction(|tx| {
            tx.execute("INSERT INTO skills (name) VALUES ('rust')", [])?;
            anyhow::bail!("abort");
        });
        assert!(result.is_err());

        let rows = db.execute("SELECT name FROM skills", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_closed_store_is_unavailable() {
        let db = Database::open_in_memory().unwrap();
        let clone = db.clone();
        db.close().unwrap();

        let err = clone.execute("SELECT 1", &[]).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::StoreUnavailable));
        assert!(!clone.is_open());
    }

    #[test]
    fn test_connect_creates_parent_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = StoreConfig {
            db_path: temp.path().join("nested/dir/graph.db"),
            ..StoreConfig::default()
        };
        let db = Database::connect(&config).unwrap();
        assert!(config.db_path.exists());
        db.close().unwrap();
    }

    #[test]
    fn test_shared_handle_is_memoized_until_closed() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = StoreConfig {
            db_path: temp.path().join("shared.db"),
            ..StoreConfig::default()
        };

        let first = shared(&config).unwrap();
        let second = shared(&config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        close_shared().unwrap();
        assert!(!first.is_open());

        let reopened = shared(&config).unwrap();
        assert!(reopened.is_open());
        close_shared().unwrap();
    }
}
