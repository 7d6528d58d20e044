//! Dependency edges, blocked-task traversal and file impact.

use super::commits::query_commits;
use super::tasks::{query_tasks, task_exists};
use super::Database;
use crate::config::DependenciesConfig;
use crate::error::ToolError;
use crate::types::{
    CriticalPathEntry, Dependency, DependencyLink, FileImpact, ImpactedFile, Task, TaskRef,
    TaskStatus,
};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

/// Tasks that directly depend on `task_id`.
fn direct_dependents(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT task_id FROM task_dependencies WHERE depends_on_id = ?1")?;
    let ids = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

/// Check if adding `task_id DEPENDS_ON depends_on_id` would create a cycle.
///
/// It would if `depends_on_id` already reaches `task_id` through DEPENDS_ON.
fn would_create_cycle(conn: &Connection, task_id: &str, depends_on_id: &str) -> Result<bool> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(depends_on_id.to_string());

    let mut stmt =
        conn.prepare("SELECT depends_on_id FROM task_dependencies WHERE task_id = ?1")?;

    while let Some(current) = queue.pop_front() {
        if current == task_id {
            return Ok(true);
        }
        if !visited.insert(current.clone()) {
            continue;
        }

        let next = stmt
            .query_map(params![&current], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        for id in next {
            if !visited.contains(&id) {
                queue.push_back(id);
            }
        }
    }

    Ok(false)
}

/// Every task with a DEPENDS_ON path to `start`, excluding `start` itself.
fn transitive_dependents(
    edges: &HashMap<String, Vec<String>>,
    start: &str,
) -> HashSet<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        for dependent in edges.get(current).into_iter().flatten() {
            if dependent != start && visited.insert(dependent.clone()) {
                queue.push_back(dependent);
            }
        }
    }

    visited
}

/// `depends_on_id -> [task_id]` for the whole graph.
fn dependents_map(conn: &Connection) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn.prepare("SELECT task_id, depends_on_id FROM task_dependencies")?;
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (task_id, depends_on_id) = row?;
        map.entry(depends_on_id).or_default().push(task_id);
    }
    Ok(map)
}

impl Database {
    /// Merge `task_id DEPENDS_ON depends_on_id`.
    pub fn add_task_dependency(
        &self,
        task_id: &str,
        depends_on_id: &str,
        config: &DependenciesConfig,
    ) -> Result<DependencyLink> {
        if task_id.trim().is_empty() {
            return Err(ToolError::missing_field("task_id").into());
        }
        if depends_on_id.trim().is_empty() {
            return Err(ToolError::missing_field("depends_on_id").into());
        }
        if task_id == depends_on_id {
            return Err(ToolError::dependency_cycle(task_id, depends_on_id).into());
        }

        let link = self.transaction(|tx| {
            for id in [task_id, depends_on_id] {
                if !task_exists(tx, id)? {
                    return Err(ToolError::task_not_found(id).into());
                }
            }
            if config.reject_cycles && would_create_cycle(tx, task_id, depends_on_id)? {
                return Err(ToolError::dependency_cycle(task_id, depends_on_id).into());
            }
            let created = tx.execute(
                "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id) VALUES (?1, ?2)",
                params![task_id, depends_on_id],
            )? == 1;
            Ok(DependencyLink {
                task_id: task_id.to_string(),
                depends_on_id: depends_on_id.to_string(),
                created,
            })
        })?;

        if link.created {
            info!(task_id, depends_on_id, "Dependency added");
        }
        Ok(link)
    }

    /// Remove a dependency. Returns false when there was none.
    pub fn remove_task_dependency(&self, task_id: &str, depends_on_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM task_dependencies WHERE task_id = ?1 AND depends_on_id = ?2",
                params![task_id, depends_on_id],
            )?;
            Ok(removed > 0)
        })
    }

    /// Get all dependency edges.
    pub fn get_all_dependencies(&self) -> Result<Vec<Dependency>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, depends_on_id FROM task_dependencies ORDER BY task_id, depends_on_id",
            )?;
            let deps = stmt
                .query_map([], |row| {
                    Ok(Dependency {
                        task_id: row.get(0)?,
                        depends_on_id: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(deps)
        })
    }

    /// Incomplete tasks that transitively depend on `task_id`, by start time.
    ///
    /// Unknown tasks and tasks nothing depends on yield an empty list.
    pub fn get_blocked_tasks(&self, task_id: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut visited: HashSet<String> = HashSet::new();
            let mut frontier: Vec<String> = vec![task_id.to_string()];

            while !frontier.is_empty() {
                let mut next = Vec::new();
                for current in &frontier {
                    for dependent in direct_dependents(conn, current)? {
                        if dependent != task_id && visited.insert(dependent.clone()) {
                            next.push(dependent);
                        }
                    }
                }
                frontier = next;
            }

            let mut blocked = Vec::new();
            for id in &visited {
                blocked.extend(query_tasks(
                    conn,
                    "SELECT * FROM tasks WHERE id = ?1 AND status != 'completed'",
                    &[id],
                )?);
            }
            blocked.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));

            debug!(task_id, blocked = blocked.len(), "Blocked tasks resolved");
            Ok(blocked)
        })
    }

    /// Incomplete tasks with at least one incomplete direct dependency.
    pub fn get_all_blocked_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "SELECT DISTINCT t.*
                 FROM tasks t
                 INNER JOIN task_dependencies d ON t.id = d.task_id
                 INNER JOIN tasks blocker ON d.depends_on_id = blocker.id
                 WHERE blocker.status != 'completed'
                 AND t.status != 'completed'
                 ORDER BY t.start_time, t.id",
                &[],
            )
        })
    }

    /// Incomplete tasks ranked by how many incomplete tasks wait on them.
    ///
    /// Tasks blocking nothing are omitted. Ties go to the earlier start, then id.
    pub fn get_critical_path(&self, limit: usize) -> Result<Vec<CriticalPathEntry>> {
        self.with_conn(|conn| {
            let edges = dependents_map(conn)?;
            let open = query_tasks(
                conn,
                "SELECT * FROM tasks WHERE status != 'completed' ORDER BY start_time, id",
                &[],
            )?;
            let open_ids: HashSet<&str> = open.iter().map(|t| t.id.as_str()).collect();

            let mut counts: HashMap<String, usize> = HashMap::new();
            for task in &open {
                let count = transitive_dependents(&edges, &task.id)
                    .iter()
                    .filter(|id| open_ids.contains(id.as_str()))
                    .count();
                counts.insert(task.id.clone(), count);
            }

            let mut entries: Vec<CriticalPathEntry> = open
                .into_iter()
                .filter_map(|task| {
                    let blocks_count = counts.get(&task.id).copied().unwrap_or(0);
                    (blocks_count > 0).then_some(CriticalPathEntry { task, blocks_count })
                })
                .collect();
            entries.sort_by(|a, b| {
                b.blocks_count
                    .cmp(&a.blocks_count)
                    .then_with(|| a.task.start_time.cmp(&b.task.start_time))
                    .then_with(|| a.task.id.cmp(&b.task.id))
            });
            entries.truncate(limit);
            Ok(entries)
        })
    }

    /// What a change to `file` touches: transitive importers, commits in
    /// the trailing window, and the tasks those commits implement.
    pub fn get_file_impact(
        &self,
        file: &str,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Result<FileImpact> {
        let file = file.trim();
        if file.is_empty() {
            return Err(ToolError::missing_field("file").into());
        }
        // Windows reaching past the representable range cover all history.
        let since = Duration::try_days(window_days.max(0))
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        self.with_conn(|conn| {
            let mut dependents = Vec::new();
            let mut visited: HashSet<String> = HashSet::new();
            let mut queue: VecDeque<(String, usize)> = VecDeque::new();
            queue.push_back((file.to_string(), 0));

            let mut stmt = conn.prepare(
                "SELECT file_name FROM file_imports WHERE imports_name = ?1 ORDER BY file_name",
            )?;
            while let Some((current, depth)) = queue.pop_front() {
                let importers = stmt
                    .query_map(params![&current], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                for importer in importers {
                    if importer != file && visited.insert(importer.clone()) {
                        dependents.push(ImpactedFile {
                            name: importer.clone(),
                            depth: depth + 1,
                        });
                        queue.push_back((importer, depth + 1));
                    }
                }
            }

            let recent_commits = query_commits(
                conn,
                "SELECT c.* FROM commits c
                 INNER JOIN commit_files cf ON cf.commit_hash = c.hash
                 WHERE cf.file_name = ?1 AND c.timestamp >= ?2 AND c.timestamp <= ?3
                 ORDER BY c.timestamp DESC, c.hash",
                &[&file, &since.timestamp_millis(), &now.timestamp_millis()],
            )?;

            let mut affected_tasks = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();
            let mut stmt = conn.prepare(
                "SELECT t.id, t.name, t.status FROM tasks t
                 INNER JOIN commit_tasks ct ON ct.task_id = t.id
                 WHERE ct.commit_hash = ?1
                 ORDER BY t.start_time, t.id",
            )?;
            for commit in &recent_commits {
                let refs = stmt
                    .query_map(params![commit.hash], |row| {
                        let status: String = row.get(2)?;
                        Ok(TaskRef {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            status: TaskStatus::from_str(&status).unwrap_or_default(),
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                for task in refs {
                    if seen.insert(task.id.clone()) {
                        affected_tasks.push(task);
                    }
                }
            }

            Ok(FileImpact {
                file: file.to_string(),
                dependents,
                recent_commits,
                affected_tasks,
            })
        })
    }
}
