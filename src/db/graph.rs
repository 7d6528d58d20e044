//! Edge merges between files, skills, resources and commits.

use super::commits::fetch_commit;
use super::tasks::task_exists;
use super::{Database, ensure_file, ensure_skill};
use crate::classifier::normalize_skill;
use crate::error::ToolError;
use crate::types::{LearningResource, NewResource};
use anyhow::Result;
use rusqlite::{Connection, params};
use tracing::debug;
use uuid::Uuid;

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ToolError::missing_field(field).into());
    }
    Ok(trimmed.to_string())
}

fn required_skill(field: &str, value: &str) -> Result<String> {
    normalize_skill(value).ok_or_else(|| ToolError::missing_field(field).into())
}

pub(crate) fn resources_for_skill(conn: &Connection, skill: &str) -> Result<Vec<LearningResource>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.title, r.url
         FROM learning_resources r
         INNER JOIN resource_skills rs ON rs.resource_id = r.id
         WHERE rs.skill = ?1
         ORDER BY r.title, r.id",
    )?;
    let resources = stmt
        .query_map(params![skill], |row| {
            Ok(LearningResource {
                id: row.get(0)?,
                title: row.get(1)?,
                url: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(resources)
}

impl Database {
    /// Merge `file IMPORTS imported`. Returns false when the edge existed.
    pub fn add_file_import(&self, file: &str, imported: &str) -> Result<bool> {
        let file = required("file", file)?;
        let imported = required("imports", imported)?;
        self.transaction(|tx| {
            ensure_file(tx, &file)?;
            ensure_file(tx, &imported)?;
            let created = tx.execute(
                "INSERT OR IGNORE INTO file_imports (file_name, imports_name) VALUES (?1, ?2)",
                params![file, imported],
            )? == 1;
            debug!(file = %file, imports = %imported, created, "Import merged");
            Ok(created)
        })
    }

    /// Merge `prerequisite PREREQUISITE_OF skill`.
    pub fn add_skill_prerequisite(&self, prerequisite: &str, skill: &str) -> Result<bool> {
        let prerequisite = required_skill("prerequisite", prerequisite)?;
        let skill = required_skill("skill", skill)?;
        if prerequisite == skill {
            return Err(ToolError::invalid_value(
                "prerequisite",
                "a skill cannot be its own prerequisite",
            )
            .into());
        }
        self.transaction(|tx| {
            ensure_skill(tx, &prerequisite)?;
            ensure_skill(tx, &skill)?;
            let created = tx.execute(
                "INSERT OR IGNORE INTO skill_prerequisites (prerequisite, skill) VALUES (?1, ?2)",
                params![prerequisite, skill],
            )? == 1;
            debug!(prerequisite = %prerequisite, skill = %skill, created, "Prerequisite merged");
            Ok(created)
        })
    }

    /// Upsert a learning resource and the skills it teaches.
    pub fn add_learning_resource(&self, input: NewResource) -> Result<LearningResource> {
        let title = required("title", &input.title)?;
        let id = input
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let url = input.url.filter(|u| !u.trim().is_empty());
        let skills: Vec<String> = input.skills.iter().filter_map(|s| normalize_skill(s)).collect();

        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO learning_resources (id, title, url) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET title = excluded.title, url = excluded.url",
                params![id, title, url],
            )?;
            for skill in &skills {
                ensure_skill(tx, skill)?;
                tx.execute(
                    "INSERT OR IGNORE INTO resource_skills (resource_id, skill) VALUES (?1, ?2)",
                    params![id, skill],
                )?;
            }
            Ok(())
        })?;

        Ok(LearningResource { id, title, url })
    }

    /// Merge `commit IMPLEMENTS task`. Both ends must exist.
    pub fn link_commit_to_task(&self, hash: &str, task_id: &str) -> Result<bool> {
        self.transaction(|tx| {
            let commit = fetch_commit(tx, hash)?.ok_or_else(|| ToolError::commit_not_found(hash))?;
            if !task_exists(tx, task_id)? {
                return Err(ToolError::task_not_found(task_id).into());
            }
            let created = tx.execute(
                "INSERT OR IGNORE INTO commit_tasks (commit_hash, task_id) VALUES (?1, ?2)",
                params![hash, task_id],
            )? == 1;
            tx.execute(
                "UPDATE tasks SET last_activity = ?1
                 WHERE id = ?2 AND (last_activity IS NULL OR last_activity < ?1)",
                params![commit.timestamp.timestamp_millis(), task_id],
            )?;
            Ok(created)
        })
    }
}
