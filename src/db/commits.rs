//! Commit ingestion and reads.

use super::{Database, ensure_file, ensure_skill, get_instant, now_ms};
use crate::classifier::classify_commit;
use crate::error::ToolError;
use crate::timefmt::parse_instant;
use crate::types::{Commit, NewCommit, StoredCommit};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

pub fn parse_commit_row(row: &Row) -> rusqlite::Result<Commit> {
    Ok(Commit {
        hash: row.get("hash")?,
        message: row.get("message")?,
        timestamp: get_instant(row, "timestamp")?,
        author: row.get("author")?,
        branch: row.get("branch")?,
        additions: row.get("additions")?,
        deletions: row.get("deletions")?,
        files: Vec::new(),
        skills: Vec::new(),
    })
}

fn attach_edges(conn: &Connection, commit: &mut Commit) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT file_name FROM commit_files WHERE commit_hash = ?1 ORDER BY file_name",
    )?;
    commit.files = stmt
        .query_map(params![commit.hash], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    let mut stmt =
        conn.prepare("SELECT skill FROM commit_skills WHERE commit_hash = ?1 ORDER BY skill")?;
    commit.skills = stmt
        .query_map(params![commit.hash], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(())
}

pub(crate) fn fetch_commit(conn: &Connection, hash: &str) -> Result<Option<Commit>> {
    let commit = conn
        .query_row(
            "SELECT * FROM commits WHERE hash = ?1",
            params![hash],
            parse_commit_row,
        )
        .optional()?;
    match commit {
        Some(mut commit) => {
            attach_edges(conn, &mut commit)?;
            Ok(Some(commit))
        }
        None => Ok(None),
    }
}

/// Run a commit query and attach files and skills to every row.
pub(crate) fn query_commits(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Commit>> {
    let mut stmt = conn.prepare(sql)?;
    let mut commits = stmt
        .query_map(params, parse_commit_row)?
        .collect::<rusqlite::Result<Vec<Commit>>>()?;
    for commit in &mut commits {
        attach_edges(conn, commit)?;
    }
    Ok(commits)
}

impl Database {
    /// Ingest a commit.
    ///
    /// The node is created once per hash; later calls leave its fields alone
    /// but still merge file and skill edges, so re-ingesting is harmless.
    pub fn store_commit(&self, input: NewCommit) -> Result<StoredCommit> {
        let hash = input.hash.trim().to_string();
        if hash.is_empty() {
            return Err(ToolError::missing_field("hash").into());
        }
        if input.timestamp.trim().is_empty() {
            return Err(ToolError::missing_field("timestamp").into());
        }
        let timestamp = parse_instant(&input.timestamp).ok_or_else(|| {
            ToolError::invalid_value(
                "timestamp",
                &format!("timestamp is not a valid instant: {}", input.timestamp),
            )
        })?;

        let files: Vec<String> = input
            .files
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        let skills = classify_commit(self.classifier(), &input.message, &files);

        let stored = self.transaction(|tx| {
            let created = tx.execute(
                "INSERT OR IGNORE INTO commits
                    (hash, message, timestamp, author, branch, additions, deletions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    hash,
                    input.message,
                    timestamp.timestamp_millis(),
                    input.author,
                    input.branch,
                    input.additions,
                    input.deletions,
                    now_ms(),
                ],
            )? == 1;

            for file in &files {
                ensure_file(tx, file)?;
                tx.execute(
                    "INSERT OR IGNORE INTO commit_files (commit_hash, file_name) VALUES (?1, ?2)",
                    params![hash, file],
                )?;
            }
            for skill in &skills {
                ensure_skill(tx, skill)?;
                tx.execute(
                    "INSERT OR IGNORE INTO commit_skills (commit_hash, skill) VALUES (?1, ?2)",
                    params![hash, skill],
                )?;
            }

            let commit = fetch_commit(tx, &hash)?
                .ok_or_else(|| ToolError::commit_not_found(&hash))?;
            Ok(StoredCommit { commit, created })
        })?;

        if stored.created {
            info!(hash = %stored.commit.hash, files = files.len(), skills = ?skills, "Commit stored");
        } else {
            debug!(hash = %stored.commit.hash, "Commit already known, edges merged");
        }
        Ok(stored)
    }

    /// Get a commit by hash.
    pub fn get_commit(&self, hash: &str) -> Result<Option<Commit>> {
        self.with_conn(|conn| fetch_commit(conn, hash))
    }

    /// Most recent commits first.
    pub fn list_commits(&self, limit: i64) -> Result<Vec<Commit>> {
        self.with_conn(|conn| {
            query_commits(
                conn,
                "SELECT * FROM commits ORDER BY timestamp DESC, hash LIMIT ?1",
                &[&limit.max(1)],
            )
        })
    }
}
