//! Skill graph queries and knowledge gap detection.

use super::Database;
use super::graph::resources_for_skill;
use crate::classifier::normalize_skill;
use crate::levels::level_from_completion;
use crate::types::{KnowledgeGap, SkillLevel, SkillPathEntry, SkillSummary};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;

/// Default demonstration count below which a required skill is a gap.
pub const DEFAULT_GAP_THRESHOLD: i64 = 3;

fn string_column(conn: &Connection, sql: &str, key: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let values = stmt
        .query_map(params![key], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(values)
}

fn count(conn: &Connection, sql: &str, key: &str) -> Result<i64> {
    Ok(conn.query_row(sql, params![key], |row| row.get(0))?)
}

impl Database {
    /// Skills needed by pending work but demonstrated by fewer than
    /// `threshold` commits, fewest first.
    pub fn find_knowledge_gaps(&self, threshold: i64) -> Result<Vec<KnowledgeGap>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT ts.skill, COUNT(DISTINCT cs.commit_hash) AS demonstrations
                 FROM task_skills ts
                 INNER JOIN tasks t ON t.id = ts.task_id
                 LEFT JOIN commit_skills cs ON cs.skill = ts.skill
                 WHERE t.status = 'pending'
                 GROUP BY ts.skill
                 HAVING demonstrations < ?1
                 ORDER BY demonstrations ASC, ts.skill ASC",
            )?;
            let candidates = stmt
                .query_map(params![threshold], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut gaps = Vec::with_capacity(candidates.len());
            for (skill, demonstrations) in candidates {
                let required_by = string_column(
                    conn,
                    "SELECT t.id FROM tasks t
                     INNER JOIN task_skills ts ON ts.task_id = t.id
                     WHERE ts.skill = ?1 AND t.status = 'pending'
                     ORDER BY t.start_time, t.id",
                    &skill,
                )?;
                let resources = resources_for_skill(conn, &skill)?;
                gaps.push(KnowledgeGap {
                    skill,
                    demonstrations,
                    required_by,
                    resources,
                });
            }
            Ok(gaps)
        })
    }

    /// The skill and everything it transitively requires, prerequisites first.
    ///
    /// Unknown skills yield an empty path.
    pub fn get_skill_path(&self, skill: &str) -> Result<Vec<SkillPathEntry>> {
        let Some(start) = normalize_skill(skill) else {
            return Ok(Vec::new());
        };

        self.with_conn(|conn| {
            let known: Option<i64> = conn
                .query_row("SELECT 1 FROM skills WHERE name = ?1", params![start], |r| {
                    r.get(0)
                })
                .optional()?;
            if known.is_none() {
                return Ok(Vec::new());
            }

            let mut stmt = conn.prepare(
                "SELECT prerequisite FROM skill_prerequisites WHERE skill = ?1
                 ORDER BY prerequisite DESC",
            )?;

            let mut path = Vec::new();
            let mut visited: HashSet<String> = HashSet::new();
            // (skill, depth, children already pushed)
            let mut stack: Vec<(String, usize, bool)> = vec![(start, 0, false)];

            while let Some((current, depth, expanded)) = stack.pop() {
                if expanded {
                    path.push(SkillPathEntry {
                        skill: current,
                        depth,
                    });
                    continue;
                }
                if !visited.insert(current.clone()) {
                    continue;
                }
                let prerequisites = stmt
                    .query_map(params![&current], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                stack.push((current, depth, true));
                for prerequisite in prerequisites {
                    if !visited.contains(&prerequisite) {
                        stack.push((prerequisite, depth + 1, false));
                    }
                }
            }

            Ok(path)
        })
    }

    /// One-hop summary of every skill node.
    pub fn get_skill_graph(&self) -> Result<Vec<SkillSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM skills ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;

            let mut summaries = Vec::with_capacity(names.len());
            for name in names {
                summaries.push(SkillSummary {
                    commit_count: count(
                        conn,
                        "SELECT COUNT(*) FROM commit_skills WHERE skill = ?1",
                        &name,
                    )?,
                    task_count: count(
                        conn,
                        "SELECT COUNT(*) FROM task_skills WHERE skill = ?1",
                        &name,
                    )?,
                    file_count: count(
                        conn,
                        "SELECT COUNT(DISTINCT cf.file_name)
                         FROM commit_files cf
                         INNER JOIN commit_skills cs ON cs.commit_hash = cf.commit_hash
                         WHERE cs.skill = ?1",
                        &name,
                    )?,
                    prerequisites: string_column(
                        conn,
                        "SELECT prerequisite FROM skill_prerequisites WHERE skill = ?1
                         ORDER BY prerequisite",
                        &name,
                    )?,
                    enables: string_column(
                        conn,
                        "SELECT skill FROM skill_prerequisites WHERE prerequisite = ?1
                         ORDER BY skill",
                        &name,
                    )?,
                    name,
                });
            }
            Ok(summaries)
        })
    }

    /// Completion-derived level for every skill, highest first.
    pub fn get_skill_levels(&self) -> Result<Vec<SkillLevel>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.name,
                        COUNT(t.id) AS total,
                        COALESCE(SUM(CASE WHEN t.status = 'completed' THEN 1 ELSE 0 END), 0)
                            AS completed
                 FROM skills s
                 LEFT JOIN task_skills ts ON ts.skill = s.name
                 LEFT JOIN tasks t ON t.id = ts.task_id
                 GROUP BY s.name",
            )?;
            let mut levels = stmt
                .query_map([], |row| {
                    let total: i64 = row.get(1)?;
                    let completed: i64 = row.get(2)?;
                    Ok(SkillLevel {
                        skill: row.get(0)?,
                        level: level_from_completion(completed, total),
                        completed_tasks: completed,
                        total_tasks: total,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            levels.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.skill.cmp(&b.skill)));
            Ok(levels)
        })
    }
}
