//! CLI command definitions for skill-graph-mcp
//!
//! `serve` runs the MCP server on stdio. Every other command runs one engine
//! operation through the same fallback-wrapped source and prints JSON.

use crate::source::{FallbackSource, Sourced};
use crate::timefmt::{month_id, parse_instant};
use crate::types::NewCommit;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Skill Graph MCP server and maintenance commands
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Serve the static demo dataset instead of the store
    #[arg(long, global = true)]
    pub demo: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the MCP server (default if no subcommand given)
    Serve,

    /// Compute and store skill levels for a month
    Snapshot {
        /// Month as YYYY-MM (default: current month)
        month: Option<String>,
    },

    /// Link commits to the tasks whose time window contains them
    LinkCommits,

    /// Store commits from a JSON file (an array of commit objects)
    Ingest {
        path: PathBuf,
    },

    /// Flag tasks inactive past the stale threshold and list them
    Stale {
        /// Evaluation instant (default: now)
        #[arg(long)]
        now: Option<String>,
    },

    /// Skills required by pending tasks but rarely demonstrated
    Gaps {
        #[arg(long)]
        threshold: Option<i64>,
    },

    /// Tasks ranked by how many others they transitively block
    CriticalPath {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Monthly trend for one skill
    Trend {
        skill: String,
    },
}

/// Run a non-serve command and return its JSON output.
pub fn run_command(source: &FallbackSource, command: Command) -> Result<Value> {
    match command {
        Command::Serve => bail!("serve is not a batch command"),
        Command::Snapshot { month } => {
            let month = month.unwrap_or_else(|| month_id(&Utc::now()));
            to_json(source.run("snapshot", |s| s.calculate_monthly_snapshot(&month))?)
        }
        Command::LinkCommits => to_json(source.run("link_commits", |s| s.link_commits_to_tasks())?),
        Command::Ingest { path } => {
            let commits = read_commits(&path)?;
            to_json(source.run("ingest", |s| {
                let mut created = 0usize;
                for commit in &commits {
                    if s.store_commit(commit.clone())?.created {
                        created += 1;
                    }
                }
                Ok(json!({ "read": commits.len(), "created": created }))
            })?)
        }
        Command::Stale { now } => {
            let now = match now {
                Some(raw) => parse_instant(&raw)
                    .with_context(|| format!("--now is not a valid instant: {}", raw))?,
                None => Utc::now(),
            };
            to_json(source.run("stale", |s| {
                let marked = s.mark_stale_tasks(now)?;
                let stale = s.get_stale_tasks(now)?;
                Ok(json!({ "marked": marked, "stale": stale }))
            })?)
        }
        Command::Gaps { threshold } => {
            to_json(source.run("gaps", |s| s.find_knowledge_gaps(threshold))?)
        }
        Command::CriticalPath { limit } => {
            to_json(source.run("critical_path", |s| s.get_critical_path(limit))?)
        }
        Command::Trend { skill } => {
            to_json(source.run("trend", |s| s.get_skill_improvement_trend(&skill))?)
        }
    }
}

fn to_json<T: Serialize>(sourced: Sourced<T>) -> Result<Value> {
    if sourced.is_demo {
        warn!("Output comes from the demo dataset");
    }
    Ok(serde_json::to_value(sourced)?)
}

/// Read a commit export: a JSON array of commit objects.
pub fn read_commits(path: &Path) -> Result<Vec<NewCommit>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let commits: Vec<NewCommit> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of commits", path.display()))?;
    info!(path = %path.display(), count = commits.len(), "Read commit file");
    Ok(commits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["skill-graph-mcp", "trend", "rust", "--demo", "-v"]);
        assert!(cli.demo);
        assert!(cli.verbose);
        assert_eq!(cli.log, "2");
        match cli.command {
            Some(Command::Trend { skill }) => assert_eq!(skill, "rust"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::parse_from(["skill-graph-mcp", "--database", "/tmp/g.db"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.database.as_deref(), Some("/tmp/g.db"));
    }

    #[test]
    fn test_read_commits() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"hash": "abc", "message": "fix parser", "timestamp": "2024-03-07T10:00:00Z",
                 "files": ["src/parser.rs"]}}]"#
        )
        .unwrap();

        let commits = read_commits(file.path()).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].hash, "abc");
        assert_eq!(commits[0].files, vec!["src/parser.rs"]);
        assert_eq!(commits[0].additions, 0);
    }

    #[test]
    fn test_read_commits_rejects_object() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"hash": "abc"}}"#).unwrap();
        assert!(read_commits(file.path()).is_err());
    }
}
