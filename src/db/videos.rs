//! Briefing video records.

use super::{Database, now_ms};
use crate::error::ToolError;
use crate::timefmt::parse_instant;
use crate::types::{NewVideo, Video};
use anyhow::Result;
use serde_json::{Value, json};
use uuid::Uuid;

const VIDEO_COLUMNS: &str = "id, url, date, analysis, script";

/// Decode the stored analysis snapshot, keeping unparseable text as a string.
fn decode_analysis(video: &mut serde_json::Map<String, Value>) {
    if let Some(Value::String(raw)) = video.get("analysis") {
        let parsed = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
        video.insert("analysis".into(), parsed);
    }
}

impl Database {
    /// Insert or replace a video record.
    pub fn save_video(&self, input: NewVideo) -> Result<Video> {
        let url = input.url.trim().to_string();
        if url.is_empty() {
            return Err(ToolError::missing_field("url").into());
        }
        let date = parse_instant(&input.date).ok_or_else(|| {
            ToolError::invalid_value("date", &format!("date is not a valid instant: {}", input.date))
        })?;
        let id = input
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let analysis = if input.analysis.is_null() {
            json!({})
        } else {
            input.analysis
        };

        self.execute(
            "INSERT INTO videos (id, url, date, analysis, script, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                date = excluded.date,
                analysis = excluded.analysis,
                script = excluded.script",
            &[
                json!(id),
                json!(url),
                json!(date.timestamp_millis()),
                json!(analysis.to_string()),
                json!(input.script),
                json!(now_ms()),
            ],
        )?;

        self.get_video(&id)?
            .ok_or_else(|| ToolError::internal(format!("video {} vanished on write", id)).into())
    }

    /// Get a video by ID.
    pub fn get_video(&self, id: &str) -> Result<Option<Video>> {
        let videos = self.load_videos(
            &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS),
            &[json!(id)],
        )?;
        Ok(videos.into_iter().next())
    }

    /// Newest videos first.
    pub fn list_videos(&self, limit: i64) -> Result<Vec<Video>> {
        self.load_videos(
            &format!(
                "SELECT {} FROM videos ORDER BY date DESC, id LIMIT ?1",
                VIDEO_COLUMNS
            ),
            &[json!(limit.max(1))],
        )
    }

    fn load_videos(&self, sql: &str, params: &[Value]) -> Result<Vec<Video>> {
        self.execute(sql, params)?
            .into_iter()
            .map(|mut row| {
                decode_analysis(&mut row);
                Ok(serde_json::from_value(Value::Object(row))?)
            })
            .collect()
    }
}
