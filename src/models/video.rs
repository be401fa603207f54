use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::{coerce_views, parse_published_at};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Length in seconds, when the source reports one.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub like_count: Option<u64>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedVideo {
    /// 1-based position after sorting by score.
    pub rank: usize,
    pub score: f64,
    pub highlighted: bool,
    pub video: Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// A video as an external source hands it over: counts may be strings,
/// numbers, or missing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub view_count: serde_json::Value,
    #[serde(default)]
    pub like_count: serde_json::Value,
    pub published_at: String,
}

impl VideoRecord {
    /// Counts are coerced (bad values become zero); an unparseable publish
    /// time is an error.
    pub fn into_video(self) -> Result<Video> {
        let published_at = parse_published_at(&self.published_at)?;
        let like_count = raw_count(&self.like_count).map(|raw| coerce_views(Some(&raw)));
        Ok(Video {
            url: self
                .url
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", self.id)),
            id: self.id,
            title: self.title,
            thumbnail: self.thumbnail,
            tags: self.tags,
            duration: self.duration,
            view_count: coerce_views(raw_count(&self.view_count).as_deref()),
            like_count,
            published_at,
        })
    }
}

fn raw_count(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn records_coerce_counts() {
        let records: Vec<VideoRecord> = serde_json::from_str(
            r#"[
                {"id": "a", "title": "A", "viewCount": "1200", "likeCount": 40, "publishedAt": "2025-01-01T00:00:00Z"},
                {"id": "b", "title": "B", "viewCount": -3, "publishedAt": "2025-01-02T00:00:00+02:00"},
                {"id": "c", "title": "C", "publishedAt": "2025-01-03T00:00:00Z"}
            ]"#,
        )
        .unwrap();
        let videos: Vec<Video> = records
            .into_iter()
            .map(|r| r.into_video().unwrap())
            .collect();

        assert_eq!(videos[0].view_count, 1200);
        assert_eq!(videos[0].like_count, Some(40));
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=a");
        assert_eq!(videos[1].view_count, 0);
        assert_eq!(videos[1].like_count, None);
        assert_eq!(videos[1].published_at.to_rfc3339(), "2025-01-01T22:00:00+00:00");
        assert_eq!(videos[2].view_count, 0);
    }

    #[test]
    fn records_reject_bad_publish_time() {
        let record: VideoRecord = serde_json::from_str(
            r#"{"id": "a", "title": "A", "viewCount": 5, "publishedAt": "last week"}"#,
        )
        .unwrap();
        assert!(matches!(record.into_video(), Err(AppError::InvalidInput(_))));
    }
}
