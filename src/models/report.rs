use serde::{Deserialize, Serialize};

use super::{RankedVideo, TagCount};

/// One completed analysis run for one channel, as held by the report cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedReport {
    pub channel_id: String,
    /// Milliseconds since the epoch; the version key within a channel.
    pub timestamp: i64,
    /// RFC 3339 rendering of `timestamp`.
    pub created_at: String,
    pub brand_name: String,
    #[serde(default)]
    pub channel_avatar: Option<String>,
    pub payload: serde_json::Value,
}

/// A `CachedReport` without its payload. Deserializes from a full stored
/// report; the payload field is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedReportSummary {
    pub channel_id: String,
    pub timestamp: i64,
    pub created_at: String,
    pub brand_name: String,
    #[serde(default)]
    pub channel_avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelHistorySummary {
    pub channel_id: String,
    pub brand_name: String,
    pub channel_avatar: Option<String>,
    pub latest_timestamp: i64,
    pub latest_created_at: String,
    pub report_count: usize,
    /// Newest first.
    pub reports: Vec<CachedReportSummary>,
}

/// Input to `ReportCacheStore::save`; the store assigns the timestamp.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub brand_name: String,
    pub channel_avatar: Option<String>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel_id: String,
    pub title: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub subscriber_count: Option<u64>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub video_count: u64,
}

/// The payload the app stores for each analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub channel: ChannelStats,
    pub videos: Vec<RankedVideo>,
    pub top_tags: Vec<TagCount>,
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub model_version: Option<String>,
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[default]
    NotGenerated,
    Generated,
    Failed,
    NoApiKey,
}

impl AnalysisStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisStatus::NotGenerated => "not generated",
            AnalysisStatus::Generated => "generated",
            AnalysisStatus::Failed => "generation failed",
            AnalysisStatus::NoApiKey => "no Gemini API key",
        }
    }
}
