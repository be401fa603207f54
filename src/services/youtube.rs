use std::sync::OnceLock;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::analytics::{coerce_views, parse_published_at};
use crate::error::{AppError, Result};
use crate::models::{ChannelStats, Video};

const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
const MAX_IDS_PER_REQUEST: usize = 50;

/// How a user named a channel on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    Handle(String),
}

impl ChannelRef {
    /// Accepts a raw channel id (`UC...`), a handle (`@name`), or a channel
    /// URL in either `/channel/<id>` or `/@handle` form.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AppError::InvalidInput("channel must not be empty".to_string()));
        }

        if input.starts_with("http://") || input.starts_with("https://") {
            let url = Url::parse(input)
                .map_err(|e| AppError::InvalidInput(format!("bad channel URL {input:?}: {e}")))?;
            let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
            return match (segments.next(), segments.next()) {
                (Some("channel"), Some(id)) => Ok(ChannelRef::Id(id.to_string())),
                (Some(handle), _) if handle.starts_with('@') && handle.len() > 1 => {
                    Ok(ChannelRef::Handle(handle.to_string()))
                }
                _ => Err(AppError::InvalidInput(format!(
                    "unrecognized channel URL {input:?}"
                ))),
            };
        }

        if let Some(handle) = input.strip_prefix('@') {
            if handle.is_empty() {
                return Err(AppError::InvalidInput("empty channel handle".to_string()));
            }
            return Ok(ChannelRef::Handle(input.to_string()));
        }

        Ok(ChannelRef::Id(input.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: Option<ChannelStatistics>,
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    view_count: Option<String>,
    subscriber_count: Option<String>,
    #[serde(default)]
    hidden_subscriber_count: bool,
    video_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(default)]
    statistics: Option<VideoStatistics>,
    #[serde(default)]
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    published_at: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        self.high.or(self.medium).or(self.default).map(|t| t.url)
    }
}

/// A channel plus the id of its uploads playlist.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub stats: ChannelStats,
    pub uploads_playlist: String,
}

pub struct YouTubeClient {
    client: Client,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("channel-insights/1.0")
            .build()?;
        Ok(Self { client, api_key })
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(format!("{}/{}", YOUTUBE_API_URL, endpoint))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::YouTubeApi(format!("HTTP {}: {}", status, error_text)));
        }

        Ok(response.json().await?)
    }

    pub async fn fetch_channel(&self, channel: &ChannelRef) -> Result<ChannelInfo> {
        let selector = match channel {
            ChannelRef::Id(id) => ("id", id.as_str()),
            ChannelRef::Handle(handle) => ("forHandle", handle.as_str()),
        };

        let response: ListResponse<ChannelItem> = self
            .get(
                "channels",
                &[("part", "snippet,statistics,contentDetails"), selector],
            )
            .await?;

        let item = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| AppError::YouTubeApi(format!("channel not found: {:?}", channel)))?;

        let stats = item.statistics;
        Ok(ChannelInfo {
            stats: ChannelStats {
                channel_id: item.id,
                title: item.snippet.title,
                avatar: item.snippet.thumbnails.and_then(Thumbnails::best),
                subscriber_count: stats
                    .as_ref()
                    .filter(|s| !s.hidden_subscriber_count)
                    .and_then(|s| s.subscriber_count.as_deref())
                    .map(|raw| coerce_views(Some(raw))),
                view_count: coerce_views(stats.as_ref().and_then(|s| s.view_count.as_deref())),
                video_count: coerce_views(stats.as_ref().and_then(|s| s.video_count.as_deref())),
            },
            uploads_playlist: item.content_details.related_playlists.uploads,
        })
    }

    /// Ids of the newest `limit` uploads, newest first.
    async fn recent_video_ids(&self, uploads_playlist: &str, limit: usize) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < limit {
            let page_size = (limit - ids.len()).min(MAX_IDS_PER_REQUEST).to_string();
            let mut query = vec![
                ("part", "contentDetails"),
                ("playlistId", uploads_playlist),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response: ListResponse<PlaylistItem> = self.get("playlistItems", &query).await?;
            ids.extend(response.items.into_iter().map(|i| i.content_details.video_id));

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        ids.truncate(limit);
        Ok(ids)
    }

    /// Full records for the given ids, fetched in batches of 50 with a few
    /// requests in flight.
    pub async fn fetch_videos(&self, ids: &[String]) -> Result<Vec<Video>> {
        let batches: Vec<Vec<VideoItem>> = stream::iter(ids.chunks(MAX_IDS_PER_REQUEST))
            .map(|chunk| async move {
                let joined = chunk.join(",");
                let response: ListResponse<VideoItem> = self
                    .get(
                        "videos",
                        &[("part", "snippet,statistics,contentDetails"), ("id", joined.as_str())],
                    )
                    .await?;
                tracing::debug!("Fetched {} video records", response.items.len());
                Ok::<_, AppError>(response.items)
            })
            .buffered(3)
            .try_collect()
            .await?;

        let mut videos = Vec::with_capacity(ids.len());
        for item in batches.into_iter().flatten() {
            match video_from_item(item) {
                Ok(video) => videos.push(video),
                Err(e) => tracing::warn!("Skipping video: {}", e),
            }
        }
        Ok(videos)
    }

    pub async fn fetch_recent_videos(&self, channel: &ChannelInfo, limit: usize) -> Result<Vec<Video>> {
        let ids = self.recent_video_ids(&channel.uploads_playlist, limit).await?;
        self.fetch_videos(&ids).await
    }
}

fn video_from_item(item: VideoItem) -> Result<Video> {
    let published_at = parse_published_at(&item.snippet.published_at)?;
    let stats = item.statistics;

    Ok(Video {
        url: format!("https://www.youtube.com/watch?v={}", item.id),
        id: item.id,
        title: item.snippet.title,
        thumbnail: item.snippet.thumbnails.and_then(Thumbnails::best),
        tags: item.snippet.tags,
        duration: item
            .content_details
            .and_then(|d| d.duration)
            .and_then(|d| parse_iso_duration(&d)),
        view_count: coerce_views(stats.as_ref().and_then(|s| s.view_count.as_deref())),
        like_count: stats
            .as_ref()
            .and_then(|s| s.like_count.as_deref())
            .map(|raw| coerce_views(Some(raw))),
        published_at,
    })
}

/// Parses ISO 8601 durations as YouTube reports them (`PT1H2M3S`, `P1DT5M`)
/// into seconds.
pub fn parse_iso_duration(raw: &str) -> Option<u64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("duration pattern is valid")
    });

    let caps = re.captures(raw.trim())?;
    let part = |i: usize, unit: u64| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
            * unit
    };
    Some(part(1, 86_400) + part(2, 3_600) + part(3, 60) + part(4, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_refs() {
        assert_eq!(
            ChannelRef::parse("UC_x5XG1OV2P6uZZ5FSM9Ttw").unwrap(),
            ChannelRef::Id("UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string())
        );
        assert_eq!(
            ChannelRef::parse("@GoogleDevelopers").unwrap(),
            ChannelRef::Handle("@GoogleDevelopers".to_string())
        );
        assert_eq!(
            ChannelRef::parse("https://www.youtube.com/channel/UCabc/videos").unwrap(),
            ChannelRef::Id("UCabc".to_string())
        );
        assert_eq!(
            ChannelRef::parse("https://youtube.com/@rustlang").unwrap(),
            ChannelRef::Handle("@rustlang".to_string())
        );
    }

    #[test]
    fn rejects_bad_channel_refs() {
        assert!(ChannelRef::parse("  ").is_err());
        assert!(ChannelRef::parse("@").is_err());
        assert!(ChannelRef::parse("https://www.youtube.com/watch?v=abc").is_err());
    }

    #[test]
    fn parses_iso_durations() {
        assert_eq!(parse_iso_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso_duration("PT45S"), Some(45));
        assert_eq!(parse_iso_duration("PT10M"), Some(600));
        assert_eq!(parse_iso_duration("P1DT5M"), Some(86_700));
        assert_eq!(parse_iso_duration("P0D"), Some(0));
        assert_eq!(parse_iso_duration("10 minutes"), None);
    }

    #[test]
    fn maps_video_items() {
        let item: VideoItem = serde_json::from_str(
            r#"{
                "id": "abc123",
                "snippet": {
                    "title": "Launch day",
                    "publishedAt": "2025-02-01T10:00:00Z",
                    "tags": ["launch", "product"],
                    "thumbnails": { "default": { "url": "https://i.ytimg.com/a.jpg" } }
                },
                "statistics": { "viewCount": "15230", "likeCount": "801" },
                "contentDetails": { "duration": "PT4M20S" }
            }"#,
        )
        .unwrap();

        let video = video_from_item(item).unwrap();
        assert_eq!(video.url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(video.view_count, 15_230);
        assert_eq!(video.like_count, Some(801));
        assert_eq!(video.duration, Some(260));
        assert_eq!(video.thumbnail.as_deref(), Some("https://i.ytimg.com/a.jpg"));
        assert_eq!(video.tags, vec!["launch", "product"]);
    }

    #[test]
    fn hidden_view_counts_become_zero() {
        let item: VideoItem = serde_json::from_str(
            r#"{
                "id": "x",
                "snippet": { "title": "Private stats", "publishedAt": "2025-02-01T10:00:00Z" }
            }"#,
        )
        .unwrap();
        let video = video_from_item(item).unwrap();
        assert_eq!(video.view_count, 0);
        assert_eq!(video.like_count, None);
        assert_eq!(video.duration, None);
    }
}
