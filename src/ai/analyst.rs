use std::fmt::Write as _;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ChannelStats, RankedVideo, TagCount};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Videos included in the brief sent to the model.
const BRIEF_VIDEO_LIMIT: usize = 15;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Turns ranked channel data into narrative marketing analysis via Gemini.
pub struct ReportAnalyst {
    client: Client,
    api_key: String,
    model: String,
}

impl ReportAnalyst {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    pub async fn generate_analysis(
        &self,
        channel: &ChannelStats,
        videos: &[RankedVideo],
        top_tags: &[TagCount],
    ) -> Result<String> {
        let system_prompt = "You are a marketing analyst for YouTube channels. \
Write a short report on what is working, what is not, and three concrete next steps.";

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(build_brief(channel, videos, top_tags)),
                }],
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part {
                    text: Some(system_prompt.to_string()),
                }],
            }),
        };

        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_API_URL, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::GeminiApi(format!("API error: {}", error_text)));
        }

        let generated: GenerateResponse = response.json().await?;

        let text = generated
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(AppError::GeminiApi("empty response".to_string()));
        }

        Ok(text)
    }

    pub fn model_version(&self) -> &str {
        &self.model
    }
}

/// Plain-text facts handed to the model.
fn build_brief(channel: &ChannelStats, videos: &[RankedVideo], top_tags: &[TagCount]) -> String {
    let mut brief = String::new();
    let _ = writeln!(brief, "Channel: {}", channel.title);
    if let Some(subs) = channel.subscriber_count {
        let _ = writeln!(brief, "Subscribers: {}", subs);
    }
    let _ = writeln!(
        brief,
        "Total views: {} across {} videos",
        channel.view_count, channel.video_count
    );

    let _ = writeln!(brief, "\nRecent videos ranked by time-decayed popularity:");
    for ranked in videos.iter().take(BRIEF_VIDEO_LIMIT) {
        let v = &ranked.video;
        let _ = writeln!(
            brief,
            "{}. {} | {} views | {} likes | published {} | score {:.2}{}",
            ranked.rank,
            v.title,
            v.view_count,
            v.like_count.map_or_else(|| "?".to_string(), |n| n.to_string()),
            v.published_at.format("%Y-%m-%d"),
            ranked.score,
            if ranked.highlighted { " | top" } else { "" }
        );
    }

    if !top_tags.is_empty() {
        let tags: Vec<String> = top_tags
            .iter()
            .map(|t| format!("{} ({})", t.tag, t.count))
            .collect();
        let _ = writeln!(brief, "\nMost used tags among top videos: {}", tags.join(", "));
    }

    brief
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Video;
    use chrono::{TimeZone, Utc};

    #[test]
    fn brief_lists_ranked_videos_and_tags() {
        let channel = ChannelStats {
            channel_id: "UC1".to_string(),
            title: "Acme Studio".to_string(),
            avatar: None,
            subscriber_count: Some(12_000),
            view_count: 900_000,
            video_count: 42,
        };
        let videos = vec![RankedVideo {
            rank: 1,
            score: 12.5,
            highlighted: true,
            video: Video {
                id: "v1".to_string(),
                title: "Behind the scenes".to_string(),
                url: "https://www.youtube.com/watch?v=v1".to_string(),
                thumbnail: None,
                tags: vec![],
                duration: None,
                view_count: 5_000,
                like_count: None,
                published_at: Utc.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap(),
            },
        }];
        let tags = vec![TagCount {
            tag: "bts".to_string(),
            count: 3,
        }];

        let brief = build_brief(&channel, &videos, &tags);
        assert!(brief.contains("Channel: Acme Studio"));
        assert!(brief.contains("Subscribers: 12000"));
        assert!(brief.contains(
            "1. Behind the scenes | 5000 views | ? likes | published 2025-01-05 | score 12.50 | top"
        ));
        assert!(brief.contains("bts (3)"));
    }

    #[test]
    fn parses_generate_response() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Part one"},{"text":"Part two"}]}}]}"#,
        )
        .unwrap();
        let parts: Vec<String> = response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();
        assert_eq!(parts, vec!["Part one", "Part two"]);
    }
}
