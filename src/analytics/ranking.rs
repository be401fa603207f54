use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{RankedVideo, TagCount, Video};

use super::ScoreEngine;

/// Sorts videos by score, best first. Ties go to more views, then the newer
/// upload. The first `highlight_top` entries are flagged for display.
pub fn rank_videos(
    engine: &ScoreEngine,
    videos: &[Video],
    now: DateTime<Utc>,
    highlight_top: usize,
) -> Vec<RankedVideo> {
    let mut scored: Vec<(f64, &Video)> = videos
        .iter()
        .map(|v| (engine.score(v.view_count, v.published_at, now), v))
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| {
        sb.total_cmp(sa)
            .then_with(|| b.view_count.cmp(&a.view_count))
            .then_with(|| b.published_at.cmp(&a.published_at))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (score, video))| RankedVideo {
            rank: i + 1,
            score,
            highlighted: i < highlight_top,
            video: video.clone(),
        })
        .collect()
}

pub fn top_k(engine: &ScoreEngine, videos: &[Video], k: usize, now: DateTime<Utc>) -> Vec<RankedVideo> {
    let mut ranked = rank_videos(engine, videos, now, k);
    ranked.truncate(k);
    ranked
}

/// Counts tags across the `top_n` best-scoring videos only. Tags compare
/// case-insensitively and keep the first spelling seen.
pub fn tag_frequency(
    engine: &ScoreEngine,
    videos: &[Video],
    top_n: usize,
    now: DateTime<Utc>,
) -> Vec<TagCount> {
    let mut counts: HashMap<String, TagCount> = HashMap::new();

    for ranked in top_k(engine, videos, top_n, now) {
        for tag in &ranked.video.tags {
            let tag = tag.trim();
            if tag.is_empty() {
                continue;
            }
            counts
                .entry(tag.to_lowercase())
                .or_insert_with(|| TagCount {
                    tag: tag.to_string(),
                    count: 0,
                })
                .count += 1;
        }
    }

    let mut tags: Vec<TagCount> = counts.into_values().collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn video(id: &str, views: u64, hours_ago: i64, tags: &[&str]) -> Video {
        Video {
            id: id.to_string(),
            title: format!("Video {id}"),
            url: format!("https://www.youtube.com/watch?v={id}"),
            thumbnail: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            duration: Some(300),
            view_count: views,
            like_count: None,
            published_at: now() - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn fresh_video_outranks_old_hit() {
        let videos = vec![
            video("old", 2_000_000, 24 * 90, &[]),
            video("new", 20_000, 3, &[]),
        ];
        let ranked = rank_videos(&ScoreEngine::default(), &videos, now(), 1);
        assert_eq!(ranked[0].video.id, "new");
        assert_eq!(ranked[0].rank, 1);
        assert!(ranked[0].highlighted);
        assert_eq!(ranked[1].rank, 2);
        assert!(!ranked[1].highlighted);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn ties_break_on_views_then_recency() {
        // Both inside the one-hour floor with equal views: newer wins.
        let mut a = video("a", 10, 0, &[]);
        a.published_at = now() - Duration::minutes(50);
        let mut b = video("b", 10, 0, &[]);
        b.published_at = now() - Duration::minutes(5);
        let ranked = rank_videos(&ScoreEngine::default(), &[a, b], now(), 0);
        assert_eq!(ranked[0].video.id, "b");
        assert!(ranked.iter().all(|r| !r.highlighted));
    }

    #[test]
    fn nan_scores_fall_back_to_views() {
        let engine = ScoreEngine::new(f64::NAN);
        let videos = vec![
            video("low", 10, 5, &[]),
            video("high", 900, 5, &[]),
            video("mid", 300, 5, &[]),
        ];
        let ranked = rank_videos(&engine, &videos, now(), 0);
        let ids: Vec<&str> = ranked.iter().map(|r| r.video.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
    }

    #[test]
    fn top_k_truncates() {
        let videos: Vec<Video> = (0..8).map(|i| video(&i.to_string(), 100 * i, 10, &[])).collect();
        let top = top_k(&ScoreEngine::default(), &videos, 3, now());
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].video.id, "7");
        assert!(top.iter().all(|r| r.highlighted));
    }

    #[test]
    fn tag_frequency_only_counts_top_n() {
        let videos = vec![
            video("a", 50_000, 2, &["Rust", "tutorial"]),
            video("b", 40_000, 2, &["rust", "async"]),
            video("c", 1, 24 * 365, &["ignored", "ignored2"]),
        ];
        let tags = tag_frequency(&ScoreEngine::default(), &videos, 2, now());
        assert_eq!(tags[0], TagCount { tag: "Rust".to_string(), count: 2 });
        assert_eq!(tags.len(), 3);
        assert!(tags.iter().all(|t| !t.tag.starts_with("ignored")));
        // Equal counts sort alphabetically.
        assert_eq!(tags[1].tag, "async");
        assert_eq!(tags[2].tag, "tutorial");
    }
}
