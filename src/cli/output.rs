use std::fmt::Write as _;

use crate::cache::Page;
use crate::models::{
    CachedReport, CachedReportSummary, ChannelHistorySummary, ChannelReport, RankedVideo,
};

const WRAP_WIDTH: usize = 88;
const TITLE_WIDTH: usize = 48;

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{cut}…")
}

fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

pub fn render_ranked(videos: &[RankedVideo]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:>3}  {:>10}  {:>12}  {:>8}  {:<10}  Title",
        "#", "Score", "Views", "Length", "Published"
    );
    for ranked in videos {
        let v = &ranked.video;
        let marker = if ranked.highlighted { "★" } else { " " };
        let _ = writeln!(
            out,
            "{} {:>3}  {:>10.2}  {:>12}  {:>8}  {:<10}  {}",
            marker,
            ranked.rank,
            ranked.score,
            v.view_count,
            v.duration.map(format_duration).unwrap_or_default(),
            v.published_at.format("%Y-%m-%d"),
            truncate(&v.title, TITLE_WIDTH)
        );
    }
    out
}

pub fn render_history(channels: &[ChannelHistorySummary], usage: u64, quota: Option<u64>) -> String {
    let mut out = String::new();
    if channels.is_empty() {
        let _ = writeln!(out, "No cached reports.");
    }
    for channel in channels {
        let _ = writeln!(
            out,
            "{}  [{}]  {} report{}, latest {}",
            channel.brand_name,
            channel.channel_id,
            channel.report_count,
            if channel.report_count == 1 { "" } else { "s" },
            channel.latest_created_at
        );
    }
    match quota {
        Some(quota) => {
            let _ = writeln!(out, "\nStorage: {} of {} bytes used", usage, quota);
        }
        None => {
            let _ = writeln!(out, "\nStorage: {} bytes used", usage);
        }
    }
    out
}

pub fn render_report_page(channel_id: &str, page: &Page<CachedReportSummary>) -> String {
    let mut out = String::new();
    if page.total_items == 0 {
        let _ = writeln!(out, "No cached reports for {}.", channel_id);
        return out;
    }

    for report in &page.items {
        let _ = writeln!(
            out,
            "{}  {}  {}",
            report.timestamp, report.created_at, report.brand_name
        );
    }

    let mut nav = format!("Page {}/{} ({} reports)", page.page, page.total_pages, page.total_items);
    if page.has_previous() {
        nav.push_str(&format!("  prev: reports {} {}", channel_id, page.page - 1));
    }
    if page.has_next() {
        nav.push_str(&format!("  next: reports {} {}", channel_id, page.page + 1));
    }
    let _ = writeln!(out, "{}", nav);
    out
}

pub fn render_report(report: &CachedReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} [{}]", report.brand_name, report.channel_id);
    let _ = writeln!(out, "Generated {} (id {})", report.created_at, report.timestamp);

    let body: ChannelReport = match serde_json::from_value(report.payload.clone()) {
        Ok(body) => body,
        Err(_) => {
            let raw = serde_json::to_string_pretty(&report.payload).unwrap_or_default();
            let _ = writeln!(out, "\n{}", raw);
            return out;
        }
    };

    let channel = &body.channel;
    let _ = writeln!(
        out,
        "{} subscribers, {} views, {} videos",
        channel
            .subscriber_count
            .map_or_else(|| "hidden".to_string(), |n| n.to_string()),
        channel.view_count,
        channel.video_count
    );

    let _ = writeln!(out, "\nRanked videos\n{}", render_ranked(&body.videos));

    if !body.top_tags.is_empty() {
        let tags: Vec<String> = body
            .top_tags
            .iter()
            .map(|t| format!("{} ×{}", t.tag, t.count))
            .collect();
        let _ = writeln!(out, "Top tags: {}\n", tags.join(", "));
    }

    match &body.analysis {
        Some(text) => {
            let model = body.model_version.as_deref().unwrap_or("unknown model");
            let _ = writeln!(out, "Analysis ({})", model);
            for line in textwrap::wrap(text, WRAP_WIDTH) {
                let _ = writeln!(out, "{}", line);
            }
        }
        None => {
            let _ = writeln!(out, "Analysis: {}", body.status.label());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::paginate;
    use crate::models::{AnalysisStatus, ChannelStats, TagCount, Video};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ranked(rank: usize, title: &str, highlighted: bool) -> RankedVideo {
        RankedVideo {
            rank,
            score: 4.56789,
            highlighted,
            video: Video {
                id: format!("v{rank}"),
                title: title.to_string(),
                url: String::new(),
                thumbnail: None,
                tags: vec![],
                duration: Some(3725),
                view_count: 1234,
                like_count: None,
                published_at: Utc.with_ymd_and_hms(2025, 2, 3, 0, 0, 0).unwrap(),
            },
        }
    }

    #[test]
    fn ranked_rows_mark_highlights() {
        let out = render_ranked(&[ranked(1, "First", true), ranked(2, "Second", false)]);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[1].starts_with('★'));
        assert!(lines[1].contains("4.57"));
        assert!(lines[1].contains("1:02:05"));
        assert!(lines[1].contains("2025-02-03"));
        assert!(lines[2].starts_with(' '));
    }

    #[test]
    fn long_titles_are_truncated() {
        let long = "x".repeat(80);
        let out = render_ranked(&[ranked(1, &long, false)]);
        assert!(out.contains('…'));
        assert!(!out.contains(&long));
    }

    #[test]
    fn report_page_shows_navigation() {
        let summaries: Vec<CachedReportSummary> = (0..7)
            .map(|i| CachedReportSummary {
                channel_id: "UC1".to_string(),
                timestamp: i,
                created_at: format!("t{i}"),
                brand_name: "Acme".to_string(),
                channel_avatar: None,
            })
            .collect();
        let out = render_report_page("UC1", &paginate(&summaries, 2, 5));
        assert!(out.contains("Page 2/2 (7 reports)"));
        assert!(out.contains("prev: reports UC1 1"));
        assert!(!out.contains("next:"));
    }

    #[test]
    fn renders_structured_and_opaque_payloads() {
        let body = ChannelReport {
            channel: ChannelStats {
                channel_id: "UC1".to_string(),
                title: "Acme".to_string(),
                avatar: None,
                subscriber_count: None,
                view_count: 10,
                video_count: 1,
            },
            videos: vec![ranked(1, "Only", true)],
            top_tags: vec![TagCount {
                tag: "launch".to_string(),
                count: 2,
            }],
            analysis: None,
            model_version: None,
            status: AnalysisStatus::NoApiKey,
        };
        let mut report = CachedReport {
            channel_id: "UC1".to_string(),
            timestamp: 1,
            created_at: "1970-01-01T00:00:00.001Z".to_string(),
            brand_name: "Acme".to_string(),
            channel_avatar: None,
            payload: serde_json::to_value(&body).unwrap(),
        };

        let out = render_report(&report);
        assert!(out.contains("hidden subscribers"));
        assert!(out.contains("launch ×2"));
        assert!(out.contains("Analysis: no Gemini API key"));

        report.payload = json!({ "note": "legacy" });
        assert!(render_report(&report).contains("\"note\": \"legacy\""));
    }
}
