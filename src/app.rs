use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::ai::ReportAnalyst;
use crate::analytics::{rank_videos, tag_frequency, ScoreEngine};
use crate::cache::{paginate, Page, ReportCacheStore};
use crate::cli::{self, Command};
use crate::config::{Config, RankingConfig};
use crate::db::{KeyValueStore, MemoryStore, SqliteStore};
use crate::error::{AppError, Result};
use crate::models::{
    AnalysisStatus, CachedReport, CachedReportSummary, ChannelReport, ChannelStats, NewReport,
    RankedVideo, Video, VideoRecord,
};
use crate::services::{ChannelRef, YouTubeClient};

pub enum AnalyzeOutcome {
    /// A live cached report was found and no fresh run was requested.
    Reused(CachedReport),
    Fresh(CachedReport),
}

pub struct App<S> {
    pub cache: ReportCacheStore<S>,
    engine: ScoreEngine,
    ranking: RankingConfig,
    page_size: usize,
    max_videos: usize,
    youtube: Option<YouTubeClient>,
    analyst: Option<ReportAnalyst>,
}

impl App<SqliteStore> {
    pub async fn open(config: &Config) -> Result<Self> {
        let store = SqliteStore::open(&config.db_path, config.cache.quota()).await?;
        Self::with_store(config, store)
    }
}

impl App<MemoryStore> {
    pub fn ephemeral(config: &Config) -> Result<Self> {
        let store = match config.cache.quota() {
            Some(quota) => MemoryStore::with_quota(quota),
            None => MemoryStore::new(),
        };
        Self::with_store(config, store)
    }
}

impl<S: KeyValueStore> App<S> {
    pub fn with_store(config: &Config, store: S) -> Result<Self> {
        let youtube = config
            .youtube_api_key
            .as_ref()
            .map(|key| YouTubeClient::new(key.clone()))
            .transpose()?;

        let analyst = config
            .gemini_api_key
            .as_ref()
            .map(|key| ReportAnalyst::new(key.clone(), config.gemini_model.clone()))
            .transpose()?;

        Ok(Self {
            cache: ReportCacheStore::new(store, config.cache.settings()),
            engine: ScoreEngine::new(config.ranking.gravity),
            ranking: config.ranking.clone(),
            page_size: config.cache.page_size,
            max_videos: config.max_videos,
            youtube,
            analyst,
        })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Help => println!("{}", cli::USAGE),

            Command::Analyze { channel, fresh } => match self.analyze(&channel, fresh).await? {
                AnalyzeOutcome::Reused(report) => {
                    println!("{}", cli::render_report(&report));
                    println!(
                        "Showing cached report from {}. Run `analyze {} --fresh` to re-analyze.",
                        report.created_at, report.channel_id
                    );
                }
                AnalyzeOutcome::Fresh(report) => {
                    println!("{}", cli::render_report(&report));
                    println!("Saved report {} for {}", report.timestamp, report.channel_id);
                }
            },

            Command::Rank { path } => {
                let ranked = self.rank_file(&path, Utc::now())?;
                print!("{}", cli::render_ranked(&ranked));
            }

            Command::History => {
                let channels = self.cache.list_channels().await?;
                let usage = self.cache.substrate().usage_bytes().await?;
                let quota = self.cache.substrate().quota_bytes();
                print!("{}", cli::render_history(&channels, usage, quota));
            }

            Command::Reports { channel_id, page } => {
                let page = self.report_page(&channel_id, page).await?;
                print!("{}", cli::render_report_page(&channel_id, &page));
            }

            Command::Show {
                channel_id,
                timestamp,
            } => {
                let report = self.cache.get_report(&channel_id, timestamp).await?;
                print!("{}", cli::render_report(&report));
            }

            Command::Delete {
                channel_id,
                timestamp,
            } => {
                self.cache.delete_report(&channel_id, timestamp).await?;
                println!("Deleted report {} for {}", timestamp, channel_id);
            }

            Command::Clear => {
                let removed = self.cache.clear_all().await?;
                println!("Removed {} cached reports", removed);
            }

            Command::Prune => {
                let removed = self.cache.prune_expired().await?;
                println!("Removed {} expired reports", removed);
            }
        }
        Ok(())
    }

    /// Reuses the newest live report for the channel unless `fresh` is set;
    /// otherwise fetches, ranks, analyzes and saves a new one.
    pub async fn analyze(&self, input: &str, fresh: bool) -> Result<AnalyzeOutcome> {
        let channel_ref = ChannelRef::parse(input)?;

        // Raw ids can be checked against the cache before any network call.
        if let (false, ChannelRef::Id(id)) = (fresh, &channel_ref) {
            if let Some(report) = self.cache.latest_report(id).await? {
                return Ok(AnalyzeOutcome::Reused(report));
            }
        }

        let youtube = self
            .youtube
            .as_ref()
            .ok_or_else(|| AppError::Config("youtube_api_key is not set".to_string()))?;

        let channel = youtube.fetch_channel(&channel_ref).await?;
        if !fresh && matches!(channel_ref, ChannelRef::Handle(_)) {
            if let Some(report) = self.cache.latest_report(&channel.stats.channel_id).await? {
                return Ok(AnalyzeOutcome::Reused(report));
            }
        }

        let videos = youtube.fetch_recent_videos(&channel, self.max_videos).await?;
        tracing::info!(
            "Fetched {} videos for {}",
            videos.len(),
            channel.stats.channel_id
        );

        let report = self.build_report(channel.stats, &videos, Utc::now()).await;
        let saved = self.save_report(report).await?;
        Ok(AnalyzeOutcome::Fresh(saved))
    }

    async fn build_report(
        &self,
        channel: ChannelStats,
        videos: &[Video],
        now: DateTime<Utc>,
    ) -> ChannelReport {
        let ranked = rank_videos(&self.engine, videos, now, self.ranking.highlight_top);
        let top_tags = tag_frequency(&self.engine, videos, self.ranking.tag_top_n, now);

        let (analysis, model_version, status) = match &self.analyst {
            None => (None, None, AnalysisStatus::NoApiKey),
            Some(analyst) if ranked.is_empty() => {
                tracing::warn!("No videos to analyze for {}", channel.channel_id);
                (None, Some(analyst.model_version().to_string()), AnalysisStatus::NotGenerated)
            }
            Some(analyst) => match analyst.generate_analysis(&channel, &ranked, &top_tags).await {
                Ok(text) => (
                    Some(text),
                    Some(analyst.model_version().to_string()),
                    AnalysisStatus::Generated,
                ),
                Err(e) => {
                    tracing::error!("Failed to generate analysis: {}", e);
                    (None, Some(analyst.model_version().to_string()), AnalysisStatus::Failed)
                }
            },
        };

        ChannelReport {
            channel,
            videos: ranked,
            top_tags,
            analysis,
            model_version,
            status,
        }
    }

    async fn save_report(&self, report: ChannelReport) -> Result<CachedReport> {
        let channel_id = report.channel.channel_id.clone();
        let new_report = NewReport {
            brand_name: report.channel.title.clone(),
            channel_avatar: report.channel.avatar.clone(),
            payload: serde_json::to_value(&report)?,
        };
        self.cache.save(&channel_id, new_report).await
    }

    /// Ranks a JSON array of video records from disk.
    pub fn rank_file(&self, path: &Path, now: DateTime<Utc>) -> Result<Vec<RankedVideo>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let records: Vec<VideoRecord> = serde_json::from_str(&content)?;
        let videos = records
            .into_iter()
            .map(VideoRecord::into_video)
            .collect::<Result<Vec<_>>>()?;
        Ok(rank_videos(&self.engine, &videos, now, self.ranking.highlight_top))
    }

    pub async fn report_page(&self, channel_id: &str, page: usize) -> Result<Page<CachedReportSummary>> {
        let reports = self.cache.list_reports_for_channel(channel_id).await?;
        Ok(paginate(&reports, page, self.page_size))
    }
}
