mod report;
mod video;

pub use report::{
    AnalysisStatus, CachedReport, CachedReportSummary, ChannelHistorySummary, ChannelReport,
    ChannelStats, NewReport,
};
pub use video::{RankedVideo, TagCount, Video, VideoRecord};
