mod ranking;
mod score;

pub use ranking::{rank_videos, tag_frequency};
pub use score::{coerce_views, parse_published_at, ScoreEngine, DEFAULT_GRAVITY};
