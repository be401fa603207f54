use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};

pub const DEFAULT_GRAVITY: f64 = 1.8;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Time-decay popularity score, in the style of the Hacker News front page.
///
/// `score = (views + 1) / (max(1, age_hours) + 2) ^ gravity`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEngine {
    gravity: f64,
}

impl ScoreEngine {
    pub fn new(gravity: f64) -> Self {
        Self { gravity }
    }

    pub fn score(&self, views: u64, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let points = views as f64 + 1.0;
        let elapsed_ms = (now - published_at).num_milliseconds() as f64;
        // Floor at one hour; also covers timestamps in the future.
        let age_hours = (elapsed_ms / MS_PER_HOUR).max(1.0);
        points / (age_hours + 2.0).powf(self.gravity)
    }

    /// Scores against the wall clock, so repeated calls drift downwards.
    #[allow(dead_code)]
    pub fn score_now(&self, views: u64, published_at: DateTime<Utc>) -> f64 {
        self.score(views, published_at, Utc::now())
    }
}

impl Default for ScoreEngine {
    fn default() -> Self {
        Self::new(DEFAULT_GRAVITY)
    }
}

/// Normalizes a raw view count from an external source. Missing, negative and
/// unparseable values become zero.
pub fn coerce_views(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.map(str::trim) else {
        return 0;
    };
    if let Ok(n) = raw.parse::<u64>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f > 0.0 => f as u64,
        _ => 0,
    }
}

/// Parses a publish timestamp. Unlike view counts these are never guessed.
pub fn parse_published_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::InvalidInput(format!("unparseable publish time {raw:?}: {e}")))
}
