use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat};
use tokio::sync::Mutex;

use crate::db::KeyValueStore;
use crate::error::{AppError, Result, StorageError};
use crate::models::{CachedReport, CachedReportSummary, ChannelHistorySummary, NewReport};

use super::clock::{Clock, SystemClock};

const KEY_PREFIX: &str = "channel-report:v1:";

pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_MAX_REPORTS_PER_CHANNEL: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub max_reports_per_channel: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_reports_per_channel: DEFAULT_MAX_REPORTS_PER_CHANNEL,
        }
    }
}

/// Substrate key of one stored report: `channel-report:v1:{channel}:{timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReportKey {
    channel_id: String,
    timestamp: i64,
}

impl ReportKey {
    fn new(channel_id: &str, timestamp: i64) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            timestamp,
        }
    }

    fn encode(&self) -> String {
        format!("{KEY_PREFIX}{}:{}", self.channel_id, self.timestamp)
    }

    fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(KEY_PREFIX)?;
        let (channel_id, timestamp) = rest.rsplit_once(':')?;
        if channel_id.is_empty() {
            return None;
        }
        Some(Self {
            channel_id: channel_id.to_string(),
            timestamp: timestamp.parse().ok()?,
        })
    }
}

/// Per-channel report history: at most `max_reports_per_channel` versions per
/// channel, each readable until it is older than `ttl`.
///
/// Expiry is evaluated on every read. Expired entries stay in the substrate
/// until the next write sweeps them or `prune_expired` runs.
pub struct ReportCacheStore<S> {
    store: S,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> ReportCacheStore<S> {
    pub fn new(store: S, settings: CacheSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            settings,
            write_lock: Mutex::new(()),
        }
    }

    pub fn substrate(&self) -> &S {
        &self.store
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.settings.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    fn is_expired(&self, timestamp: i64, now: i64) -> bool {
        now.saturating_sub(timestamp) > self.ttl_millis()
    }

    async fn report_keys(&self) -> Result<Vec<ReportKey>> {
        let keys = self.store.keys().await?;
        Ok(keys.iter().filter_map(|k| ReportKey::parse(k)).collect())
    }

    /// Stores a new version for `channel_id`, stamped with the current time.
    ///
    /// A save landing on the same millisecond as (or earlier than) the
    /// channel's newest report is stamped one millisecond after it. Expired
    /// reports of every channel are removed first, then the channel's oldest
    /// versions are evicted so the new one fits under the cap. If the write
    /// fails the evicted versions are restored.
    pub async fn save(&self, channel_id: &str, report: NewReport) -> Result<CachedReport> {
        if channel_id.trim().is_empty() {
            return Err(AppError::InvalidInput("channel id must not be empty".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let now = self.clock.now_millis();

        let mut existing = Vec::new();
        let mut pruned = 0usize;
        for key in self.report_keys().await? {
            if self.is_expired(key.timestamp, now) {
                self.store.remove(&key.encode()).await?;
                pruned += 1;
            } else if key.channel_id == channel_id {
                existing.push(key);
            }
        }
        if pruned > 0 {
            tracing::debug!("Pruned {} expired reports", pruned);
        }
        existing.sort_by_key(|k| k.timestamp);

        let timestamp = existing
            .last()
            .map_or(now, |newest| now.max(newest.timestamp + 1));

        let cached = CachedReport {
            channel_id: channel_id.to_string(),
            timestamp,
            created_at: millis_to_rfc3339(timestamp)?,
            brand_name: report.brand_name,
            channel_avatar: report.channel_avatar,
            payload: report.payload,
        };

        let value = serde_json::to_string(&cached)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        // Make room under the cap before writing, keeping the evicted values
        // so a rejected write can put them back.
        let cap = self.settings.max_reports_per_channel.max(1);
        let overflow = (existing.len() + 1).saturating_sub(cap);
        let mut evicted = Vec::with_capacity(overflow);
        for oldest in existing.iter().take(overflow) {
            let key = oldest.encode();
            if let Some(raw) = self.store.get(&key).await? {
                self.store.remove(&key).await?;
                evicted.push((key, raw));
            }
            tracing::debug!(
                "Evicted report {} @ {} (cap {})",
                oldest.channel_id,
                oldest.timestamp,
                cap
            );
        }

        let key = ReportKey::new(channel_id, timestamp).encode();
        if let Err(e) = self.store.set(&key, &value).await {
            for (old_key, raw) in &evicted {
                if let Err(restore) = self.store.set(old_key, raw).await {
                    tracing::error!("Failed to restore evicted report {}: {}", old_key, restore);
                }
            }
            return Err(e.into());
        }

        Ok(cached)
    }

    /// One entry per channel with at least one live report, most recently
    /// active first.
    pub async fn list_channels(&self) -> Result<Vec<ChannelHistorySummary>> {
        let now = self.clock.now_millis();

        let mut by_channel: BTreeMap<String, Vec<ReportKey>> = BTreeMap::new();
        for key in self.report_keys().await? {
            if !self.is_expired(key.timestamp, now) {
                by_channel.entry(key.channel_id.clone()).or_default().push(key);
            }
        }

        let mut channels = Vec::with_capacity(by_channel.len());
        for (channel_id, keys) in by_channel {
            let reports = self.load_summaries(keys).await?;
            let Some(latest) = reports.first() else {
                continue;
            };
            channels.push(ChannelHistorySummary {
                channel_id,
                brand_name: latest.brand_name.clone(),
                channel_avatar: latest.channel_avatar.clone(),
                latest_timestamp: latest.timestamp,
                latest_created_at: latest.created_at.clone(),
                report_count: reports.len(),
                reports,
            });
        }

        channels.sort_by(|a, b| {
            b.latest_timestamp
                .cmp(&a.latest_timestamp)
                .then_with(|| a.channel_id.cmp(&b.channel_id))
        });
        Ok(channels)
    }

    /// Live reports for one channel, newest first.
    pub async fn list_reports_for_channel(&self, channel_id: &str) -> Result<Vec<CachedReportSummary>> {
        let now = self.clock.now_millis();
        let keys = self
            .report_keys()
            .await?
            .into_iter()
            .filter(|k| k.channel_id == channel_id && !self.is_expired(k.timestamp, now))
            .collect();
        self.load_summaries(keys).await
    }

    pub async fn get_report(&self, channel_id: &str, timestamp: i64) -> Result<CachedReport> {
        let not_found = || AppError::NotFound {
            channel_id: channel_id.to_string(),
            timestamp,
        };

        if self.is_expired(timestamp, self.clock.now_millis()) {
            return Err(not_found());
        }

        let key = ReportKey::new(channel_id, timestamp);
        let Some(raw) = self.store.get(&key.encode()).await? else {
            return Err(not_found());
        };

        match decode::<CachedReport>(&key, &raw) {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::warn!("{}", e);
                Err(not_found())
            }
        }
    }

    /// The newest live report for a channel, if any.
    pub async fn latest_report(&self, channel_id: &str) -> Result<Option<CachedReport>> {
        for summary in self.list_reports_for_channel(channel_id).await? {
            match self.get_report(channel_id, summary.timestamp).await {
                Ok(report) => return Ok(Some(report)),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Removing a report that does not exist is a no-op.
    pub async fn delete_report(&self, channel_id: &str, timestamp: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store
            .remove(&ReportKey::new(channel_id, timestamp).encode())
            .await?;
        Ok(())
    }

    /// Removes every report of every channel. Returns how many were removed.
    pub async fn clear_all(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let keys = self.report_keys().await?;
        for key in &keys {
            self.store.remove(&key.encode()).await?;
        }
        tracing::info!("Cleared {} cached reports", keys.len());
        Ok(keys.len())
    }

    /// Sweeps expired reports out of the substrate. Returns how many were removed.
    pub async fn prune_expired(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now_millis();
        let mut removed = 0;
        for key in self.report_keys().await? {
            if self.is_expired(key.timestamp, now) {
                self.store.remove(&key.encode()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Reads summaries newest first, skipping entries that vanished or fail to
    /// decode.
    async fn load_summaries(&self, mut keys: Vec<ReportKey>) -> Result<Vec<CachedReportSummary>> {
        keys.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut summaries = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(raw) = self.store.get(&key.encode()).await? else {
                continue;
            };
            match decode::<CachedReportSummary>(&key, &raw) {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::warn!("Skipping cache entry: {}", e),
            }
        }
        Ok(summaries)
    }
}

trait Keyed {
    fn channel_id(&self) -> &str;
    fn timestamp(&self) -> i64;
}

impl Keyed for CachedReport {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Keyed for CachedReportSummary {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Decodes a stored value and checks it belongs under `key`.
fn decode<T>(key: &ReportKey, raw: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned + Keyed,
{
    let corrupt = |reason: String| AppError::CorruptEntry {
        key: key.encode(),
        reason,
    };

    let value: T = serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;
    if value.channel_id() != key.channel_id || value.timestamp() != key.timestamp {
        return Err(corrupt(format!(
            "entry holds {} @ {}",
            value.channel_id(),
            value.timestamp()
        )));
    }
    Ok(value)
}

fn millis_to_rfc3339(timestamp: i64) -> Result<String> {
    DateTime::from_timestamp_millis(timestamp)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| AppError::InvalidInput(format!("timestamp {timestamp} out of range")))
}
