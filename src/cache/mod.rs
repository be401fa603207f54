mod clock;
mod pagination;
mod store;

#[cfg(test)]
pub use clock::ManualClock;
pub use pagination::{paginate, Page, DEFAULT_PAGE_SIZE};
pub use store::{CacheSettings, ReportCacheStore, DEFAULT_MAX_REPORTS_PER_CHANNEL};
