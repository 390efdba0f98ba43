//! Console dashboard client: fetches the statistics reports over HTTP and
//! keeps the last good copy of each one on disk.

pub mod api;
pub mod cache;
pub mod dashboard;
pub mod errors;

pub use api::{ReportRequest, StatsClient, StatsClientConfig};
pub use cache::{CacheStore, FileCacheStore, MemoryCacheStore};
pub use dashboard::{CachedDashboard, DashboardView};
pub use errors::ClientError;
