//! Read-through cache over [`StatsClient`]: every live result is stored, and
//! a failed fetch falls back to the stored copy with a stale notice.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::api::{ReportRequest, StatsClient};
use super::cache::CacheStore;
use super::errors::ClientError;
use crate::stats::StatsEnvelope;

/// What the console should show for one report.
#[derive(Debug, Clone)]
pub enum DashboardView<T> {
    Live(StatsEnvelope<T>),
    Cached { envelope: StatsEnvelope<T>, notice: String },
    Empty { error: String },
}

impl<T> DashboardView<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            DashboardView::Live(envelope) | DashboardView::Cached { envelope, .. } => Some(&envelope.data),
            DashboardView::Empty { .. } => None,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        match self {
            DashboardView::Cached { notice, .. } => Some(notice.as_str()),
            _ => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, DashboardView::Live(_))
    }
}

pub struct CachedDashboard {
    client: StatsClient,
    store: Arc<dyn CacheStore>,
}

impl CachedDashboard {
    pub fn new(client: StatsClient, store: Arc<dyn CacheStore>) -> Self {
        Self { client, store }
    }

    pub async fn load<T>(&self, request: &ReportRequest) -> DashboardView<T>
    where
        T: DeserializeOwned + Serialize,
    {
        let key = request.cache_key();

        match self.client.fetch::<T>(request).await {
            Ok(envelope) => {
                if let Err(e) = self.store_envelope(&key, &envelope) {
                    warn!(key = %key, error = %e, "Failed to cache report");
                }
                DashboardView::Live(envelope)
            }
            Err(fetch_error) => {
                warn!(key = %key, error = %fetch_error, "Report fetch failed, trying cache");
                match self.cached_envelope::<T>(&key) {
                    Some(envelope) => {
                        let notice = format!(
                            "Showing cached data from {} (live fetch failed: {})",
                            envelope.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                            fetch_error
                        );
                        DashboardView::Cached { envelope, notice }
                    }
                    None => DashboardView::Empty { error: fetch_error.to_string() },
                }
            }
        }
    }

    fn store_envelope<T: Serialize>(&self, key: &str, envelope: &StatsEnvelope<T>) -> Result<(), ClientError> {
        let payload = serde_json::to_string(envelope)?;
        self.store.write(key, &payload)?;
        debug!(key = %key, "Report cached");
        Ok(())
    }

    /// Unreadable or undecodable entries count as absent.
    fn cached_envelope<T: DeserializeOwned>(&self, key: &str) -> Option<StatsEnvelope<T>> {
        let payload = match self.store.read(key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cached report");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding corrupt cache entry");
                None
            }
        }
    }
}
