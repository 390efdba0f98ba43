// src/stats/mod.rs
//! Dashboard statistics.
//!
//! Every report is read from its precomputed view first. When the view cannot
//! be read the same report is recomputed from the tables, so callers only see
//! an error if both paths fail.

pub mod fallback;
pub mod handlers;
pub mod observer;
pub mod reports;
pub mod source;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use strum::{AsRefStr, Display};

pub use fallback::FallbackEngine;
pub use observer::{ReportObserver, TracingObserver};
pub use reports::{
    EquipmentSummary, MaintenanceDetail, ReportKind, StatsEnvelope, SystemStats, DETAIL_LIMIT,
    PENDING_WINDOW_DAYS, SUMMARY_LIMIT,
};
pub use source::{Attempt, OptimizedSource, ViewSource};

use crate::error::ApiResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportOrigin {
    Optimized,
    Fallback,
}

/// A report together with the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub data: T,
    pub origin: ReportOrigin,
}

#[derive(Clone)]
pub struct StatsService {
    optimized: Arc<dyn OptimizedSource>,
    fallback: FallbackEngine,
    observers: Vec<Arc<dyn ReportObserver>>,
}

impl StatsService {
    /// Views first, tables second, with log output.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_source(Arc::new(ViewSource::new(pool.clone())), FallbackEngine::new(pool))
            .with_observer(Arc::new(TracingObserver))
    }

    pub fn with_source(optimized: Arc<dyn OptimizedSource>, fallback: FallbackEngine) -> Self {
        Self {
            optimized,
            fallback,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ReportObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub async fn system_stats(&self, now: DateTime<Utc>) -> ApiResult<Sourced<SystemStats>> {
        self.read_through(
            ReportKind::SystemStats,
            self.optimized.system_stats(),
            || self.fallback.system_stats(now),
        )
            .await
    }

    pub async fn equipment_summary(&self) -> ApiResult<Sourced<Vec<EquipmentSummary>>> {
        self.read_through(
            ReportKind::EquiposSummary,
            self.optimized.equipment_summary(SUMMARY_LIMIT),
            || self.fallback.equipment_summary(SUMMARY_LIMIT),
        )
            .await
    }

    pub async fn maintenance_detail(&self, equipo_id: Option<&str>) -> ApiResult<Sourced<Vec<MaintenanceDetail>>> {
        self.read_through(
            ReportKind::MantenimientosDetalle,
            self.optimized.maintenance_detail(equipo_id, DETAIL_LIMIT),
            || self.fallback.maintenance_detail(equipo_id, DETAIL_LIMIT),
        )
            .await
    }

    pub async fn pending_maintenance(&self, now: DateTime<Utc>) -> ApiResult<Sourced<Vec<MaintenanceDetail>>> {
        self.read_through(
            ReportKind::EquiposPendientes,
            self.optimized.pending_maintenance(),
            || self.fallback.pending_maintenance(now),
        )
            .await
    }

    /// Awaits the optimized read and only builds the fallback future when the
    /// optimized source reports itself unavailable.
    async fn read_through<T, P, F, Fut>(&self, report: ReportKind, optimized: P, fallback: F) -> ApiResult<Sourced<T>>
    where
        P: Future<Output = Attempt<T>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let started = Instant::now();

        let reason = match optimized.await {
            Attempt::Ready(data) => {
                let elapsed = started.elapsed();
                self.observers.iter().for_each(|o| o.optimized_served(report, elapsed));
                return Ok(Sourced { data, origin: ReportOrigin::Optimized });
            }
            Attempt::Unavailable(reason) => reason,
        };

        self.observers.iter().for_each(|o| o.fallback_engaged(report, &reason));

        let started = Instant::now();
        match fallback().await {
            Ok(data) => {
                let elapsed = started.elapsed();
                self.observers.iter().for_each(|o| o.fallback_served(report, elapsed));
                Ok(Sourced { data, origin: ReportOrigin::Fallback })
            }
            Err(err) => {
                self.observers.iter().for_each(|o| o.fallback_failed(report, &err));
                Err(err)
            }
        }
    }
}
