// src/stats/observer.rs
//! Hooks fired while a report is served. The facade never logs on its own;
//! everything goes through the observers it was built with.

use std::time::Duration;

use super::reports::ReportKind;
use crate::error::ApiError;

pub trait ReportObserver: Send + Sync {
    fn optimized_served(&self, _report: ReportKind, _elapsed: Duration) {}

    fn fallback_engaged(&self, _report: ReportKind, _reason: &str) {}

    fn fallback_served(&self, _report: ReportKind, _elapsed: Duration) {}

    fn fallback_failed(&self, _report: ReportKind, _error: &ApiError) {}
}

/// Structured log lines for every outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ReportObserver for TracingObserver {
    fn optimized_served(&self, report: ReportKind, elapsed: Duration) {
        tracing::debug!(
            report = %report,
            elapsed_ms = elapsed.as_millis() as u64,
            "Report served from precomputed view"
        );
    }

    fn fallback_engaged(&self, report: ReportKind, reason: &str) {
        tracing::warn!(
            report = %report,
            reason = %reason,
            "Precomputed view unavailable, recomputing from tables"
        );
    }

    fn fallback_served(&self, report: ReportKind, elapsed: Duration) {
        tracing::info!(
            report = %report,
            elapsed_ms = elapsed.as_millis() as u64,
            "Report served by fallback engine"
        );
    }

    fn fallback_failed(&self, report: ReportKind, error: &ApiError) {
        tracing::error!(
            report = %report,
            error = %error,
            "Fallback engine failed"
        );
    }
}
