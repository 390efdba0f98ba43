// src/monitoring.rs
use actix_web::{web, HttpResponse};
use futures::future::{ready, LocalBoxFuture, Ready};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{atomic::{AtomicU64, Ordering}, Arc, Mutex};
use std::time::{Duration, Instant};

use crate::db::{view_exists, REPORT_VIEWS};
use crate::error::ApiError;
use crate::stats::{ReportKind, ReportObserver};
use crate::AppState;

#[derive(Debug)]
pub struct Metrics {
    pub request_count: AtomicU64,
    pub error_count: AtomicU64,
    pub optimized_reports: AtomicU64,
    pub fallback_reports: AtomicU64,
    pub fallback_failures: AtomicU64,
    pub response_times: Mutex<Vec<u64>>,
    started_at: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            optimized_reports: AtomicU64::new(0),
            fallback_reports: AtomicU64::new(0),
            fallback_failures: AtomicU64::new(0),
            response_times: Mutex::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    pub fn increment_requests(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, time_ms: u64) {
        if let Ok(mut times) = self.response_times.lock() {
            times.push(time_ms);
            if times.len() > 1000 {
                times.remove(0);
            }
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsResponse {
        let avg_response_time_ms = match self.response_times.lock() {
            Ok(times) if !times.is_empty() => times.iter().sum::<u64>() as f64 / times.len() as f64,
            _ => 0.0,
        };

        MetricsResponse {
            requests_total: self.request_count.load(Ordering::Relaxed),
            errors_total: self.error_count.load(Ordering::Relaxed),
            avg_response_time_ms,
            reports_optimized_total: self.optimized_reports.load(Ordering::Relaxed),
            reports_fallback_total: self.fallback_reports.load(Ordering::Relaxed),
            reports_failed_total: self.fallback_failures.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

/// Counts how often each report path is taken.
pub struct MetricsObserver {
    metrics: Arc<Metrics>,
}

impl MetricsObserver {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl ReportObserver for MetricsObserver {
    fn optimized_served(&self, _report: ReportKind, _elapsed: Duration) {
        self.metrics.optimized_reports.fetch_add(1, Ordering::Relaxed);
    }

    fn fallback_served(&self, _report: ReportKind, _elapsed: Duration) {
        self.metrics.fallback_reports.fetch_add(1, Ordering::Relaxed);
    }

    fn fallback_failed(&self, _report: ReportKind, _error: &ApiError) {
        self.metrics.fallback_failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub requests_total: u64,
    pub errors_total: u64,
    pub avg_response_time_ms: f64,
    pub reports_optimized_total: u64,
    pub reports_fallback_total: u64,
    pub reports_failed_total: u64,
    pub uptime_seconds: u64,
}

pub async fn health_check(metrics: web::Data<Metrics>) -> HttpResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: metrics.uptime_seconds(),
    };

    HttpResponse::Ok().json(response)
}

/// Database ping plus which report views are installed. Missing views do not
/// make the service unready, the fallback engine covers them.
pub async fn readiness_check(app_state: web::Data<Arc<AppState>>) -> HttpResponse {
    if let Err(e) = sqlx::query("SELECT 1").execute(&app_state.db_pool).await {
        log::error!("Readiness check failed: {}", e);
        return HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "not ready",
            "database": "disconnected"
        }));
    }

    let mut views = serde_json::Map::new();
    for view in REPORT_VIEWS {
        let installed = view_exists(&app_state.db_pool, view).await.unwrap_or(false);
        views.insert(view.to_string(), serde_json::Value::Bool(installed));
    }

    HttpResponse::Ok().json(serde_json::json!({
        "status": "ready",
        "database": "connected",
        "report_views": views
    }))
}

pub async fn metrics_endpoint(metrics: web::Data<Metrics>) -> HttpResponse {
    HttpResponse::Ok().json(metrics.snapshot())
}

pub struct RequestLogger {
    metrics: Arc<Metrics>,
}

impl RequestLogger {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S, B> actix_web::dev::Transform<S, actix_web::dev::ServiceRequest> for RequestLogger
where
    S: actix_web::dev::Service<
        actix_web::dev::ServiceRequest,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
    B: 'static,
{
    type Response = actix_web::dev::ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware {
            service,
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: S,
    metrics: Arc<Metrics>,
}

impl<S, B> actix_web::dev::Service<actix_web::dev::ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: actix_web::dev::Service<
        actix_web::dev::ServiceRequest,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
    B: 'static,
{
    type Response = actix_web::dev::ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: actix_web::dev::ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let metrics = self.metrics.clone();
        let method = req.method().clone();
        let path = req.path().to_string();
        let fut = self.service.call(req);

        Box::pin(async move {
            metrics.increment_requests();
            let res = fut.await;
            let elapsed = start_time.elapsed().as_millis() as u64;
            metrics.record_response_time(elapsed);

            match res {
                Ok(ref response) => {
                    let status = response.status();
                    if status.is_client_error() || status.is_server_error() {
                        metrics.increment_errors();
                    }
                    tracing::debug!(%method, %path, status = status.as_u16(), elapsed_ms = elapsed, "request finished");
                }
                Err(ref e) => {
                    metrics.increment_errors();
                    tracing::warn!(%method, %path, error = %e, "request failed");
                }
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observer_feeds_counters() {
        let metrics = Arc::new(Metrics::new());
        let observer = MetricsObserver::new(metrics.clone());

        observer.optimized_served(ReportKind::SystemStats, Duration::from_millis(3));
        observer.fallback_engaged(ReportKind::EquiposSummary, "view missing");
        observer.fallback_served(ReportKind::EquiposSummary, Duration::from_millis(9));
        observer.fallback_failed(ReportKind::EquiposPendientes, &ApiError::InternalServerError("down".into()));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.reports_optimized_total, 1);
        assert_eq!(snapshot.reports_fallback_total, 1);
        assert_eq!(snapshot.reports_failed_total, 1);
    }

    #[test]
    fn test_average_response_time() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().avg_response_time_ms, 0.0);
        metrics.record_response_time(10);
        metrics.record_response_time(30);
        assert_eq!(metrics.snapshot().avg_response_time_ms, 20.0);
    }
}
