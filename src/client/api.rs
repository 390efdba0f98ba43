//! HTTP client for the statistics endpoints

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::errors::ClientError;
use crate::stats::{ReportKind, StatsEnvelope};

/// One report as the client asks for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRequest {
    SystemStats,
    EquiposSummary,
    MantenimientosDetalle { equipo_id: Option<String> },
    EquiposPendientes,
}

impl ReportRequest {
    pub fn kind(&self) -> ReportKind {
        match self {
            ReportRequest::SystemStats => ReportKind::SystemStats,
            ReportRequest::EquiposSummary => ReportKind::EquiposSummary,
            ReportRequest::MantenimientosDetalle { .. } => ReportKind::MantenimientosDetalle,
            ReportRequest::EquiposPendientes => ReportKind::EquiposPendientes,
        }
    }

    /// Equipment filter in the form the server keys it by: trimmed, blank
    /// dropped, UUIDs in lowercase hyphenated form.
    fn equipment_filter(&self) -> Option<String> {
        let raw = match self {
            ReportRequest::MantenimientosDetalle { equipo_id: Some(id) } => id.trim(),
            _ => return None,
        };
        if raw.is_empty() {
            return None;
        }
        Some(
            Uuid::parse_str(raw)
                .map(|id| id.to_string())
                .unwrap_or_else(|_| raw.to_lowercase()),
        )
    }

    /// Storage key of the last good payload. Filtered detail reports get
    /// their own key per equipment.
    pub fn cache_key(&self) -> String {
        match self {
            ReportRequest::SystemStats => "dashboard_stats".to_string(),
            ReportRequest::EquiposSummary => "equipos_summary".to_string(),
            ReportRequest::MantenimientosDetalle { .. } => match self.equipment_filter() {
                Some(id) => format!("mantenimientos_detalle:{}", id),
                None => "mantenimientos_detalle".to_string(),
            },
            ReportRequest::EquiposPendientes => "equipos_pendientes".to_string(),
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        match self.equipment_filter() {
            Some(id) => vec![("equipoId", id)],
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatsClientConfig {
    /// Server root, e.g. "http://localhost:3000"
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for StatsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct LoginEnvelope {
    data: LoginData,
}

#[derive(Deserialize)]
struct LoginData {
    token: String,
}

pub struct StatsClient {
    http: reqwest::Client,
    config: StatsClientConfig,
}

impl StatsClient {
    pub fn new(config: StatsClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Exchanges credentials for a bearer token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.config.timeout))?;

        let envelope: LoginEnvelope = Self::decode(response, self.config.timeout).await?;
        Ok(envelope.data.token)
    }

    #[instrument(skip(self), fields(report = %request.kind()))]
    pub async fn fetch<T: DeserializeOwned>(&self, request: &ReportRequest) -> Result<StatsEnvelope<T>, ClientError> {
        let url = self.url(request.kind().path());
        debug!(url = %url, "GET report");

        let mut builder = self.http.get(&url).query(&request.query());
        if let Some(ref token) = self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.config.timeout))?;

        Self::decode(response, self.config.timeout).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response, timeout: Duration) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::from_reqwest(e, timeout));
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Auth(message)),
            _ => Err(ClientError::Status { status: status.as_u16(), message }),
        }
    }
}
