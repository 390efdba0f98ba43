// src/stats/reports.rs
//! Report rows shared by the optimized and fallback paths, plus the response envelope.
//!
//! Both paths decode into these exact types, so a report served by the fallback
//! engine always carries the same keys as one served by a view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Maximum rows in the equipment summary report.
pub const SUMMARY_LIMIT: i64 = 10;
/// Maximum rows in the maintenance detail report.
pub const DETAIL_LIMIT: i64 = 20;
/// Lookahead of the pending-maintenance report.
pub const PENDING_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    SystemStats,
    EquiposSummary,
    MantenimientosDetalle,
    EquiposPendientes,
}

impl ReportKind {
    /// Path of the report below the API root.
    pub fn path(&self) -> &'static str {
        match self {
            ReportKind::SystemStats => "/api/stats",
            ReportKind::EquiposSummary => "/api/stats/equipos-summary",
            ReportKind::MantenimientosDetalle => "/api/stats/mantenimientos-detalle",
            ReportKind::EquiposPendientes => "/api/stats/equipos-pendientes",
        }
    }

    /// Name of the precomputed view backing the report.
    pub fn view_name(&self) -> &'static str {
        match self {
            ReportKind::SystemStats => "v_estadisticas_sistema",
            ReportKind::EquiposSummary => "v_equipos_resumen",
            ReportKind::MantenimientosDetalle => "v_mantenimientos_detalle",
            ReportKind::EquiposPendientes => "v_equipos_mantenimiento_pendiente",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SystemStats {
    pub total_equipos: i64,
    pub equipos_activos: i64,
    pub total_mantenimientos: i64,
    pub mantenimientos_mes: i64,
    pub total_usuarios: i64,
    pub usuarios_activos: i64,
    pub mantenimientos_pendientes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EquipmentSummary {
    pub id: String,
    pub nombre: String,
    pub marca: String,
    pub modelo: String,
    pub ubicacion: String,
    pub total_mantenimientos: i64,
    pub ultimo_mantenimiento: Option<DateTime<Utc>>,
}

/// One active maintenance record with its equipment and technician display fields.
/// Used by both the detail report and the pending report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MaintenanceDetail {
    pub id: String,
    pub equipo_id: String,
    pub tecnico_id: String,
    pub tipo_mantenimiento: String,
    pub fecha: DateTime<Utc>,
    pub fecha_proximo_manto: Option<DateTime<Utc>>,
    pub observaciones: String,
    pub estado: String,
    pub equipo_nombre: String,
    pub equipo_marca: String,
    pub equipo_modelo: String,
    pub equipo_ubicacion: String,
    pub tecnico_nombre: String,
    pub tecnico_email: String,
}

/// `{ success, data, count?, timestamp }`. Single-object reports omit `count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsEnvelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

impl<T> StatsEnvelope<T> {
    pub fn single(data: T) -> Self {
        Self {
            success: true,
            data,
            count: None,
            timestamp: Utc::now(),
        }
    }
}

impl<T> StatsEnvelope<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        let count = data.len();
        Self {
            success: true,
            data,
            count: Some(count),
            timestamp: Utc::now(),
        }
    }
}
