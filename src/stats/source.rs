// src/stats/source.rs
//! Optimized report sources.
//!
//! An optimized source never fails the request: any error reading it is turned
//! into [`Attempt::Unavailable`], which the facade answers by recomputing the
//! report from the primitive tables.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::reports::{EquipmentSummary, MaintenanceDetail, ReportKind, SystemStats};

/// Outcome of reading a precomputed source.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Ready(T),
    Unavailable(String),
}

impl<T> Attempt<T> {
    fn from_query(report: ReportKind, result: Result<T, sqlx::Error>) -> Self {
        match result {
            Ok(data) => Attempt::Ready(data),
            Err(err) => Attempt::Unavailable(format!("{}: {}", report.view_name(), err)),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Attempt::Ready(_))
    }
}

#[async_trait]
pub trait OptimizedSource: Send + Sync {
    async fn system_stats(&self) -> Attempt<SystemStats>;

    async fn equipment_summary(&self, limit: i64) -> Attempt<Vec<EquipmentSummary>>;

    async fn maintenance_detail(&self, equipo_id: Option<&str>, limit: i64) -> Attempt<Vec<MaintenanceDetail>>;

    async fn pending_maintenance(&self) -> Attempt<Vec<MaintenanceDetail>>;
}

/// Reads the `v_*` views installed by the migrations.
#[derive(Clone)]
pub struct ViewSource {
    pool: SqlitePool,
}

impl ViewSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OptimizedSource for ViewSource {
    async fn system_stats(&self) -> Attempt<SystemStats> {
        let result = sqlx::query_as::<_, SystemStats>("SELECT * FROM v_estadisticas_sistema")
            .fetch_optional(&self.pool)
            .await;

        match Attempt::from_query(ReportKind::SystemStats, result) {
            Attempt::Ready(Some(stats)) => Attempt::Ready(stats),
            Attempt::Ready(None) => Attempt::Unavailable("v_estadisticas_sistema returned no rows".to_string()),
            Attempt::Unavailable(reason) => Attempt::Unavailable(reason),
        }
    }

    async fn equipment_summary(&self, limit: i64) -> Attempt<Vec<EquipmentSummary>> {
        let result = sqlx::query_as::<_, EquipmentSummary>(
            "SELECT * FROM v_equipos_resumen ORDER BY nombre ASC, id ASC LIMIT ?"
        )
            .bind(limit)
            .fetch_all(&self.pool)
            .await;
        Attempt::from_query(ReportKind::EquiposSummary, result)
    }

    async fn maintenance_detail(&self, equipo_id: Option<&str>, limit: i64) -> Attempt<Vec<MaintenanceDetail>> {
        let result = match equipo_id {
            Some(equipo_id) => {
                sqlx::query_as::<_, MaintenanceDetail>(
                    r#"SELECT * FROM v_mantenimientos_detalle
                       WHERE equipo_id = ?
                       ORDER BY julianday(fecha) DESC, id ASC
                       LIMIT ?"#
                )
                    .bind(equipo_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, MaintenanceDetail>(
                    r#"SELECT * FROM v_mantenimientos_detalle
                       ORDER BY julianday(fecha) DESC, id ASC
                       LIMIT ?"#
                )
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        };
        Attempt::from_query(ReportKind::MantenimientosDetalle, result)
    }

    async fn pending_maintenance(&self) -> Attempt<Vec<MaintenanceDetail>> {
        let result = sqlx::query_as::<_, MaintenanceDetail>(
            r#"SELECT * FROM v_equipos_mantenimiento_pendiente
               ORDER BY julianday(fecha_proximo_manto) ASC, id ASC"#
        )
            .fetch_all(&self.pool)
            .await;
        Attempt::from_query(ReportKind::EquiposPendientes, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::drop_report_views;
    use crate::models::{Estado, Rol};
    use crate::test_support::*;
    use chrono::{Duration, Utc};

    #[actix_rt::test]
    async fn test_missing_views_are_unavailable_not_errors() {
        let pool = memory_pool(false).await;
        let source = ViewSource::new(pool);

        match source.system_stats().await {
            Attempt::Unavailable(reason) => assert!(reason.contains("v_estadisticas_sistema")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
        assert!(!source.equipment_summary(10).await.is_ready());
        assert!(!source.maintenance_detail(None, 20).await.is_ready());
        assert!(!source.maintenance_detail(Some("x"), 20).await.is_ready());
        assert!(!source.pending_maintenance().await.is_ready());
    }

    #[actix_rt::test]
    async fn test_views_serve_reports() {
        let pool = memory_pool(true).await;
        let tecnico = insert_user(&pool, "tecnico@hospital.com", Rol::Tecnico, Estado::Activo).await;
        let monitor = insert_equipment(&pool, "Monitor", Estado::Activo).await;
        insert_equipment(&pool, "Baja", Estado::Inactivo).await;
        let now = Utc::now();
        insert_maintenance(&pool, &monitor, &tecnico, now - Duration::days(1), Some(now + Duration::days(5)), Estado::Activo).await;
        insert_maintenance(&pool, &monitor, &tecnico, now - Duration::days(3), Some(now + Duration::days(90)), Estado::Activo).await;

        let source = ViewSource::new(pool.clone());

        let stats = match source.system_stats().await {
            Attempt::Ready(stats) => stats,
            other => panic!("expected Ready, got {:?}", other),
        };
        assert_eq!(stats.total_equipos, 2);
        assert_eq!(stats.equipos_activos, 1);
        assert_eq!(stats.total_mantenimientos, 2);
        assert_eq!(stats.mantenimientos_pendientes, 1);

        match source.equipment_summary(10).await {
            Attempt::Ready(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].total_mantenimientos, 2);
            }
            other => panic!("expected Ready, got {:?}", other),
        }

        match source.pending_maintenance().await {
            Attempt::Ready(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].equipo_nombre, "Monitor");
            }
            other => panic!("expected Ready, got {:?}", other),
        }

        drop_report_views(&pool).await.unwrap();
        assert!(!source.system_stats().await.is_ready());
    }
}
