// src/stats/fallback.rs
//! Recomputes every report from the primitive tables.
//!
//! Same output shapes as the views. Time-dependent reports take `now` from the
//! caller so tests can pin the clock.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use sqlx::SqlitePool;

use super::reports::{EquipmentSummary, MaintenanceDetail, SystemStats, PENDING_WINDOW_DAYS};
use crate::error::{ApiError, ApiResult};

const DETAIL_SELECT: &str = r#"
    SELECT
        m.id,
        m.equipo_id,
        m.tecnico_id,
        m.tipo_mantenimiento,
        m.fecha,
        m.fecha_proximo_manto,
        m.observaciones,
        m.estado,
        e.nombre AS equipo_nombre,
        e.marca AS equipo_marca,
        e.modelo AS equipo_modelo,
        e.ubicacion AS equipo_ubicacion,
        u.nombre AS tecnico_nombre,
        u.email AS tecnico_email
    FROM mantenimientos m
    JOIN equipos e ON e.id = m.equipo_id
    JOIN usuarios u ON u.id = m.tecnico_id
    WHERE m.estado = 'ACTIVO'
"#;

/// Half-open UTC window `[first of month, first of next month)` containing `now`.
pub fn month_window(now: DateTime<Utc>) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .ok_or_else(|| ApiError::InternalServerError(format!("Invalid month for {}", now)))?;
    let end = start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| ApiError::InternalServerError(format!("Month overflow for {}", now)))?;

    let at_midnight = |date: NaiveDate| {
        date.and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| ApiError::InternalServerError(format!("Invalid midnight for {}", date)))
    };

    Ok((at_midnight(start)?, at_midnight(end)?))
}

#[derive(Clone)]
pub struct FallbackEngine {
    pool: SqlitePool,
}

impl FallbackEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Six counts read inside one transaction so they describe the same snapshot.
    /// `mantenimientos_pendientes` is not recomputed here and is always 0.
    pub async fn system_stats(&self, now: DateTime<Utc>) -> ApiResult<SystemStats> {
        let (month_start, next_month_start) = month_window(now)?;
        let mut tx = self.pool.begin().await?;

        let total_equipos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM equipos")
            .fetch_one(&mut *tx)
            .await?;

        let equipos_activos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM equipos WHERE estado = 'ACTIVO'")
            .fetch_one(&mut *tx)
            .await?;

        let total_mantenimientos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mantenimientos")
            .fetch_one(&mut *tx)
            .await?;

        let mantenimientos_mes: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM mantenimientos
               WHERE julianday(fecha) >= julianday(?) AND julianday(fecha) < julianday(?)"#
        )
            .bind(month_start)
            .bind(next_month_start)
            .fetch_one(&mut *tx)
            .await?;

        let total_usuarios: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usuarios")
            .fetch_one(&mut *tx)
            .await?;

        let usuarios_activos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usuarios WHERE estado = 'ACTIVO'")
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(SystemStats {
            total_equipos,
            equipos_activos,
            total_mantenimientos,
            mantenimientos_mes,
            total_usuarios,
            usuarios_activos,
            mantenimientos_pendientes: 0,
        })
    }

    /// Active equipment with the number of active records and the latest record date.
    pub async fn equipment_summary(&self, limit: i64) -> ApiResult<Vec<EquipmentSummary>> {
        let rows = sqlx::query_as::<_, EquipmentSummary>(
            r#"
            SELECT
                e.id,
                e.nombre,
                e.marca,
                e.modelo,
                e.ubicacion,
                (SELECT COUNT(*) FROM mantenimientos m
                    WHERE m.equipo_id = e.id AND m.estado = 'ACTIVO') AS total_mantenimientos,
                (SELECT m.fecha FROM mantenimientos m
                    WHERE m.equipo_id = e.id AND m.estado = 'ACTIVO'
                    ORDER BY julianday(m.fecha) DESC
                    LIMIT 1) AS ultimo_mantenimiento
            FROM equipos e
            WHERE e.estado = 'ACTIVO'
            ORDER BY e.nombre ASC, e.id ASC
            LIMIT ?
            "#,
        )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    pub async fn maintenance_detail(&self, equipo_id: Option<&str>, limit: i64) -> ApiResult<Vec<MaintenanceDetail>> {
        let sql = format!(
            "{} AND (?1 IS NULL OR m.equipo_id = ?1) ORDER BY julianday(m.fecha) DESC, m.id ASC LIMIT ?2",
            DETAIL_SELECT
        );

        let rows = sqlx::query_as::<_, MaintenanceDetail>(&sql)
            .bind(equipo_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Active records whose next-due date falls in `[now, now + 30 days]`, soonest first.
    pub async fn pending_maintenance(&self, now: DateTime<Utc>) -> ApiResult<Vec<MaintenanceDetail>> {
        let until = now + Duration::days(PENDING_WINDOW_DAYS);
        let sql = format!(
            r#"{} AND m.fecha_proximo_manto IS NOT NULL
                 AND julianday(m.fecha_proximo_manto) >= julianday(?)
                 AND julianday(m.fecha_proximo_manto) <= julianday(?)
               ORDER BY julianday(m.fecha_proximo_manto) ASC, m.id ASC"#,
            DETAIL_SELECT
        );

        let rows = sqlx::query_as::<_, MaintenanceDetail>(&sql)
            .bind(now)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Estado, Rol};
    use crate::stats::reports::{DETAIL_LIMIT, SUMMARY_LIMIT};
    use crate::test_support::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_month_window() {
        let (start, end) = month_window(fixed_now()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap());

        let (start, end) = month_window(Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[actix_rt::test]
    async fn test_system_stats_from_tables() {
        let pool = memory_pool(false).await;
        let now = fixed_now();

        let admin = insert_user(&pool, "admin@hospital.com", Rol::Admin, Estado::Activo).await;
        insert_user(&pool, "baja@hospital.com", Rol::Tecnico, Estado::Inactivo).await;

        let a = insert_equipment(&pool, "Monitor", Estado::Activo).await;
        let b = insert_equipment(&pool, "Ventilador", Estado::Activo).await;
        insert_equipment(&pool, "Desfibrilador", Estado::Inactivo).await;

        // 4 records this month, including the first instant of the month
        let month_start = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        insert_maintenance(&pool, &a, &admin, month_start, None, Estado::Activo).await;
        insert_maintenance(&pool, &a, &admin, now - Duration::days(2), None, Estado::Activo).await;
        insert_maintenance(&pool, &b, &admin, now - Duration::days(5), None, Estado::Inactivo).await;
        insert_maintenance(&pool, &b, &admin, now, None, Estado::Activo).await;
        // 6 records outside the month, including the first instant of the next one
        let next_month = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
        insert_maintenance(&pool, &a, &admin, next_month, None, Estado::Activo).await;
        for days in [20, 40, 60, 80, 100] {
            insert_maintenance(&pool, &b, &admin, now - Duration::days(days), None, Estado::Activo).await;
        }

        let engine = FallbackEngine::new(pool);
        let stats = engine.system_stats(now).await.unwrap();

        assert_eq!(
            stats,
            SystemStats {
                total_equipos: 3,
                equipos_activos: 2,
                total_mantenimientos: 10,
                mantenimientos_mes: 4,
                total_usuarios: 2,
                usuarios_activos: 1,
                mantenimientos_pendientes: 0,
            }
        );
    }

    #[actix_rt::test]
    async fn test_monthly_count_stops_at_next_month() {
        let pool = memory_pool(false).await;
        let tecnico = insert_user(&pool, "tecnico@hospital.com", Rol::Tecnico, Estado::Activo).await;
        let monitor = insert_equipment(&pool, "Monitor", Estado::Activo).await;

        insert_maintenance(&pool, &monitor, &tecnico, Utc.with_ymd_and_hms(2026, 10, 5, 9, 0, 0).unwrap(), None, Estado::Activo).await;
        insert_maintenance(&pool, &monitor, &tecnico, Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap(), None, Estado::Activo).await;
        let last_instant = Utc.with_ymd_and_hms(2026, 10, 31, 23, 59, 59).unwrap() + Duration::milliseconds(999);
        insert_maintenance(&pool, &monitor, &tecnico, last_instant, None, Estado::Activo).await;

        let stats = FallbackEngine::new(pool).system_stats(fixed_now()).await.unwrap();
        assert_eq!(stats.total_mantenimientos, 3);
        assert_eq!(stats.mantenimientos_mes, 2);
    }

    #[actix_rt::test]
    async fn test_equipment_summary_counts_active_records() {
        let pool = memory_pool(false).await;
        let now = fixed_now();
        let tecnico = insert_user(&pool, "tecnico@hospital.com", Rol::Tecnico, Estado::Activo).await;

        let monitor = insert_equipment(&pool, "Monitor", Estado::Activo).await;
        let bomba = insert_equipment(&pool, "Bomba de infusión", Estado::Activo).await;
        insert_equipment(&pool, "Antiguo", Estado::Inactivo).await;

        insert_maintenance(&pool, &monitor, &tecnico, now - Duration::days(10), None, Estado::Activo).await;
        insert_maintenance(&pool, &monitor, &tecnico, now - Duration::days(1), None, Estado::Activo).await;
        insert_maintenance(&pool, &monitor, &tecnico, now, None, Estado::Inactivo).await;

        let engine = FallbackEngine::new(pool);
        let rows = engine.equipment_summary(SUMMARY_LIMIT).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].nombre, "Bomba de infusión");
        assert_eq!(rows[0].total_mantenimientos, 0);
        assert_eq!(rows[0].ultimo_mantenimiento, None);
        assert_eq!(rows[1].nombre, "Monitor");
        assert_eq!(rows[1].total_mantenimientos, 2);
        assert_eq!(rows[1].ultimo_mantenimiento, Some(now - Duration::days(1)));
        assert!(rows.iter().all(|row| row.id != bomba || row.total_mantenimientos == 0));
    }

    #[actix_rt::test]
    async fn test_equipment_summary_limit() {
        let pool = memory_pool(false).await;
        for i in 0..12 {
            insert_equipment(&pool, &format!("Equipo {:02}", i), Estado::Activo).await;
        }

        let rows = FallbackEngine::new(pool).equipment_summary(SUMMARY_LIMIT).await.unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].nombre, "Equipo 00");
        assert_eq!(rows[9].nombre, "Equipo 09");
    }

    #[actix_rt::test]
    async fn test_maintenance_detail_filter_and_order() {
        let pool = memory_pool(false).await;
        let now = fixed_now();
        let tecnico = insert_user(&pool, "tecnico@hospital.com", Rol::Tecnico, Estado::Activo).await;
        let monitor = insert_equipment(&pool, "Monitor", Estado::Activo).await;
        let bomba = insert_equipment(&pool, "Bomba", Estado::Activo).await;

        for days in 0..25 {
            insert_maintenance(&pool, &monitor, &tecnico, now - Duration::days(days), None, Estado::Activo).await;
        }
        insert_maintenance(&pool, &bomba, &tecnico, now - Duration::hours(1), None, Estado::Activo).await;
        insert_maintenance(&pool, &bomba, &tecnico, now, None, Estado::Inactivo).await;

        let engine = FallbackEngine::new(pool);

        let all = engine.maintenance_detail(None, DETAIL_LIMIT).await.unwrap();
        assert_eq!(all.len(), 20);
        assert!(all.windows(2).all(|pair| pair[0].fecha >= pair[1].fecha));
        assert!(all.iter().all(|row| row.estado == "ACTIVO"));
        assert_eq!(all[0].tecnico_email, "tecnico@hospital.com");

        let filtered = engine.maintenance_detail(Some(&bomba), DETAIL_LIMIT).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].equipo_nombre, "Bomba");
        assert_eq!(filtered[0].equipo_ubicacion, "UCI");

        let unknown = engine.maintenance_detail(Some("00000000-0000-4000-8000-000000000000"), DETAIL_LIMIT).await.unwrap();
        assert!(unknown.is_empty());
    }

    #[actix_rt::test]
    async fn test_pending_window_is_inclusive_and_ascending() {
        let pool = memory_pool(false).await;
        let now = fixed_now();
        let tecnico = insert_user(&pool, "tecnico@hospital.com", Rol::Tecnico, Estado::Activo).await;
        let monitor = insert_equipment(&pool, "Monitor", Estado::Activo).await;
        let fecha = now - Duration::days(90);

        let at_end = insert_maintenance(&pool, &monitor, &tecnico, fecha, Some(now + Duration::days(30)), Estado::Activo).await;
        let at_now = insert_maintenance(&pool, &monitor, &tecnico, fecha, Some(now), Estado::Activo).await;
        let mid = insert_maintenance(&pool, &monitor, &tecnico, fecha, Some(now + Duration::days(7)), Estado::Activo).await;
        insert_maintenance(&pool, &monitor, &tecnico, fecha, Some(now + Duration::days(31)), Estado::Activo).await;
        insert_maintenance(&pool, &monitor, &tecnico, fecha, Some(now - Duration::seconds(1)), Estado::Activo).await;
        insert_maintenance(&pool, &monitor, &tecnico, fecha, Some(now + Duration::days(3)), Estado::Inactivo).await;
        insert_maintenance(&pool, &monitor, &tecnico, fecha, None, Estado::Activo).await;

        let rows = FallbackEngine::new(pool).pending_maintenance(now).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec![at_now.as_str(), mid.as_str(), at_end.as_str()]);
    }

    #[actix_rt::test]
    async fn test_pending_window_honours_milliseconds() {
        let pool = memory_pool(false).await;
        let now = fixed_now() + Duration::milliseconds(800);
        let tecnico = insert_user(&pool, "tecnico@hospital.com", Rol::Tecnico, Estado::Activo).await;
        let monitor = insert_equipment(&pool, "Monitor", Estado::Activo).await;
        let fecha = now - Duration::days(90);

        insert_maintenance(&pool, &monitor, &tecnico, fecha, Some(now - Duration::milliseconds(500)), Estado::Activo).await;
        let later = insert_maintenance(&pool, &monitor, &tecnico, fecha, Some(now + Duration::milliseconds(150)), Estado::Activo).await;
        let sooner = insert_maintenance(&pool, &monitor, &tecnico, fecha, Some(now + Duration::milliseconds(100)), Estado::Activo).await;
        insert_maintenance(&pool, &monitor, &tecnico, fecha, Some(now + Duration::days(30) + Duration::milliseconds(1)), Estado::Activo).await;

        let rows = FallbackEngine::new(pool).pending_maintenance(now).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec![sooner.as_str(), later.as_str()]);
    }

    #[actix_rt::test]
    async fn test_detail_orders_within_the_same_second() {
        let pool = memory_pool(false).await;
        let now = fixed_now();
        let tecnico = insert_user(&pool, "tecnico@hospital.com", Rol::Tecnico, Estado::Activo).await;
        let monitor = insert_equipment(&pool, "Monitor", Estado::Activo).await;

        let earlier = insert_maintenance(&pool, &monitor, &tecnico, now + Duration::milliseconds(100), None, Estado::Activo).await;
        let latest = insert_maintenance(&pool, &monitor, &tecnico, now + Duration::milliseconds(900), None, Estado::Activo).await;
        let middle = insert_maintenance(&pool, &monitor, &tecnico, now + Duration::milliseconds(500), None, Estado::Activo).await;

        let rows = FallbackEngine::new(pool).maintenance_detail(None, DETAIL_LIMIT).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec![latest.as_str(), middle.as_str(), earlier.as_str()]);
    }
}
