// src/maintenance_handlers.rs - Maintenance record handlers

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_permission;
use crate::equipment_handlers::find_active_equipment;
use crate::error::{parse_uuid, ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::models::{check_next_due, CreateMaintenanceRequest, Estado, Maintenance, Rol, UpdateMaintenanceRequest};
use crate::AppState;

async fn find_active_maintenance(pool: &SqlitePool, maintenance_id: &str) -> ApiResult<Maintenance> {
    sqlx::query_as::<_, Maintenance>("SELECT * FROM mantenimientos WHERE id = ? AND estado = ?")
        .bind(maintenance_id)
        .bind(Estado::Activo)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::maintenance_not_found(maintenance_id))
}

/// Active records of one equipment, newest first.
pub async fn get_equipment_maintenance(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let equipment_id = parse_uuid(&path.into_inner(), "equipment id")?.to_string();
    let (page, limit, offset) = query.normalize();

    find_active_equipment(&app_state.db_pool, &equipment_id).await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM mantenimientos WHERE equipo_id = ? AND estado = 'ACTIVO'"
    )
        .bind(&equipment_id)
        .fetch_one(&app_state.db_pool)
        .await?;

    let records: Vec<Maintenance> = sqlx::query_as(
        r#"SELECT * FROM mantenimientos
           WHERE equipo_id = ? AND estado = 'ACTIVO'
           ORDER BY julianday(fecha) DESC, id ASC
           LIMIT ? OFFSET ?"#
    )
        .bind(&equipment_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&app_state.db_pool)
        .await?;

    Ok(HttpResponse::Ok().json(PaginatedResponse::new(records, total, page, limit)))
}

pub async fn get_maintenance(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let maintenance_id = parse_uuid(&path.into_inner(), "maintenance id")?.to_string();
    let record = find_active_maintenance(&app_state.db_pool, &maintenance_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(record)))
}

/// The caller is recorded as the technician.
pub async fn create_maintenance(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateMaintenanceRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_permission(&http_request, Rol::can_record_maintenance)?;
    request.validate()?;
    let equipment_id = parse_uuid(&request.equipo_id, "equipment id")?.to_string();

    find_active_equipment(&app_state.db_pool, &equipment_id).await?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"INSERT INTO mantenimientos
           (id, equipo_id, tecnico_id, tipo_mantenimiento, fecha, fecha_proximo_manto, observaciones, estado, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
    )
        .bind(&id)
        .bind(&equipment_id)
        .bind(&claims.sub)
        .bind(request.tipo_mantenimiento.trim())
        .bind(request.fecha)
        .bind(request.fecha_proximo_manto)
        .bind(request.observaciones.trim())
        .bind(Estado::Activo)
        .bind(now)
        .bind(now)
        .execute(&app_state.db_pool)
        .await?;

    log::info!("Maintenance {} recorded on equipment {} by {}", id, equipment_id, claims.email);

    let record = find_active_maintenance(&app_state.db_pool, &id).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        record,
        "Maintenance recorded successfully".to_string(),
    )))
}

pub async fn update_maintenance(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    update: web::Json<UpdateMaintenanceRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_permission(&http_request, Rol::can_record_maintenance)?;
    update.validate()?;
    let maintenance_id = parse_uuid(&path.into_inner(), "maintenance id")?.to_string();

    let existing = find_active_maintenance(&app_state.db_pool, &maintenance_id).await?;

    // Checked against the merged record, either date may be the one changing
    let fecha = update.fecha.unwrap_or(existing.fecha);
    let fecha_proximo_manto = update.fecha_proximo_manto.or(existing.fecha_proximo_manto);
    check_next_due(fecha, fecha_proximo_manto).map_err(|e| {
        ApiError::ValidationError(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string()),
        )
    })?;

    let tipo = update
        .tipo_mantenimiento
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.tipo_mantenimiento);
    let observaciones = update
        .observaciones
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.observaciones);

    sqlx::query(
        r#"UPDATE mantenimientos
           SET tipo_mantenimiento = ?, fecha = ?, fecha_proximo_manto = ?, observaciones = ?, updated_at = ?
           WHERE id = ?"#
    )
        .bind(tipo)
        .bind(fecha)
        .bind(fecha_proximo_manto)
        .bind(observaciones)
        .bind(Utc::now())
        .bind(&maintenance_id)
        .execute(&app_state.db_pool)
        .await?;

    let updated = find_active_maintenance(&app_state.db_pool, &maintenance_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(updated)))
}

pub async fn delete_maintenance(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_permission(&http_request, Rol::can_record_maintenance)?;
    let maintenance_id = parse_uuid(&path.into_inner(), "maintenance id")?.to_string();

    let result = sqlx::query("UPDATE mantenimientos SET estado = ?, updated_at = ? WHERE id = ? AND estado = ?")
        .bind(Estado::Inactivo)
        .bind(Utc::now())
        .bind(&maintenance_id)
        .bind(Estado::Activo)
        .execute(&app_state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::maintenance_not_found(&maintenance_id));
    }

    log::info!("Maintenance {} deactivated by {}", maintenance_id, claims.email);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        serde_json::json!({ "id": maintenance_id, "estado": Estado::Inactivo }),
        "Maintenance record deactivated".to_string(),
    )))
}
