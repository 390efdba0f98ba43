//! Equipment handlers
//!
//! - Paginated listing with free-text search
//! - CRUD with soft delete

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_permission;
use crate::error::{parse_uuid, ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::models::{CreateEquipmentRequest, Equipment, Estado, Rol, UpdateEquipmentRequest};
use crate::AppState;

const SEARCH_FILTER: &str =
    "(?1 IS NULL OR nombre LIKE ?1 OR marca LIKE ?1 OR modelo LIKE ?1 OR ubicacion LIKE ?1)";

/// Active equipment by id, 404 otherwise.
pub async fn find_active_equipment(pool: &SqlitePool, equipment_id: &str) -> ApiResult<Equipment> {
    sqlx::query_as::<_, Equipment>("SELECT * FROM equipos WHERE id = ? AND estado = ?")
        .bind(equipment_id)
        .bind(Estado::Activo)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::equipment_not_found(equipment_id))
}

fn map_duplicate(err: ApiError) -> ApiError {
    match err {
        ApiError::Conflict(_) => {
            ApiError::Conflict("Equipment with this serial number or control ID already exists".to_string())
        }
        other => other,
    }
}

pub async fn get_equipment_list(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let (page, limit, offset) = query.normalize();
    let pattern = query.search_pattern();

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM equipos WHERE estado = 'ACTIVO' AND {}",
        SEARCH_FILTER
    ))
        .bind(&pattern)
        .fetch_one(&app_state.db_pool)
        .await?;

    let equipment: Vec<Equipment> = sqlx::query_as(&format!(
        "SELECT * FROM equipos WHERE estado = 'ACTIVO' AND {} ORDER BY nombre ASC, id ASC LIMIT ?2 OFFSET ?3",
        SEARCH_FILTER
    ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&app_state.db_pool)
        .await?;

    Ok(HttpResponse::Ok().json(PaginatedResponse::new(equipment, total, page, limit)))
}

pub async fn get_equipment(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let equipment_id = parse_uuid(&path.into_inner(), "equipment id")?.to_string();
    let equipment = find_active_equipment(&app_state.db_pool, &equipment_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(equipment)))
}

pub async fn create_equipment(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateEquipmentRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_permission(&http_request, Rol::can_edit_equipment)?;
    request.validate()?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"INSERT INTO equipos
           (id, nombre, marca, modelo, numero_serie, id_control, ubicacion, descripcion_pdf, estado, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
    )
        .bind(&id)
        .bind(request.nombre.trim())
        .bind(request.marca.trim())
        .bind(request.modelo.trim())
        .bind(request.numero_serie.trim())
        .bind(request.id_control.trim())
        .bind(request.ubicacion.trim())
        .bind(request.descripcion_pdf.as_deref())
        .bind(Estado::Activo)
        .bind(now)
        .bind(now)
        .execute(&app_state.db_pool)
        .await
        .map_err(|e| map_duplicate(e.into()))?;

    log::info!("Equipment {} ({}) registered by {}", request.nombre, id, claims.email);

    let equipment = find_active_equipment(&app_state.db_pool, &id).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        equipment,
        "Equipment created successfully".to_string(),
    )))
}

pub async fn update_equipment(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    update: web::Json<UpdateEquipmentRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_permission(&http_request, Rol::can_edit_equipment)?;
    update.validate()?;
    let equipment_id = parse_uuid(&path.into_inner(), "equipment id")?.to_string();

    find_active_equipment(&app_state.db_pool, &equipment_id).await?;

    let changes = update.changes();
    if changes.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let mut updates: Vec<String> = changes.iter().map(|(column, _)| format!("{} = ?", column)).collect();
    updates.push("updated_at = ?".to_string());

    let sql = format!("UPDATE equipos SET {} WHERE id = ?", updates.join(", "));

    let mut query = sqlx::query(&sql);
    for (_, value) in &changes {
        query = query.bind(*value);
    }
    query = query.bind(Utc::now()).bind(&equipment_id);

    query
        .execute(&app_state.db_pool)
        .await
        .map_err(|e| map_duplicate(e.into()))?;

    let updated = find_active_equipment(&app_state.db_pool, &equipment_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(updated)))
}

/// Soft delete. Maintenance history is kept and stays visible in the reports
/// that do not filter by equipment state.
pub async fn delete_equipment(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_permission(&http_request, Rol::can_delete_equipment)?;
    let equipment_id = parse_uuid(&path.into_inner(), "equipment id")?.to_string();

    let result = sqlx::query("UPDATE equipos SET estado = ?, updated_at = ? WHERE id = ? AND estado = ?")
        .bind(Estado::Inactivo)
        .bind(Utc::now())
        .bind(&equipment_id)
        .bind(Estado::Activo)
        .execute(&app_state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::equipment_not_found(&equipment_id));
    }

    log::info!("Equipment {} deactivated by {}", equipment_id, claims.email);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        serde_json::json!({ "id": equipment_id, "estado": Estado::Inactivo }),
        "Equipment deactivated".to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use crate::models::{Estado, Rol};
    use crate::test_support::{init_test_app, insert_equipment, TestContext};
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    fn monitor() -> Value {
        json!({
            "nombre": "Monitor de signos vitales",
            "marca": "Mindray",
            "modelo": "uMEC12",
            "numeroSerie": "MR-2024-001",
            "idControl": "CMA-0001",
            "ubicacion": "Urgencias"
        })
    }

    #[actix_rt::test]
    async fn test_tecnico_creates_and_updates_equipment() {
        let ctx = TestContext::new(true).await;
        let (_, tecnico) = ctx.signed_in("tecnico@hospital.com", Rol::Tecnico).await;
        let app = init_test_app!(ctx);

        let req = test::TestRequest::post()
            .uri("/api/equipos")
            .insert_header(("Authorization", tecnico.clone()))
            .set_json(monitor())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["estado"], "ACTIVO");

        let req = test::TestRequest::put()
            .uri(&format!("/api/equipos/{}", id))
            .insert_header(("Authorization", tecnico.clone()))
            .set_json(json!({ "ubicacion": "UCI Neonatal" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["ubicacion"], "UCI Neonatal");
        assert_eq!(body["data"]["numeroSerie"], "MR-2024-001");

        let req = test::TestRequest::post()
            .uri("/api/equipos")
            .insert_header(("Authorization", tecnico.clone()))
            .set_json(monitor())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/equipos/{}", id))
            .insert_header(("Authorization", tecnico))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_rt::test]
    async fn test_list_searches_active_equipment() {
        let ctx = TestContext::new(true).await;
        let (_, tecnico) = ctx.signed_in("tecnico@hospital.com", Rol::Tecnico).await;
        insert_equipment(&ctx.pool, "Ventilador mecánico", Estado::Activo).await;
        insert_equipment(&ctx.pool, "Bomba de infusión", Estado::Activo).await;
        insert_equipment(&ctx.pool, "Ventilador antiguo", Estado::Inactivo).await;
        let app = init_test_app!(ctx);

        let req = test::TestRequest::get()
            .uri("/api/equipos?search=Ventilador")
            .insert_header(("Authorization", tecnico.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["nombre"], "Ventilador mecánico");

        let req = test::TestRequest::get()
            .uri("/api/equipos?page=2&limit=1")
            .insert_header(("Authorization", tecnico))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["page"], 2);
        assert_eq!(body["data"][0]["nombre"], "Ventilador mecánico");
    }

    #[actix_rt::test]
    async fn test_admin_soft_deletes_equipment() {
        let ctx = TestContext::new(true).await;
        let (_, admin) = ctx.signed_in("admin@hospital.com", Rol::Admin).await;
        let id = insert_equipment(&ctx.pool, "Desfibrilador", Estado::Activo).await;
        let app = init_test_app!(ctx);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/equipos/{}", id))
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri(&format!("/api/equipos/{}", id))
            .insert_header(("Authorization", admin))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let estado: String = sqlx::query_scalar("SELECT estado FROM equipos WHERE id = ?")
            .bind(&id)
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
        assert_eq!(estado, "INACTIVO");
    }
}
