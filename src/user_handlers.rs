// src/user_handlers.rs - User administration (ADMIN only)

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use crate::auth::{require_permission, AuthService};
use crate::error::{parse_uuid, ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::models::{CreateUserRequest, Estado, Rol, UpdateUserRequest, User, UserInfo};
use crate::AppState;

pub async fn create_user(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<CreateUserRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_permission(&http_request, Rol::can_manage_users)?;
    request.validate()?;

    let password_hash = auth_service.hash_password(&request.password)?;
    let rol = request.rol.unwrap_or(Rol::Tecnico);

    let user = User::insert(&app_state.db_pool, &request.email, &request.nombre, &password_hash, rol)
        .await
        .map_err(|e| match e {
            ApiError::Conflict(_) => ApiError::Conflict("A user with this email already exists".to_string()),
            other => other,
        })?;

    log::info!("User {} created by {}", user.email, claims.email);

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        UserInfo::from(user),
        "User created successfully".to_string(),
    )))
}

pub async fn get_users(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_permission(&http_request, Rol::can_manage_users)?;
    let (page, limit, offset) = query.normalize();

    let users: Vec<User> = sqlx::query_as(
        "SELECT * FROM usuarios ORDER BY julianday(created_at) DESC, id ASC LIMIT ? OFFSET ?"
    )
        .bind(limit)
        .bind(offset)
        .fetch_all(&app_state.db_pool)
        .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usuarios")
        .fetch_one(&app_state.db_pool)
        .await?;

    let data = users.into_iter().map(UserInfo::from).collect();
    Ok(HttpResponse::Ok().json(PaginatedResponse::new(data, total, page, limit)))
}

pub async fn get_user(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_permission(&http_request, Rol::can_manage_users)?;
    let user_id = parse_uuid(&path.into_inner(), "user id")?.to_string();

    let user = User::find_by_id(&app_state.db_pool, &user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(UserInfo::from(user))))
}

pub async fn update_user(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    path: web::Path<String>,
    update: web::Json<UpdateUserRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_permission(&http_request, Rol::can_manage_users)?;
    update.validate()?;
    let user_id = parse_uuid(&path.into_inner(), "user id")?.to_string();

    // 404 before anything is written
    User::find_by_id(&app_state.db_pool, &user_id).await?;

    let mut updates = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(ref email) = update.email {
        updates.push("email = ?");
        values.push(email.trim().to_lowercase());
    }
    if let Some(ref nombre) = update.nombre {
        updates.push("nombre = ?");
        values.push(nombre.trim().to_string());
    }
    if let Some(ref password) = update.password {
        updates.push("password_hash = ?");
        values.push(auth_service.hash_password(password)?);
    }
    if let Some(rol) = update.rol {
        updates.push("rol = ?");
        values.push(rol.to_string());
    }
    if let Some(estado) = update.estado {
        updates.push("estado = ?");
        values.push(estado.to_string());
    }

    if updates.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    updates.push("updated_at = ?");
    values.push(Utc::now().to_rfc3339());

    let sql = format!("UPDATE usuarios SET {} WHERE id = ?", updates.join(", "));

    let mut query = sqlx::query(&sql);
    for value in &values {
        query = query.bind(value);
    }
    query = query.bind(&user_id);

    query.execute(&app_state.db_pool).await?;

    let updated = User::find_by_id(&app_state.db_pool, &user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(UserInfo::from(updated))))
}

/// Soft delete: the row stays, `estado` becomes INACTIVO.
pub async fn delete_user(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_permission(&http_request, Rol::can_manage_users)?;
    let user_id = parse_uuid(&path.into_inner(), "user id")?.to_string();

    if user_id == claims.sub {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }

    let result = sqlx::query("UPDATE usuarios SET estado = ?, updated_at = ? WHERE id = ?")
        .bind(Estado::Inactivo)
        .bind(Utc::now())
        .bind(&user_id)
        .execute(&app_state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::user_not_found(&user_id));
    }

    log::info!("User {} deactivated by {}", user_id, claims.email);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        serde_json::json!({ "id": user_id, "estado": Estado::Inactivo }),
        "User deactivated".to_string(),
    )))
}
