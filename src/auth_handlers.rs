// src/auth_handlers.rs - Authentication route handlers

use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use validator::Validate;

use crate::auth::{get_current_user, AuthService, LoginRequest, LoginResponse};
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::{User, UserInfo};
use crate::AppState;

pub async fn login(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;

    let invalid = || ApiError::AuthError("Invalid email or password".to_string());

    let user = User::find_by_email(&app_state.db_pool, &request.email)
        .await?
        .ok_or_else(invalid)?;

    if !auth_service.verify_password(&request.password, &user.password_hash) {
        log::warn!("Failed login attempt for {}", user.email);
        return Err(invalid());
    }

    if !user.is_active() {
        return Err(ApiError::AuthError("Account is inactive".to_string()));
    }

    let token = auth_service.generate_token(&user)?;

    log::info!("User {} logged in successfully", user.email);

    let response = LoginResponse {
        token,
        user: user.into(),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        response,
        "Login successful".to_string(),
    )))
}

pub async fn get_profile(
    app_state: web::Data<Arc<AppState>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = get_current_user(&http_request)?;
    let user = User::find_by_id(&app_state.db_pool, &claims.sub).await?;

    if !user.is_active() {
        return Err(ApiError::Unauthorized("Account is inactive".to_string()));
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(UserInfo::from(user))))
}
