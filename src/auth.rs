// src/auth.rs
use actix_web::web;
use actix_web::HttpMessage;
use actix_web::{dev::ServiceRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::models::{Rol, User, UserInfo};

// ======== REQUESTS / RESPONSES ========

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub nombre: String,
    pub rol: Rol,
    pub exp: i64,
    pub iat: i64,
}

// ======== AUTH SERVICE ========

pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(jwt_secret: &str, token_expiration_hours: i64, bcrypt_cost: u32) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_ttl: Duration::hours(token_expiration_hours),
            bcrypt_cost,
        }
    }

    pub fn hash_password(&self, password: &str) -> ApiResult<String> {
        hash(password, self.bcrypt_cost).map_err(|e| {
            log::error!("Password hashing failed: {}", e);
            ApiError::InternalServerError("Failed to hash password".to_string())
        })
    }

    /// A malformed stored hash counts as a mismatch.
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        verify(password, hash).unwrap_or(false)
    }

    pub fn generate_token(&self, user: &User) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + self.token_ttl;

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            nombre: user.nombre.clone(),
            rol: user.rol,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| ApiError::AuthError("Failed to generate token".to_string()))
    }

    pub fn verify_token(&self, token: &str) -> ApiResult<Claims> {
        let validation = Validation::default();
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature =>
                        ApiError::AuthError("Token expired".to_string()),
                    jsonwebtoken::errors::ErrorKind::InvalidToken =>
                        ApiError::AuthError("Invalid token".to_string()),
                    _ =>
                        ApiError::AuthError("Token verification failed".to_string()),
                }
            })
    }
}

// ======== HELPER FUNCTIONS ========

pub fn get_current_user(req: &HttpRequest) -> ApiResult<Claims> {
    req.extensions()
        .get::<Claims>().cloned()
        .ok_or_else(|| ApiError::Unauthorized("No user information found".to_string()))
}

pub fn check_permission<F>(claims: &Claims, check: F) -> ApiResult<()>
where
    F: Fn(&Rol) -> bool,
{
    if check(&claims.rol) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Insufficient permissions".to_string()))
    }
}

/// Check if the current user has a specific permission
pub fn require_permission(req: &HttpRequest, permission_check: fn(&Rol) -> bool) -> ApiResult<Claims> {
    let claims = get_current_user(req)?;
    check_permission(&claims, permission_check)?;
    Ok(claims)
}

// ======== JWT MIDDLEWARE ========

pub async fn jwt_middleware(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (actix_web::Error, ServiceRequest)> {
    let token = credentials.token();

    let auth_service = match req.app_data::<web::Data<std::sync::Arc<AuthService>>>() {
        Some(svc) => svc,
        None => {
            log::error!("AuthService not found in app data");
            return Err((
                ApiError::InternalServerError("Auth service not available".to_string()).into(),
                req,
            ));
        }
    };

    match auth_service.verify_token(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Err(err) => {
            log::warn!("JWT verification failed: {}", err);
            Err((err.into(), req))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Estado;

    fn service() -> AuthService {
        AuthService::new("test_secret_with_at_least_32_characters!", 8, 4)
    }

    fn user(rol: Rol) -> User {
        User {
            id: "5f0c7c1e-8a55-4a53-9d43-000000000001".into(),
            email: "tecnico@hospital.com".into(),
            nombre: "Técnico de Soporte".into(),
            password_hash: String::new(),
            rol,
            estado: Estado::Activo,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_roundtrip() {
        let auth = service();
        let hashed = auth.hash_password("Tecnico123!").unwrap();
        assert!(auth.verify_password("Tecnico123!", &hashed));
        assert!(!auth.verify_password("otra", &hashed));
        assert!(!auth.verify_password("Tecnico123!", "not-a-hash"));
    }

    #[test]
    fn test_token_carries_role() {
        let auth = service();
        let token = auth.generate_token(&user(Rol::Tecnico)).unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.rol, Rol::Tecnico);
        assert_eq!(claims.email, "tecnico@hospital.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let other = AuthService::new("another_secret_with_at_least_32_chars!!", 8, 4);
        let token = other.generate_token(&user(Rol::Admin)).unwrap();
        assert!(matches!(service().verify_token(&token), Err(ApiError::AuthError(_))));
    }

    #[test]
    fn test_check_permission() {
        let auth = service();
        let claims = auth.verify_token(&auth.generate_token(&user(Rol::Tecnico)).unwrap()).unwrap();
        assert!(check_permission(&claims, Rol::can_edit_equipment).is_ok());
        assert!(matches!(
            check_permission(&claims, Rol::can_manage_users),
            Err(ApiError::Forbidden(_))
        ));
    }
}
