// src/models/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum::{AsRefStr, Display, EnumString};
use validator::Validate;

use super::Estado;
use crate::error::{ApiError, ApiResult};

// ==================== ROLE ====================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, sqlx::Type,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Rol {
    Admin,
    Tecnico,
}

impl Rol {
    pub fn can_manage_users(&self) -> bool {
        matches!(self, Rol::Admin)
    }

    pub fn can_edit_equipment(&self) -> bool {
        true
    }

    pub fn can_delete_equipment(&self) -> bool {
        matches!(self, Rol::Admin)
    }

    pub fn can_record_maintenance(&self) -> bool {
        true
    }
}

// ==================== USER ====================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub nombre: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub rol: Rol,
    pub estado: Estado,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of a user, never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub nombre: String,
    pub rol: Rol,
    pub estado: Estado,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            nombre: user.nombre,
            rol: user.rol,
            estado: user.estado,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub nombre: String,
    pub rol: Option<Rol>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub nombre: Option<String>,
    pub rol: Option<Rol>,
    pub estado: Option<Estado>,
}

impl User {
    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM usuarios WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> ApiResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM usuarios WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::user_not_found(id))
    }

    pub fn is_active(&self) -> bool {
        self.estado == Estado::Activo
    }

    /// Inserts a new user; `password_hash` must already be hashed.
    pub async fn insert(
        pool: &SqlitePool,
        email: &str,
        nombre: &str,
        password_hash: &str,
        rol: Rol,
    ) -> ApiResult<User> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO usuarios (id, email, nombre, password_hash, rol, estado, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#
        )
            .bind(&id)
            .bind(email.trim().to_lowercase())
            .bind(nombre.trim())
            .bind(password_hash)
            .bind(rol)
            .bind(Estado::Activo)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;

        Self::find_by_id(pool, &id).await
    }
}
