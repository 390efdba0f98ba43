//! Shared fixtures for the in-crate tests: in-memory databases and seed rows.

use std::sync::Arc;

use actix_web::web;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::run_migrations;
use crate::models::{Estado, Rol, User};
use crate::monitoring::{Metrics, MetricsObserver};
use crate::stats::StatsService;
use crate::AppState;

/// A migrated in-memory database. Every SQLite `:memory:` connection is its
/// own database, so the pool is pinned to one connection that never expires.
pub async fn memory_pool(install_views: bool) -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool, install_views)
        .await
        .expect("migrations");
    pool
}

pub async fn insert_user(pool: &SqlitePool, email: &str, rol: Rol, estado: Estado) -> String {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO usuarios (id, email, nombre, password_hash, rol, estado, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(email)
    .bind(format!("Usuario {}", email))
    .bind("$2b$04$unusablehashunusablehashunusablehashunusablehashunu")
    .bind(rol)
    .bind(estado)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("insert user");
    id
}

pub async fn insert_equipment(pool: &SqlitePool, nombre: &str, estado: Estado) -> String {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO equipos (id, nombre, marca, modelo, numero_serie, id_control, ubicacion, estado, created_at, updated_at)
         VALUES (?, ?, 'Mindray', 'BeneView T5', ?, ?, 'UCI', ?, ?, ?)",
    )
    .bind(&id)
    .bind(nombre)
    .bind(format!("SN-{}", id))
    .bind(format!("CTL-{}", id))
    .bind(estado)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("insert equipment");
    id
}

pub async fn insert_maintenance(
    pool: &SqlitePool,
    equipo_id: &str,
    tecnico_id: &str,
    fecha: DateTime<Utc>,
    fecha_proximo_manto: Option<DateTime<Utc>>,
    estado: Estado,
) -> String {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO mantenimientos (id, equipo_id, tecnico_id, tipo_mantenimiento, fecha, fecha_proximo_manto, observaciones, estado, created_at, updated_at)
         VALUES (?, ?, ?, 'Preventivo', ?, ?, 'Revisión general', ?, ?, ?)",
    )
    .bind(&id)
    .bind(equipo_id)
    .bind(tecnico_id)
    .bind(fecha)
    .bind(fecha_proximo_manto)
    .bind(estado)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("insert maintenance");
    id
}

/// Everything the routes expect in app data, built over an in-memory database.
pub struct TestContext {
    pub pool: SqlitePool,
    pub state: web::Data<Arc<AppState>>,
    pub auth: web::Data<Arc<AuthService>>,
    pub metrics: web::Data<Metrics>,
}

impl TestContext {
    pub async fn new(install_views: bool) -> Self {
        let pool = memory_pool(install_views).await;
        let config = Config::default();
        let metrics = Arc::new(Metrics::new());
        let stats = StatsService::new(pool.clone())
            .with_observer(Arc::new(MetricsObserver::new(metrics.clone())));
        let auth = AuthService::new(&config.auth.jwt_secret, config.auth.token_expiration_hours, 4);

        Self {
            pool: pool.clone(),
            state: web::Data::new(Arc::new(AppState { db_pool: pool, config, stats })),
            auth: web::Data::new(Arc::new(auth)),
            metrics: web::Data::from(metrics),
        }
    }

    /// Inserts an active user with a real password hash.
    pub async fn create_user(&self, email: &str, password: &str, rol: Rol) -> User {
        let hash = self.auth.hash_password(password).expect("hash");
        User::insert(&self.pool, email, "Usuario de prueba", &hash, rol)
            .await
            .expect("insert user")
    }

    /// Inserts a user and returns it with a bearer header value.
    pub async fn signed_in(&self, email: &str, rol: Rol) -> (User, String) {
        let user = self.create_user(email, "Password123!", rol).await;
        let token = self.auth.generate_token(&user).expect("token");
        (user, format!("Bearer {}", token))
    }
}

/// Builds the full application over a [`TestContext`].
macro_rules! init_test_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.state.clone())
                .app_data($ctx.auth.clone())
                .app_data($ctx.metrics.clone())
                .configure(crate::routes::configure),
        )
        .await
    };
}

pub(crate) use init_test_app;
