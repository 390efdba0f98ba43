// src/db.rs - Database migrations, report views and pool setup

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};

use crate::config::DatabaseConfig;

/// Names of the precomputed report sources, in installation order.
pub const REPORT_VIEWS: [&str; 4] = [
    "v_estadisticas_sistema",
    "v_equipos_resumen",
    "v_mantenimientos_detalle",
    "v_equipos_mantenimiento_pendiente",
];

/// Builds the process-wide pool. The handle is owned by the startup routine and
/// passed explicitly to everything that touches the database.
pub async fn create_pool(db_config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&db_config.url)
        .with_context(|| format!("Invalid database url: {}", db_config.url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .log_statements(log::LevelFilter::Debug)
        .log_slow_statements(
            log::LevelFilter::Warn,
            Duration::from_millis(db_config.slow_statement_ms),
        );

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout))
        .idle_timeout(Duration::from_secs(db_config.idle_timeout))
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db_config.url))?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool, install_views: bool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS usuarios (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE CHECK(length(email) >= 5 AND length(email) <= 255),
            nombre TEXT NOT NULL CHECK(length(nombre) > 0 AND length(nombre) <= 255),
            password_hash TEXT NOT NULL,
            rol TEXT NOT NULL DEFAULT 'TECNICO' CHECK(rol IN ('ADMIN', 'TECNICO')),
            estado TEXT NOT NULL DEFAULT 'ACTIVO' CHECK(estado IN ('ACTIVO', 'INACTIVO')),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS equipos (
            id TEXT PRIMARY KEY,
            nombre TEXT NOT NULL CHECK(length(nombre) > 0 AND length(nombre) <= 255),
            marca TEXT NOT NULL CHECK(length(marca) <= 255),
            modelo TEXT NOT NULL CHECK(length(modelo) <= 255),
            numero_serie TEXT NOT NULL UNIQUE CHECK(length(numero_serie) <= 100),
            id_control TEXT NOT NULL UNIQUE CHECK(length(id_control) <= 100),
            ubicacion TEXT NOT NULL CHECK(length(ubicacion) <= 255),
            descripcion_pdf TEXT CHECK(descripcion_pdf IS NULL OR length(descripcion_pdf) <= 1000),
            estado TEXT NOT NULL DEFAULT 'ACTIVO' CHECK(estado IN ('ACTIVO', 'INACTIVO')),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mantenimientos (
            id TEXT PRIMARY KEY,
            equipo_id TEXT NOT NULL,
            tecnico_id TEXT NOT NULL,
            tipo_mantenimiento TEXT NOT NULL CHECK(length(tipo_mantenimiento) <= 100),
            fecha DATETIME NOT NULL,
            fecha_proximo_manto DATETIME,
            observaciones TEXT NOT NULL CHECK(length(observaciones) <= 2000),
            estado TEXT NOT NULL DEFAULT 'ACTIVO' CHECK(estado IN ('ACTIVO', 'INACTIVO')),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (equipo_id) REFERENCES equipos (id),
            FOREIGN KEY (tecnico_id) REFERENCES usuarios (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== INDEXES ====================

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_usuarios_estado ON usuarios(estado)",
        "CREATE INDEX IF NOT EXISTS idx_equipos_estado ON equipos(estado)",
        "CREATE INDEX IF NOT EXISTS idx_equipos_nombre ON equipos(nombre)",
        "CREATE INDEX IF NOT EXISTS idx_mantenimientos_equipo ON mantenimientos(equipo_id)",
        "CREATE INDEX IF NOT EXISTS idx_mantenimientos_tecnico ON mantenimientos(tecnico_id)",
        "CREATE INDEX IF NOT EXISTS idx_mantenimientos_fecha ON mantenimientos(fecha)",
        "CREATE INDEX IF NOT EXISTS idx_mantenimientos_proximo ON mantenimientos(fecha_proximo_manto)",
    ];
    for statement in indexes {
        sqlx::query(statement).execute(pool).await?;
    }

    if install_views {
        install_report_views(pool).await?;
    } else {
        log::warn!("Report views disabled; statistics will be computed by the fallback engine");
    }

    log::info!("Database migrations completed");
    Ok(())
}

/// Creates the precomputed report views. Timestamps are compared through
/// `julianday()` so RFC 3339 values and SQLite's own clock line up to the
/// millisecond.
pub async fn install_report_views(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS v_estadisticas_sistema AS
        SELECT
            (SELECT COUNT(*) FROM equipos) AS total_equipos,
            (SELECT COUNT(*) FROM equipos WHERE estado = 'ACTIVO') AS equipos_activos,
            (SELECT COUNT(*) FROM mantenimientos) AS total_mantenimientos,
            (SELECT COUNT(*) FROM mantenimientos
                WHERE julianday(fecha) >= julianday('now', 'start of month')
                  AND julianday(fecha) < julianday('now', 'start of month', '+1 month')) AS mantenimientos_mes,
            (SELECT COUNT(*) FROM usuarios) AS total_usuarios,
            (SELECT COUNT(*) FROM usuarios WHERE estado = 'ACTIVO') AS usuarios_activos,
            (SELECT COUNT(*) FROM mantenimientos
                WHERE estado = 'ACTIVO'
                  AND fecha_proximo_manto IS NOT NULL
                  AND julianday(fecha_proximo_manto) >= julianday('now')
                  AND julianday(fecha_proximo_manto) <= julianday('now', '+30 days')) AS mantenimientos_pendientes
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS v_equipos_resumen AS
        SELECT
            e.id,
            e.nombre,
            e.marca,
            e.modelo,
            e.ubicacion,
            COUNT(m.id) AS total_mantenimientos,
            MAX(m.fecha) AS ultimo_mantenimiento
        FROM equipos e
        LEFT JOIN mantenimientos m ON m.equipo_id = e.id AND m.estado = 'ACTIVO'
        WHERE e.estado = 'ACTIVO'
        GROUP BY e.id, e.nombre, e.marca, e.modelo, e.ubicacion
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS v_mantenimientos_detalle AS
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
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS v_equipos_mantenimiento_pendiente AS
        SELECT *
        FROM v_mantenimientos_detalle
        WHERE fecha_proximo_manto IS NOT NULL
          AND julianday(fecha_proximo_manto) >= julianday('now')
          AND julianday(fecha_proximo_manto) <= julianday('now', '+30 days')
        "#,
    )
        .execute(pool)
        .await?;

    log::info!("Installed {} report views", REPORT_VIEWS.len());
    Ok(())
}

/// Drops every report view, dependents first.
pub async fn drop_report_views(pool: &SqlitePool) -> Result<()> {
    for view in REPORT_VIEWS.iter().rev() {
        sqlx::query(&format!("DROP VIEW IF EXISTS {}", view))
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub async fn view_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'view' AND name = ?"
    )
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}
