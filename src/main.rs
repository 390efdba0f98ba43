// src/main.rs - cma-server entrypoint
use std::env;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use rand::seq::SliceRandom;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sqlx::SqlitePool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cma_biomed::auth::AuthService;
use cma_biomed::config::{load_config, Config, SecurityConfig};
use cma_biomed::db;
use cma_biomed::models::{Rol, User};
use cma_biomed::monitoring::{Metrics, MetricsObserver, RequestLogger};
use cma_biomed::routes;
use cma_biomed::stats::StatsService;
use cma_biomed::AppState;

const DEFAULT_ADMIN_EMAIL: &str = "admin@cma.local";

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (reads .env first)
    let config = load_config()?;

    setup_logging(&config)?;
    config.print_startup_info();

    if config.is_production() {
        validate_production_config(&config)?;
    }

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool, config.stats.install_views).await?;

    let auth_service = Arc::new(AuthService::new(
        &config.auth.jwt_secret,
        config.auth.token_expiration_hours,
        config.auth.bcrypt_cost,
    ));

    create_default_admin_if_needed(&pool, &auth_service).await?;

    let metrics_arc = Arc::new(Metrics::new());
    let metrics = web::Data::from(metrics_arc.clone());

    let stats = StatsService::new(pool.clone())
        .with_observer(Arc::new(MetricsObserver::new(metrics_arc.clone())));

    let app_state = Arc::new(AppState {
        db_pool: pool.clone(),
        config: config.clone(),
        stats,
    });

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let server_config = config.clone();
    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&server_config.security.allowed_origins, server_config.is_production());
        let security_headers = setup_security_headers(&server_config.security);

        let mut app = App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(RequestLogger::new(metrics_arc.clone()))
            .app_data(web::JsonConfig::default().limit(server_config.security.max_request_size))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(metrics.clone())
            .configure(routes::configure);

        // Frontend build is registered last so it never shadows /api or /health
        if let Some(dir) = server_config.server.frontend_dir.as_deref() {
            app = app.service(Files::new("/", dir).index_file("index.html"));
        }
        app
    })
    .keep_alive(Duration::from_secs(config.server.keep_alive))
    .client_request_timeout(Duration::from_secs(config.server.client_timeout));

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await
        .context("Server failed to run")?;

    Ok(())
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
}

fn validate_production_config(config: &Config) -> anyhow::Result<()> {
    if config.auth.jwt_secret == "dummy_32_chars_for_tests_only!!!" {
        anyhow::bail!("Default JWT secret in production! Set JWT_SECRET.");
    }

    if config.security.allowed_origins.iter().any(|o| o == "*") {
        anyhow::bail!("Wildcard CORS origins not allowed in production!");
    }

    Ok(())
}

fn setup_cors(allowed_origins: &[String], is_production: bool) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .expose_headers(vec![
            header::CONTENT_LENGTH,
            header::HeaderName::from_static("x-report-source"),
        ])
        .max_age(3600);

    if allowed_origins.iter().any(|o| o == "*") && !is_production {
        log::warn!("Using wildcard CORS (*) in development mode");
        return cors.allow_any_origin();
    }

    for origin in allowed_origins.iter().filter(|o| !o.is_empty() && o.as_str() != "*") {
        cors = cors.allowed_origin(origin);
    }
    cors
}

fn setup_security_headers(config: &SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains",
        ));
    }

    headers
}

fn generate_admin_password() -> String {
    let mut rng = thread_rng();
    let mut chars: Vec<char> = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    // Guarantee one digit and one symbol for the password policy
    chars.push(char::from(b'0' + rng.gen_range(0..10)));
    if let Some(symbol) = ['!', '@', '#', '$', '%', '*'].choose(&mut rng) {
        chars.push(*symbol);
    }
    chars.shuffle(&mut rng);
    chars.into_iter().collect()
}

async fn create_default_admin_if_needed(pool: &SqlitePool, auth_service: &AuthService) -> anyhow::Result<()> {
    let user_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usuarios")
        .fetch_one(pool)
        .await?;

    if user_count.0 > 0 {
        return Ok(());
    }

    let password = env::var("DEFAULT_ADMIN_PASSWORD").unwrap_or_else(|_| {
        let pwd = generate_admin_password();
        log::warn!("Generated admin password: {}", pwd);
        pwd
    });

    let hash = auth_service
        .hash_password(&password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;

    let admin = User::insert(pool, DEFAULT_ADMIN_EMAIL, "Administrador", &hash, Rol::Admin)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create default admin user: {}", e))?;

    log::info!("Created default admin user {} ({})", admin.email, admin.id);
    Ok(())
}
