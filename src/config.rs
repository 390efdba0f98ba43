// src/config.rs - Configuration management
use serde::Deserialize;
use std::env;
use anyhow::{Context, Result};
use rand::{thread_rng, Rng, distributions::Alphanumeric};
use std::path::Path;
use std::fs;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
    pub client_timeout: u64,
    /// Directory holding the built administrative frontend, served at `/` when set
    pub frontend_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub slow_statement_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration_hours: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub max_request_size: usize,
    pub require_https: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StatsConfig {
    /// Install the report views during migrations. With `false` every report
    /// is served by the fallback engine.
    pub install_views: bool,
}

// Dummy defaults for tests (no ENV read here)
impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dummy_32_chars_for_tests_only!!!".to_string(),
            token_expiration_hours: 8,
            bcrypt_cost: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            workers: None,
            keep_alive: 30,
            client_timeout: 30,
            frontend_dir: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:cma.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: 30,
            idle_timeout: 600,
            slow_statement_ms: 500,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            max_request_size: 1024 * 1024,
            require_https: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { install_views: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

pub fn generate_jwt_secret() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let mut config = if let Ok(config_file) = env::var("CONFIG_FILE") {
        load_toml(Path::new(&config_file))?
    } else {
        Config::default()
    };

    override_with_env(&mut config);

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

fn load_toml(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring unparsable value for {}: {:?}", key, raw);
                None
            }
        },
        Err(_) => None,
    }
}

fn override_with_env(config: &mut Config) {
    if let Ok(host) = env::var("CMA_HOST") {
        config.server.host = host;
    }
    if let Some(port) = parse_env::<u16>("CMA_PORT") {
        config.server.port = port;
    }
    if let Some(workers) = parse_env::<usize>("CMA_WORKERS") {
        config.server.workers = Some(workers);
    }
    if let Ok(dir) = env::var("FRONTEND_BUILD_DIR") {
        config.server.frontend_dir = Some(dir);
    }
    if let Ok(jwt_secret) = env::var("JWT_SECRET") {
        config.auth.jwt_secret = jwt_secret;
    }
    if let Some(hours) = parse_env::<i64>("AUTH_TOKEN_EXPIRATION_HOURS") {
        config.auth.token_expiration_hours = hours;
    }
    if let Some(cost) = parse_env::<u32>("AUTH_BCRYPT_COST") {
        config.auth.bcrypt_cost = cost;
    }
    if let Ok(url) = env::var("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(max_conn) = parse_env::<u32>("DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections = max_conn;
    }
    if let Some(min_conn) = parse_env::<u32>("DATABASE_MIN_CONNECTIONS") {
        config.database.min_connections = min_conn;
    }
    if let Ok(origins_str) = env::var("ALLOWED_ORIGINS") {
        config.security.allowed_origins = origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Ok(level) = env::var("RUST_LOG") {
        config.logging.level = level;
    }
    if let Ok(format) = env::var("LOG_FORMAT") {
        config.logging.format = format;
    }
    if let Some(install) = parse_env::<bool>("CMA_INSTALL_VIEWS") {
        config.stats.install_views = install;
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long (current: {})",
                self.auth.jwt_secret.len()
            ));
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(anyhow::anyhow!(
                "max_connections ({}) must be >= min_connections ({})",
                self.database.max_connections,
                self.database.min_connections
            ));
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(anyhow::anyhow!(
                "bcrypt_cost must be between 4 and 31 (current: {})",
                self.auth.bcrypt_cost
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!(
                "logging.format must be \"pretty\" or \"json\" (current: {:?})",
                self.logging.format
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        env::var("CMA_ENV").map(|v| v == "production").unwrap_or(false)
    }

    pub fn print_startup_info(&self) {
        log::info!("CMA backend starting up");
        log::info!("Server: {}:{}", self.server.host, self.server.port);
        log::info!("Database: {}", self.database.url);
        log::info!("Auth: JWT ({}h expiration)", self.auth.token_expiration_hours);
        log::info!("Logging: {} level, {} format", self.logging.level, self.logging.format);
        log::info!(
            "Report views: {}",
            if self.stats.install_views { "installed" } else { "disabled (fallback only)" }
        );

        if !self.is_production() {
            log::warn!("Running in development mode");
        }
        if !self.security.require_https && self.is_production() {
            log::warn!("HTTPS not required in production mode");
        }
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}
