// src/lib.rs
//! Biomedical equipment maintenance management: REST backend with
//! dashboard statistics served from precomputed views with a table fallback,
//! plus a console dashboard client with an offline cache.

pub mod auth;
pub mod auth_handlers;
pub mod client;
pub mod config;
pub mod db;
pub mod equipment_handlers;
pub mod error;
pub mod handlers;
pub mod maintenance_handlers;
pub mod models;
pub mod monitoring;
pub mod routes;
pub mod stats;
pub mod user_handlers;

#[cfg(test)]
pub mod test_support;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::stats::StatsService;

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
    pub stats: StatsService,
}
