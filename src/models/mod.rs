// src/models/mod.rs

pub mod equipment;
pub mod maintenance;
pub mod user;

pub use equipment::*;
pub use maintenance::*;
pub use user::*;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ==================== SHARED ENUMS ====================

/// Soft-delete lifecycle flag shared by every entity table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, sqlx::Type,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Estado {
    Activo,
    Inactivo,
}

impl Default for Estado {
    fn default() -> Self {
        Estado::Activo
    }
}
