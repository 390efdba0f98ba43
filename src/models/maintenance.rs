// src/models/maintenance.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::Estado;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Maintenance {
    pub id: String,
    pub equipo_id: String,
    pub tecnico_id: String,
    pub tipo_mantenimiento: String,
    pub fecha: DateTime<Utc>,
    pub fecha_proximo_manto: Option<DateTime<Utc>>,
    pub observaciones: String,
    pub estado: Estado,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_dates"))]
pub struct CreateMaintenanceRequest {
    #[validate(length(min = 1, message = "Equipment ID is required"))]
    pub equipo_id: String,
    #[validate(length(min = 1, max = 100, message = "Maintenance type must be between 1 and 100 characters"))]
    pub tipo_mantenimiento: String,
    pub fecha: DateTime<Utc>,
    pub fecha_proximo_manto: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 2000, message = "Observations must be between 1 and 2000 characters"))]
    pub observaciones: String,
}

#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMaintenanceRequest {
    #[validate(length(min = 1, max = 100, message = "Maintenance type must be between 1 and 100 characters"))]
    pub tipo_mantenimiento: Option<String>,
    pub fecha: Option<DateTime<Utc>>,
    pub fecha_proximo_manto: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 2000, message = "Observations must be between 1 and 2000 characters"))]
    pub observaciones: Option<String>,
}

fn validate_create_dates(request: &CreateMaintenanceRequest) -> Result<(), ValidationError> {
    check_next_due(request.fecha, request.fecha_proximo_manto)
}

/// The next due date, when present, cannot precede the service date.
pub fn check_next_due(
    fecha: DateTime<Utc>,
    fecha_proximo_manto: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match fecha_proximo_manto {
        Some(next) if next < fecha => {
            let mut err = ValidationError::new("next_due_before_date");
            err.message = Some("Next maintenance date cannot be before the maintenance date".into());
            Err(err)
        }
        _ => Ok(()),
    }
}
