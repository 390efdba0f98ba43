// src/models/equipment.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Estado;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: String,
    pub nombre: String,
    pub marca: String,
    pub modelo: String,
    pub numero_serie: String,
    pub id_control: String,
    pub ubicacion: String,
    pub descripcion_pdf: Option<String>,
    pub estado: Estado,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateEquipmentRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub nombre: String,
    #[validate(length(min = 1, max = 255, message = "Brand must be between 1 and 255 characters"))]
    pub marca: String,
    #[validate(length(min = 1, max = 255, message = "Model must be between 1 and 255 characters"))]
    pub modelo: String,
    #[validate(length(min = 1, max = 100, message = "Serial number must be between 1 and 100 characters"))]
    pub numero_serie: String,
    #[validate(length(min = 1, max = 100, message = "Control ID must be between 1 and 100 characters"))]
    pub id_control: String,
    #[validate(length(min = 1, max = 255, message = "Location must be between 1 and 255 characters"))]
    pub ubicacion: String,
    #[validate(length(max = 1000, message = "Manual description cannot exceed 1000 characters"))]
    pub descripcion_pdf: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEquipmentRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub nombre: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Brand must be between 1 and 255 characters"))]
    pub marca: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Model must be between 1 and 255 characters"))]
    pub modelo: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Serial number must be between 1 and 100 characters"))]
    pub numero_serie: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Control ID must be between 1 and 100 characters"))]
    pub id_control: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Location must be between 1 and 255 characters"))]
    pub ubicacion: Option<String>,
    #[validate(length(max = 1000, message = "Manual description cannot exceed 1000 characters"))]
    pub descripcion_pdf: Option<String>,
}

impl UpdateEquipmentRequest {
    /// Column/value pairs for the fields present in the request.
    pub fn changes(&self) -> Vec<(&'static str, &str)> {
        let fields = [
            ("nombre", &self.nombre),
            ("marca", &self.marca),
            ("modelo", &self.modelo),
            ("numero_serie", &self.numero_serie),
            ("id_control", &self.id_control),
            ("ubicacion", &self.ubicacion),
            ("descripcion_pdf", &self.descripcion_pdf),
        ];
        fields
            .into_iter()
            .filter_map(|(column, value)| value.as_deref().map(|v| (column, v.trim())))
            .collect()
    }
}
