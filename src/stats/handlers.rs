// src/stats/handlers.rs
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{Sourced, StatsEnvelope};
use crate::error::{parse_uuid, ApiResult};
use crate::AppState;

/// Response header naming the path that produced the report.
pub const REPORT_SOURCE_HEADER: &str = "X-Report-Source";

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    #[serde(rename = "equipoId")]
    pub equipo_id: Option<String>,
}

impl DetailQuery {
    /// Blank means unfiltered; anything else must be a UUID.
    pub fn equipment_filter(&self) -> ApiResult<Option<String>> {
        match self.equipo_id.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(parse_uuid(raw, "equipoId")?.to_string())),
        }
    }
}

fn single<T: Serialize>(sourced: Sourced<T>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((REPORT_SOURCE_HEADER, sourced.origin.as_ref()))
        .json(StatsEnvelope::single(sourced.data))
}

fn list<T: Serialize>(sourced: Sourced<Vec<T>>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((REPORT_SOURCE_HEADER, sourced.origin.as_ref()))
        .json(StatsEnvelope::list(sourced.data))
}

pub async fn get_system_stats(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let sourced = app_state.stats.system_stats(Utc::now()).await?;
    Ok(single(sourced))
}

pub async fn get_equipment_summary(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let sourced = app_state.stats.equipment_summary().await?;
    Ok(list(sourced))
}

pub async fn get_maintenance_detail(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<DetailQuery>,
) -> ApiResult<HttpResponse> {
    let equipo_id = query.equipment_filter()?;
    let sourced = app_state.stats.maintenance_detail(equipo_id.as_deref()).await?;
    Ok(list(sourced))
}

pub async fn get_pending_maintenance(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let sourced = app_state.stats.pending_maintenance(Utc::now()).await?;
    Ok(list(sourced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::drop_report_views;
    use crate::models::{Estado, Rol};
    use crate::test_support::{init_test_app, insert_equipment, insert_maintenance, TestContext};
    use actix_web::{http::StatusCode, test};
    use chrono::Duration;
    use serde_json::Value;

    #[actix_rt::test]
    async fn test_equipment_filter() {
        let blank = DetailQuery { equipo_id: Some("  ".into()) };
        assert_eq!(blank.equipment_filter().unwrap(), None);

        let valid = DetailQuery { equipo_id: Some("6F1C1E4E-8F7A-4F6E-9A59-0D9B1C3C2A11".into()) };
        assert_eq!(
            valid.equipment_filter().unwrap().as_deref(),
            Some("6f1c1e4e-8f7a-4f6e-9a59-0d9b1c3c2a11")
        );

        let injected = DetailQuery { equipo_id: Some("1' OR '1'='1".into()) };
        assert!(injected.equipment_filter().is_err());
    }

    #[actix_rt::test]
    async fn test_stats_endpoints_with_views() {
        let ctx = TestContext::new(true).await;
        let (tecnico, token) = ctx.signed_in("tecnico@hospital.com", Rol::Tecnico).await;
        let equipo = insert_equipment(&ctx.pool, "Monitor", Estado::Activo).await;
        let now = Utc::now();
        insert_maintenance(&ctx.pool, &equipo, &tecnico.id, now - Duration::days(1), Some(now + Duration::days(3)), Estado::Activo).await;
        let app = init_test_app!(ctx);

        let req = test::TestRequest::get()
            .uri("/api/stats")
            .insert_header(("Authorization", token.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get(REPORT_SOURCE_HEADER).unwrap(), "optimized");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["equipos_activos"], 1);
        assert_eq!(body["data"]["mantenimientos_pendientes"], 1);
        assert!(body.get("count").is_none());

        let req = test::TestRequest::get()
            .uri(&format!("/api/stats/mantenimientos-detalle?equipoId={}", equipo))
            .insert_header(("Authorization", token.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["equipo_nombre"], "Monitor");

        let req = test::TestRequest::get()
            .uri("/api/stats/equipos-pendientes")
            .insert_header(("Authorization", token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
    }

    #[actix_rt::test]
    async fn test_missing_views_still_return_200() {
        let ctx = TestContext::new(true).await;
        let (_, token) = ctx.signed_in("admin@hospital.com", Rol::Admin).await;
        insert_equipment(&ctx.pool, "Monitor", Estado::Activo).await;
        drop_report_views(&ctx.pool).await.unwrap();
        let app = init_test_app!(ctx);

        for path in ["/api/stats", "/api/stats/equipos-summary", "/api/stats/mantenimientos-detalle", "/api/stats/equipos-pendientes"] {
            let req = test::TestRequest::get()
                .uri(path)
                .insert_header(("Authorization", token.clone()))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK, "{}", path);
            assert_eq!(resp.headers().get(REPORT_SOURCE_HEADER).unwrap(), "fallback");
        }

        let req = test::TestRequest::get().uri("/health/metrics").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["reports_fallback_total"], 4);
    }

    #[actix_rt::test]
    async fn test_invalid_equipment_filter_is_rejected() {
        let ctx = TestContext::new(true).await;
        let (_, token) = ctx.signed_in("admin@hospital.com", Rol::Admin).await;
        let app = init_test_app!(ctx);

        let req = test::TestRequest::get()
            .uri("/api/stats/mantenimientos-detalle?equipoId=abc")
            .insert_header(("Authorization", token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
