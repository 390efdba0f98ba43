// src/routes.rs - HTTP route table shared by the server binary and the tests
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

use crate::auth::jwt_middleware;
use crate::{auth_handlers, equipment_handlers, maintenance_handlers, monitoring, stats, user_handlers};

pub fn configure(cfg: &mut web::ServiceConfig) {
    let auth_middleware = HttpAuthentication::bearer(jwt_middleware);

    cfg
        // Health check and metrics (no auth)
        .service(
            web::scope("/health")
                .route("", web::get().to(monitoring::health_check))
                .route("/ready", web::get().to(monitoring::readiness_check))
                .route("/metrics", web::get().to(monitoring::metrics_endpoint))
        )

        // Login is the only public API route
        .service(
            web::resource("/api/auth/login").route(web::post().to(auth_handlers::login))
        )

        // Protected API endpoints
        .service(
            web::scope("/api")
                .wrap(auth_middleware)
                .route("/auth/profile", web::get().to(auth_handlers::get_profile))

                .service(
                    web::scope("/stats")
                        .route("", web::get().to(stats::handlers::get_system_stats))
                        .route("/equipos-summary", web::get().to(stats::handlers::get_equipment_summary))
                        .route("/mantenimientos-detalle", web::get().to(stats::handlers::get_maintenance_detail))
                        .route("/equipos-pendientes", web::get().to(stats::handlers::get_pending_maintenance))
                )

                .service(
                    web::scope("/usuarios")
                        .route("", web::get().to(user_handlers::get_users))
                        .route("", web::post().to(user_handlers::create_user))
                        .route("/{id}", web::get().to(user_handlers::get_user))
                        .route("/{id}", web::put().to(user_handlers::update_user))
                        .route("/{id}", web::delete().to(user_handlers::delete_user))
                )

                .service(
                    web::scope("/equipos")
                        .route("", web::get().to(equipment_handlers::get_equipment_list))
                        .route("", web::post().to(equipment_handlers::create_equipment))
                        .route("/{id}", web::get().to(equipment_handlers::get_equipment))
                        .route("/{id}", web::put().to(equipment_handlers::update_equipment))
                        .route("/{id}", web::delete().to(equipment_handlers::delete_equipment))
                        .route("/{id}/mantenimientos", web::get().to(maintenance_handlers::get_equipment_maintenance))
                )

                .service(
                    web::scope("/mantenimientos")
                        .route("", web::post().to(maintenance_handlers::create_maintenance))
                        .route("/{id}", web::get().to(maintenance_handlers::get_maintenance))
                        .route("/{id}", web::put().to(maintenance_handlers::update_maintenance))
                        .route("/{id}", web::delete().to(maintenance_handlers::delete_maintenance))
                )
        );
}
