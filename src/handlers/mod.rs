//! handlers/mod.rs
//! Handlers HTTP (clientes, campañas, estadísticas).

pub mod campaign_handler;
pub mod client_handler;

use actix_web::HttpResponse;
use serde_json::json;

use crate::errors::ServiceError;

/// Traduce un error de servicio a respuesta HTTP: 404 / 400 / 500.
pub fn error_response(context: &str, e: anyhow::Error) -> HttpResponse {
    match e.downcast_ref::<ServiceError>() {
        Some(ServiceError::NotFound { .. }) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": e.to_string()
        })),
        Some(ServiceError::Invalid(_)) => HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": e.to_string()
        })),
        None => {
            log::error!("({}) {:?}", context, e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Internal server error",
                "details": format!("{:?}", e)
            }))
        }
    }
}
