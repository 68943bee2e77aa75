//! handlers/client_handler.rs
use actix_web::{web, HttpResponse};

use crate::handlers::error_response;
use crate::models::client_model::{CreateClientRequest, UpdateClientRequest};
use crate::services::client_service::ClientService;

/// POST /api/clients
pub async fn create_client_endpoint(
    client_service: web::Data<ClientService>,
    body: web::Json<CreateClientRequest>,
) -> HttpResponse {
    match client_service.create_client(body.into_inner()).await {
        Ok(client) => HttpResponse::Created().json(client),
        Err(e) => error_response("create_client_endpoint", e),
    }
}

/// GET /api/clients
pub async fn list_clients_endpoint(client_service: web::Data<ClientService>) -> HttpResponse {
    match client_service.list_clients().await {
        Ok(clients) => HttpResponse::Ok().json(clients),
        Err(e) => error_response("list_clients_endpoint", e),
    }
}

/// GET /api/clients/{id}
pub async fn get_client_endpoint(
    client_service: web::Data<ClientService>,
    path: web::Path<String>,
) -> HttpResponse {
    match client_service.get_client(&path.into_inner()).await {
        Ok(client) => HttpResponse::Ok().json(client),
        Err(e) => error_response("get_client_endpoint", e),
    }
}

/// PUT /api/clients/{id}
pub async fn update_client_endpoint(
    client_service: web::Data<ClientService>,
    path: web::Path<String>,
    body: web::Json<UpdateClientRequest>,
) -> HttpResponse {
    match client_service
        .update_client(&path.into_inner(), body.into_inner())
        .await
    {
        Ok(client) => HttpResponse::Ok().json(client),
        Err(e) => error_response("update_client_endpoint", e),
    }
}

/// DELETE /api/clients/{id}
pub async fn delete_client_endpoint(
    client_service: web::Data<ClientService>,
    path: web::Path<String>,
) -> HttpResponse {
    match client_service.delete_client(&path.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response("delete_client_endpoint", e),
    }
}
