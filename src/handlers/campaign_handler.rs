//! handlers/campaign_handler.rs
//! Endpoints de campañas: alta/edición, filtros y estadísticas.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::handlers::error_response;
use crate::models::campaign_model::{CreateCampaignRequest, FilterRequest, UpdateCampaignRequest};
use crate::services::{
    audience_service::AudienceService, campaign_service::CampaignService,
    message_service::MessageService, scheduler_service::SchedulerService,
    statistics_service::StatisticsService,
};

/// POST /api/campaigns
/// Crea la campaña con sus mensajes y programa el envío.
pub async fn create_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    scheduler: web::Data<SchedulerService>,
    body: web::Json<CreateCampaignRequest>,
) -> HttpResponse {
    let created = match campaign_service.create_campaign(body.into_inner()).await {
        Ok(c) => c,
        Err(e) => return error_response("create_campaign_endpoint", e),
    };

    scheduler.arm(&created.campaign);
    HttpResponse::Created().json(created)
}

/// GET /api/campaigns
pub async fn list_campaigns_endpoint(campaign_service: web::Data<CampaignService>) -> HttpResponse {
    match campaign_service.list_campaigns().await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => error_response("list_campaigns_endpoint", e),
    }
}

/// GET /api/campaigns/{id}
pub async fn get_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<String>,
) -> HttpResponse {
    match campaign_service
        .get_campaign_with_filters(&path.into_inner())
        .await
    {
        Ok(c) => HttpResponse::Ok().json(c),
        Err(e) => error_response("get_campaign_endpoint", e),
    }
}

/// PUT /api/campaigns/{id}
/// Si cambia el inicio se vuelve a programar; la programación vieja queda obsoleta.
pub async fn update_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    scheduler: web::Data<SchedulerService>,
    path: web::Path<String>,
    body: web::Json<UpdateCampaignRequest>,
) -> HttpResponse {
    let id = path.into_inner();

    let old = match campaign_service.get_campaign(&id).await {
        Ok(c) => c,
        Err(e) => return error_response("update_campaign_endpoint", e),
    };

    let updated = match campaign_service.update_campaign(&id, body.into_inner()).await {
        Ok(c) => c,
        Err(e) => return error_response("update_campaign_endpoint", e),
    };

    if updated.start_at != old.start_at {
        scheduler.arm(&updated);
    }

    match campaign_service.get_campaign_with_filters(&id).await {
        Ok(c) => HttpResponse::Ok().json(c),
        Err(e) => error_response("update_campaign_endpoint", e),
    }
}

/// DELETE /api/campaigns/{id}
pub async fn delete_campaign_endpoint(
    campaign_service: web::Data<CampaignService>,
    scheduler: web::Data<SchedulerService>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    match campaign_service.delete_campaign(&id).await {
        Ok(()) => {
            scheduler.forget(&id);
            HttpResponse::NoContent().finish()
        }
        Err(e) => error_response("delete_campaign_endpoint", e),
    }
}

/// POST /api/campaigns/{id}/filters
pub async fn add_filter_endpoint(
    message_service: web::Data<MessageService>,
    path: web::Path<String>,
    body: web::Json<FilterRequest>,
) -> HttpResponse {
    match message_service
        .add_filter(&path.into_inner(), body.into_inner())
        .await
    {
        Ok((filter, outcome)) => HttpResponse::Created().json(json!({
            "filter": filter,
            "inserted": outcome.inserted,
            "deleted": outcome.deleted
        })),
        Err(e) => error_response("add_filter_endpoint", e),
    }
}

/// PUT /api/campaigns/{id}/filters/{filter_id}
pub async fn update_filter_endpoint(
    message_service: web::Data<MessageService>,
    path: web::Path<(String, String)>,
    body: web::Json<FilterRequest>,
) -> HttpResponse {
    let (campaign_id, filter_id) = path.into_inner();
    match message_service
        .replace_filter(&campaign_id, &filter_id, body.into_inner())
        .await
    {
        Ok((filter, outcome)) => HttpResponse::Ok().json(json!({
            "filter": filter,
            "inserted": outcome.inserted,
            "deleted": outcome.deleted
        })),
        Err(e) => error_response("update_filter_endpoint", e),
    }
}

/// DELETE /api/campaigns/{id}/filters/{filter_id}
pub async fn delete_filter_endpoint(
    message_service: web::Data<MessageService>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (campaign_id, filter_id) = path.into_inner();
    match message_service.remove_filter(&campaign_id, &filter_id).await {
        Ok(outcome) => HttpResponse::Ok().json(json!({
            "inserted": outcome.inserted,
            "deleted": outcome.deleted
        })),
        Err(e) => error_response("delete_filter_endpoint", e),
    }
}

/// GET /api/campaigns/{id}/statistics
pub async fn campaign_statistics_endpoint(
    statistics_service: web::Data<StatisticsService>,
    path: web::Path<String>,
) -> HttpResponse {
    match statistics_service.stats(&path.into_inner()).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => error_response("campaign_statistics_endpoint", e),
    }
}

/// GET /api/campaigns/{id}/audience
/// Clientes que hoy cumplen los filtros de la campaña.
pub async fn campaign_audience_endpoint(
    campaign_service: web::Data<CampaignService>,
    audience_service: web::Data<AudienceService>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    let campaign = match campaign_service.get_campaign_with_filters(&id).await {
        Ok(c) => c,
        Err(e) => return error_response("campaign_audience_endpoint", e),
    };

    match audience_service.resolve(&campaign.filters).await {
        Ok(audience) => {
            let mut client_ids: Vec<String> = audience.into_iter().collect();
            client_ids.sort();
            HttpResponse::Ok().json(json!({
                "campaign_id": id,
                "count": client_ids.len(),
                "client_ids": client_ids
            }))
        }
        Err(e) => error_response("campaign_audience_endpoint", e),
    }
}

/// GET /api/campaigns/{id}/messages
pub async fn campaign_messages_endpoint(
    campaign_service: web::Data<CampaignService>,
    message_service: web::Data<MessageService>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    if let Err(e) = campaign_service.get_campaign(&id).await {
        return error_response("campaign_messages_endpoint", e);
    }
    match message_service.list_messages(&id).await {
        Ok(messages) => HttpResponse::Ok().json(messages),
        Err(e) => error_response("campaign_messages_endpoint", e),
    }
}
