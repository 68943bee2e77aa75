//! app.rs
use crate::handlers::{campaign_handler, client_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/clients")
                    .route("", web::post().to(client_handler::create_client_endpoint))
                    .route("", web::get().to(client_handler::list_clients_endpoint))
                    .route("/{id}", web::get().to(client_handler::get_client_endpoint))
                    .route("/{id}", web::put().to(client_handler::update_client_endpoint))
                    .route(
                        "/{id}",
                        web::delete().to(client_handler::delete_client_endpoint),
                    ),
            )
            .service(
                web::scope("/campaigns")
                    .route(
                        "",
                        web::post().to(campaign_handler::create_campaign_endpoint),
                    )
                    .route(
                        "",
                        web::get().to(campaign_handler::list_campaigns_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::get().to(campaign_handler::get_campaign_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::put().to(campaign_handler::update_campaign_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::delete().to(campaign_handler::delete_campaign_endpoint),
                    )
                    .route(
                        "/{id}/filters",
                        web::post().to(campaign_handler::add_filter_endpoint),
                    )
                    .route(
                        "/{id}/filters/{filter_id}",
                        web::put().to(campaign_handler::update_filter_endpoint),
                    )
                    .route(
                        "/{id}/filters/{filter_id}",
                        web::delete().to(campaign_handler::delete_filter_endpoint),
                    )
                    .route(
                        "/{id}/audience",
                        web::get().to(campaign_handler::campaign_audience_endpoint),
                    )
                    .route(
                        "/{id}/messages",
                        web::get().to(campaign_handler::campaign_messages_endpoint),
                    )
                    .route(
                        "/{id}/statistics",
                        web::get().to(campaign_handler::campaign_statistics_endpoint),
                    ),
            ),
    );
}
