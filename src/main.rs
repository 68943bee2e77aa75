use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

use crate::config::app_config::AppConfig;
use crate::logger::init_logger;
use crate::services::audience_service::AudienceService;
use crate::services::campaign_service::CampaignService;
use crate::services::client_service::ClientService;
use crate::services::dispatch_service::DispatchService;
use crate::services::message_service::MessageService;
use crate::services::scheduler_service::SchedulerService;
use crate::services::statistics_service::StatisticsService;

mod app;
mod config;
mod errors;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

async fn setup_database(database_url: &str) -> anyhow::Result<Pool<Sqlite>> {
    // Crear carpeta "data" si la DB por defecto vive ahí
    if database_url.starts_with("sqlite:data/") {
        std::fs::create_dir_all("data")?;
    }

    log::info!("Conectando a SQLite en {}", database_url);

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let db_pool = Pool::<Sqlite>::connect_with(options).await?;

    sqlx::migrate!("./migrations").run(&db_pool).await?;
    Ok(db_pool)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = AppConfig::from_env().expect("Configuración inválida");

    let db_pool = setup_database(&config.database_url)
        .await
        .expect("No se pudo preparar la base de datos SQLite.");

    let client_service = ClientService::new(db_pool.clone());
    let campaign_service = CampaignService::new(db_pool.clone());
    let audience_service = AudienceService::new(db_pool.clone());
    let message_service = MessageService::new(db_pool.clone());
    let statistics_service = StatisticsService::new(db_pool.clone());

    let dispatch_service = DispatchService::new(
        campaign_service.clone(),
        message_service.clone(),
        config.dispatch.clone(),
    )
    .expect("No se pudo inicializar DispatchService");
    let scheduler = SchedulerService::new(campaign_service.clone(), dispatch_service);

    // Los timers no sobreviven a un reinicio
    if let Err(e) = scheduler.rearm_active().await {
        log::error!("No se pudieron re-programar campañas: {:?}", e);
    }

    log::info!(
        "Levantando servidor en {}:{}",
        config.bind_host,
        config.bind_port
    );
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(client_service.clone()))
            .app_data(web::Data::new(campaign_service.clone()))
            .app_data(web::Data::new(audience_service.clone()))
            .app_data(web::Data::new(message_service.clone()))
            .app_data(web::Data::new(statistics_service.clone()))
            .app_data(web::Data::new(scheduler.clone()))
            .configure(app::init_app)
    })
    .workers(1)
    .bind((config.bind_host.as_str(), config.bind_port))?
    .run()
    .await
}
