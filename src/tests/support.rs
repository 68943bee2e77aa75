//! tests/support.rs
//! Utilidades compartidas por los tests: DB en memoria y endpoint falso.

use std::str::FromStr;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::app_config::DispatchConfig;
use crate::models::campaign_model::{CampaignResponse, CreateCampaignRequest, FilterKind, FilterRequest};
use crate::models::client_model::{ClientRecord, CreateClientRequest};
use crate::services::{
    audience_service::AudienceService, campaign_service::CampaignService,
    client_service::ClientService, dispatch_service::DispatchService,
    message_service::MessageService, scheduler_service::SchedulerService,
    statistics_service::StatisticsService,
};

/// Pool de una sola conexión para que la DB en memoria no se pierda.
pub async fn test_pool() -> Pool<Sqlite> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("opciones sqlite")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect_with(options)
        .await
        .expect("No se pudo abrir sqlite en memoria");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Fallo en migraciones");
    pool
}

pub struct TestServices {
    pub clients: ClientService,
    pub campaigns: CampaignService,
    pub audience: AudienceService,
    pub messages: MessageService,
    pub statistics: StatisticsService,
    pub dispatch: DispatchService,
    pub scheduler: SchedulerService,
}

impl TestServices {
    pub async fn new(send_api_url: &str) -> Self {
        let pool = test_pool().await;
        let clients = ClientService::new(pool.clone());
        let campaigns = CampaignService::new(pool.clone());
        let audience = AudienceService::new(pool.clone());
        let messages = MessageService::new(pool.clone());
        let statistics = StatisticsService::new(pool.clone());
        let dispatch = DispatchService::new(
            campaigns.clone(),
            messages.clone(),
            dispatch_config(send_api_url),
        )
        .expect("DispatchService");
        let scheduler = SchedulerService::new(campaigns.clone(), dispatch.clone());

        TestServices {
            clients,
            campaigns,
            audience,
            messages,
            statistics,
            dispatch,
            scheduler,
        }
    }

    /// Servicios sin endpoint real (tests que no envían nada).
    pub async fn offline() -> Self {
        Self::new("http://127.0.0.1:9/send/").await
    }

    pub async fn client(&self, tag: Option<&str>, code: Option<&str>, utc_offset: i32) -> ClientRecord {
        self.clients
            .create_client(CreateClientRequest {
                phone: "79001234567".to_string(),
                code: code.map(str::to_string),
                tag: tag.map(str::to_string),
                utc_offset,
            })
            .await
            .expect("create_client")
    }

    /// Crea la campaña; el alta ya genera sus mensajes.
    pub async fn campaign(
        &self,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        filters: Vec<FilterRequest>,
    ) -> CampaignResponse {
        self.campaigns
            .create_campaign(CreateCampaignRequest {
                start_at,
                end_at,
                text: "Promo de prueba".to_string(),
                filters,
            })
            .await
            .expect("create_campaign")
    }
}

pub fn dispatch_config(send_api_url: &str) -> DispatchConfig {
    DispatchConfig {
        send_api_url: send_api_url.to_string(),
        send_token: "test-token".to_string(),
        request_timeout: Duration::from_secs(5),
        retry_delay: Duration::from_millis(20),
    }
}

pub fn tag(value: &str) -> FilterRequest {
    FilterRequest {
        kind: FilterKind::Tag,
        value: value.to_string(),
    }
}

pub fn code(value: &str) -> FilterRequest {
    FilterRequest {
        kind: FilterKind::Code,
        value: value.to_string(),
    }
}

/// Petición recibida por el endpoint falso.
#[derive(Debug, Clone)]
pub struct ReceivedDelivery {
    pub path: String,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

/// Endpoint de envío local que responde con un status configurable,
/// opcionalmente después de una demora.
pub struct FakeEndpoint {
    pub base_url: String,
    status: Arc<AtomicU16>,
    delay_ms: Arc<AtomicU64>,
    received: Arc<Mutex<Vec<ReceivedDelivery>>>,
    handle: ServerHandle,
}

impl FakeEndpoint {
    pub async fn start(status: u16) -> Self {
        let status = Arc::new(AtomicU16::new(status));
        let delay_ms = Arc::new(AtomicU64::new(0));
        let received: Arc<Mutex<Vec<ReceivedDelivery>>> = Arc::new(Mutex::new(Vec::new()));

        let status_srv = status.clone();
        let delay_srv = delay_ms.clone();
        let received_srv = received.clone();
        let server = HttpServer::new(move || {
            let status = status_srv.clone();
            let delay_ms = delay_srv.clone();
            let received = received_srv.clone();
            App::new().default_service(web::to(move |req: HttpRequest, body: web::Bytes| {
                let status = status.clone();
                let delay_ms = delay_ms.clone();
                let received = received.clone();
                async move {
                    let record = ReceivedDelivery {
                        path: req.path().to_string(),
                        authorization: req
                            .headers()
                            .get("Authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string),
                        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
                    };
                    received.lock().unwrap().push(record);
                    let delay = delay_ms.load(Ordering::SeqCst);
                    if delay > 0 {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    let code = StatusCode::from_u16(status.load(Ordering::SeqCst))
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    HttpResponse::build(code).finish()
                }
            }))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind endpoint falso");

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_rt::spawn(server);

        FakeEndpoint {
            base_url: format!("http://{}/send/", addr),
            status,
            delay_ms,
            received,
            handle,
        }
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    /// Demora antes de responder; la petición queda registrada al llegar.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<ReceivedDelivery> {
        self.received.lock().unwrap().clone()
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}
