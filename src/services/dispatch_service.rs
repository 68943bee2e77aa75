//! services/dispatch_service.rs
//! Loop de envío de una campaña: seleccionar -> enviar -> actualizar,
//! hasta que no quede ningún mensaje elegible.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::{Client, StatusCode};

use crate::config::app_config::DispatchConfig;
use crate::models::campaign_model::CampaignRecord;
use crate::models::message_model::{DeliveryPayload, DispatchCandidate, DispatchSummary};
use crate::services::{campaign_service::CampaignService, message_service::MessageService};

#[derive(Clone)]
pub struct DispatchService {
    campaign_service: CampaignService,
    message_service: MessageService,
    config: DispatchConfig,
    http_client: Client,
}

impl DispatchService {
    pub fn new(
        campaign_service: CampaignService,
        message_service: MessageService,
        config: DispatchConfig,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("No se pudo construir el cliente HTTP de envíos")?;

        Ok(Self {
            campaign_service,
            message_service,
            config,
            http_client,
        })
    }

    /// Drena los mensajes elegibles de la campaña, un envío a la vez.
    ///
    /// La ventana se recalcula en cada vuelta: un mensaje que sale de su
    /// ventana queda `pending` para siempre y el loop termina cuando ya no
    /// hay candidatos.
    pub async fn run(&self, campaign_id: &str) -> Result<DispatchSummary> {
        log::info!("(dispatch::run) Iniciando envío de campaign={}", campaign_id);

        let mut summary = DispatchSummary::default();
        let mut previous: Option<String> = None;

        loop {
            // Texto y ventana pueden haber cambiado desde la vuelta anterior
            let Some(campaign) = self.campaign_service.find_campaign(campaign_id).await? else {
                log::info!(
                    "(dispatch::run) campaign={} ya no existe, se corta el loop",
                    campaign_id
                );
                break;
            };

            let candidates = self.message_service.pending_candidates(campaign_id).await?;
            let chosen = {
                let mut rng = rand::thread_rng();
                select_candidate(
                    &campaign,
                    &candidates,
                    previous.as_deref(),
                    Utc::now(),
                    &mut rng,
                )
                .cloned()
            };

            let Some(candidate) = chosen else {
                break;
            };

            summary.attempts += 1;
            match self.deliver(&candidate, &campaign.text).await {
                Ok(()) => {
                    if self
                        .message_service
                        .mark_sent(&candidate.message_id, Utc::now())
                        .await?
                    {
                        summary.sent += 1;
                        log::info!(
                            "(dispatch::run) message={} client={} enviado",
                            candidate.message_id,
                            candidate.client_id
                        );
                    } else {
                        // Lo borró una reconciliación mientras se enviaba
                        log::warn!(
                            "(dispatch::run) message={} entregado pero ya no estaba pendiente",
                            candidate.message_id
                        );
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    log::warn!(
                        "(dispatch::run) message={} client={} falló: {:?}",
                        candidate.message_id,
                        candidate.client_id,
                        e
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }

            previous = Some(candidate.client_id);
        }

        log::info!(
            "(dispatch::run) campaign={} terminado: intentos={} enviados={} fallidos={}",
            campaign_id,
            summary.attempts,
            summary.sent,
            summary.failed
        );
        Ok(summary)
    }

    /// POST `<base><message_id>` con bearer token. Éxito solo con 200.
    async fn deliver(&self, candidate: &DispatchCandidate, text: &str) -> Result<()> {
        let url = format!("{}{}", self.config.send_api_url, candidate.message_id);
        let payload = DeliveryPayload {
            id: &candidate.client_id,
            phone: &candidate.phone,
            text,
        };

        let resp = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.send_token)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Fallo al POST {}", url))?;

        if resp.status() != StatusCode::OK {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Endpoint respondió {}: {}", status, body));
        }
        Ok(())
    }
}

/// Elige al azar un pendiente cuyo reloj local cae en la ventana de la
/// campaña, evitando repetir al cliente del intento anterior.
pub fn select_candidate<'a, R: Rng + ?Sized>(
    campaign: &CampaignRecord,
    candidates: &'a [DispatchCandidate],
    previous_client: Option<&str>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<&'a DispatchCandidate> {
    if campaign.has_ended(now) {
        return None;
    }

    let eligible: Vec<&DispatchCandidate> = candidates
        .iter()
        .filter(|c| campaign.accepts_local_time(now, c.utc_offset))
        .filter(|c| previous_client != Some(c.client_id.as_str()))
        .collect();

    eligible.choose(rng).copied()
}
