//! services/scheduler_service.rs
//! Programación diferida del envío de cada campaña.
//!
//! Cada `arm` toma un epoch nuevo para la campaña y guarda el `start_at`
//! vigente. Al despertar, la tarea solo sigue si su epoch es el último y el
//! `start_at` persistido no cambió; si no, otra programación más nueva es la
//! dueña de la campaña y esta termina en silencio.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::models::campaign_model::CampaignRecord;
use crate::models::message_model::DispatchSummary;
use crate::services::{campaign_service::CampaignService, dispatch_service::DispatchService};

/// Resultado de una programación al despertar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmOutcome {
    Dispatched(DispatchSummary),
    /// Hubo un `arm` posterior o cambió el inicio de la campaña.
    Stale,
    /// La campaña fue borrada mientras se esperaba.
    Missing,
}

#[derive(Clone)]
pub struct SchedulerService {
    campaign_service: CampaignService,
    dispatch_service: DispatchService,
    epochs: Arc<Mutex<HashMap<String, u64>>>,
    run_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SchedulerService {
    pub fn new(campaign_service: CampaignService, dispatch_service: DispatchService) -> Self {
        Self {
            campaign_service,
            dispatch_service,
            epochs: Arc::new(Mutex::new(HashMap::new())),
            run_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Programa el envío para `campaign.start_at`. Si ya pasó, arranca ya.
    pub fn arm(&self, campaign: &CampaignRecord) -> JoinHandle<Result<ArmOutcome>> {
        let epoch = self.next_epoch(&campaign.id);
        let token = campaign.start_at;
        let campaign_id = campaign.id.clone();
        let scheduler = self.clone();

        log::info!(
            "(scheduler::arm) campaign={} epoch={} start_at={}",
            campaign_id,
            epoch,
            token
        );

        tokio::spawn(async move {
            let res = scheduler.wait_and_dispatch(&campaign_id, token, epoch).await;
            if let Err(e) = &res {
                log::error!(
                    "(scheduler::arm) Error en envío de campaign={}: {:?}",
                    campaign_id,
                    e
                );
            }
            res
        })
    }

    /// Re-programa todas las campañas que aún no terminaron (arranque del proceso).
    pub async fn rearm_active(&self) -> Result<usize> {
        let active = self.campaign_service.list_active_campaigns(Utc::now()).await?;
        for campaign in &active {
            self.arm(campaign);
        }
        log::info!(
            "(scheduler::rearm_active) {} campañas re-programadas",
            active.len()
        );
        Ok(active.len())
    }

    async fn wait_and_dispatch(
        &self,
        campaign_id: &str,
        token: DateTime<Utc>,
        epoch: u64,
    ) -> Result<ArmOutcome> {
        let now = Utc::now();
        if token > now {
            if let Ok(wait) = (token - now).to_std() {
                tokio::time::sleep(wait).await;
            }
        }

        // Un solo loop por campaña a la vez. Las verificaciones se hacen con el
        // lock tomado: mientras se espera un loop anterior puede llegar otro `arm`.
        let lock = self.run_lock(campaign_id);
        let _guard = lock.lock().await;

        match self.current_epoch(campaign_id) {
            Some(current) if current == epoch => {}
            current => {
                log::info!(
                    "(scheduler::wake) campaign={} epoch={} obsoleto, se descarta",
                    campaign_id,
                    epoch
                );
                // Sin epoch la campaña fue olvidada: no dejar el lock recreado
                if current.is_none() {
                    self.forget(campaign_id);
                }
                return Ok(ArmOutcome::Stale);
            }
        }

        let Some(campaign) = self.campaign_service.find_campaign(campaign_id).await? else {
            log::info!(
                "(scheduler::wake) campaign={} ya no existe, se descarta",
                campaign_id
            );
            self.forget(campaign_id);
            return Ok(ArmOutcome::Missing);
        };

        if campaign.start_at != token {
            log::info!(
                "(scheduler::wake) campaign={} start_at cambió ({} -> {}), se descarta",
                campaign_id,
                token,
                campaign.start_at
            );
            return Ok(ArmOutcome::Stale);
        }

        let summary = self.dispatch_service.run(campaign_id).await?;
        Ok(ArmOutcome::Dispatched(summary))
    }

    /// Suelta el estado en memoria de una campaña borrada.
    /// Una programación pendiente de esa campaña despierta como obsoleta.
    pub fn forget(&self, campaign_id: &str) {
        self.epochs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(campaign_id);
        self.run_locks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(campaign_id);
    }

    #[cfg(test)]
    pub(crate) fn is_tracking(&self, campaign_id: &str) -> bool {
        let tracked_epoch = self
            .epochs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(campaign_id);
        let tracked_lock = self
            .run_locks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(campaign_id);
        tracked_epoch || tracked_lock
    }

    fn next_epoch(&self, campaign_id: &str) -> u64 {
        let mut epochs = self.epochs.lock().unwrap_or_else(|p| p.into_inner());
        let epoch = epochs.entry(campaign_id.to_string()).or_insert(0);
        *epoch += 1;
        *epoch
    }

    fn current_epoch(&self, campaign_id: &str) -> Option<u64> {
        let epochs = self.epochs.lock().unwrap_or_else(|p| p.into_inner());
        epochs.get(campaign_id).copied()
    }

    fn run_lock(&self, campaign_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.run_locks.lock().unwrap_or_else(|p| p.into_inner());
        locks
            .entry(campaign_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
