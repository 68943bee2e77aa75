//! services/message_service.rs
//! Mensajes por (campaña, cliente) y su reconciliación contra los filtros.
//!
//! Reglas que se mantienen en todo momento:
//! - a lo sumo un mensaje por (campaña, cliente) (`UNIQUE` en la tabla);
//! - solo se borran mensajes `pending`; un `sent` nunca se toca;
//! - `pending -> sent` es la única transición y es condicional en DB.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::campaign_model::{FilterCriterion, FilterRequest};
use crate::models::message_model::{DispatchCandidate, MessageRecord, MessageStatus};
use crate::services::audience_service::{match_criterion, resolve_audience};
use crate::services::campaign_service::{campaign_exists, fetch_filters, insert_filter};

/// Cuántos mensajes creó y borró una reconciliación.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub inserted: u64,
    pub deleted: u64,
}

#[derive(Clone, Debug)]
pub struct MessageService {
    db_pool: Pool<Sqlite>,
}

impl MessageService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        MessageService { db_pool }
    }

    /// Alinea los mensajes de la campaña con la audiencia de todos sus filtros.
    /// Llamarlo dos veces seguidas sin cambios en filtros no modifica nada.
    pub async fn reconcile(&self, campaign_id: &str) -> Result<ReconcileOutcome> {
        let mut tx = self.db_pool.begin().await?;
        let outcome = reconcile_on(&mut *tx, campaign_id).await?;
        tx.commit().await.context("Fallo al confirmar reconciliación")?;

        log::info!(
            "(reconcile) campaign={} insertados={} borrados={}",
            campaign_id,
            outcome.inserted,
            outcome.deleted
        );
        Ok(outcome)
    }

    /// Reemplaza un filtro en dos fases: primero borra los pendientes que solo
    /// dependían del filtro viejo, luego crea los de clientes nuevos.
    pub async fn replace_filter(
        &self,
        campaign_id: &str,
        filter_id: &str,
        req: FilterRequest,
    ) -> Result<(FilterCriterion, ReconcileOutcome)> {
        req.validate()?;
        let mut tx = self.db_pool.begin().await?;

        let filters = fetch_filters(&mut *tx, campaign_id).await?;
        let old = filters
            .iter()
            .find(|f| f.id == filter_id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("filter", filter_id))?;
        let others: Vec<FilterCriterion> =
            filters.into_iter().filter(|f| f.id != filter_id).collect();

        // Fase 1: clientes que solo alcanzaba el filtro viejo
        let matched_old = match_criterion(&mut *tx, old.kind, &old.value).await?;
        let kept_by_others = resolve_audience(&mut *tx, &others).await?;
        let mut deleted = 0;
        for client_id in matched_old.difference(&kept_by_others) {
            deleted += delete_pending_for_client(&mut *tx, campaign_id, client_id).await?;
        }

        sqlx::query(
            r#"
            UPDATE campaign_filters
            SET kind = ?2,
                value = ?3
            WHERE id = ?1
            "#,
        )
        .bind(filter_id)
        .bind(req.kind.as_str())
        .bind(&req.value)
        .execute(&mut *tx)
        .await
        .context("Fallo al actualizar filtro")?;

        // Fase 2: clientes del filtro nuevo que aún no tienen mensaje
        let matched_new = match_criterion(&mut *tx, req.kind, &req.value).await?;
        let targeted = targeted_clients(&mut *tx, campaign_id).await?;
        let now = Utc::now();
        let mut inserted = 0;
        for client_id in matched_new.difference(&targeted) {
            inserted += insert_pending(&mut *tx, campaign_id, client_id, now).await?;
        }

        tx.commit().await.context("Fallo al confirmar cambio de filtro")?;

        let outcome = ReconcileOutcome { inserted, deleted };
        log::info!(
            "(replace_filter) campaign={} filter={} {}={} -> {}={} insertados={} borrados={}",
            campaign_id,
            filter_id,
            old.kind.as_str(),
            old.value,
            req.kind.as_str(),
            req.value,
            inserted,
            deleted
        );

        let updated = FilterCriterion {
            id: old.id,
            campaign_id: old.campaign_id,
            kind: req.kind,
            value: req.value,
        };
        Ok((updated, outcome))
    }

    pub async fn add_filter(
        &self,
        campaign_id: &str,
        req: FilterRequest,
    ) -> Result<(FilterCriterion, ReconcileOutcome)> {
        let mut tx = self.db_pool.begin().await?;
        if !campaign_exists(&mut *tx, campaign_id).await? {
            return Err(ServiceError::not_found("campaign", campaign_id).into());
        }
        let filter = insert_filter(&mut *tx, campaign_id, &req).await?;
        let outcome = reconcile_on(&mut *tx, campaign_id).await?;
        tx.commit().await.context("Fallo al confirmar alta de filtro")?;

        log::info!(
            "(add_filter) campaign={} filter={} insertados={}",
            campaign_id,
            filter.id,
            outcome.inserted
        );
        Ok((filter, outcome))
    }

    pub async fn remove_filter(&self, campaign_id: &str, filter_id: &str) -> Result<ReconcileOutcome> {
        let mut tx = self.db_pool.begin().await?;
        let res = sqlx::query("DELETE FROM campaign_filters WHERE id = ?1 AND campaign_id = ?2")
            .bind(filter_id)
            .bind(campaign_id)
            .execute(&mut *tx)
            .await
            .context("Fallo al borrar filtro")?;
        if res.rows_affected() == 0 {
            return Err(ServiceError::not_found("filter", filter_id).into());
        }
        let outcome = reconcile_on(&mut *tx, campaign_id).await?;
        tx.commit().await.context("Fallo al confirmar baja de filtro")?;

        log::info!(
            "(remove_filter) campaign={} filter={} borrados={}",
            campaign_id,
            filter_id,
            outcome.deleted
        );
        Ok(outcome)
    }

    pub async fn list_messages(&self, campaign_id: &str) -> Result<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, campaign_id, client_id, status, sent_at, created_at
            FROM messages
            WHERE campaign_id = ?1
            ORDER BY id
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar mensajes")?;

        rows.iter().map(message_from_row).collect()
    }

    /// Mensajes pendientes de la campaña con los datos de su cliente.
    pub async fn pending_candidates(&self, campaign_id: &str) -> Result<Vec<DispatchCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id AS message_id, c.id AS client_id, c.phone, c.utc_offset
            FROM messages m
            JOIN clients c ON c.id = m.client_id
            WHERE m.campaign_id = ?1
              AND m.status = 'pending'
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar mensajes pendientes")?;

        let mut result = Vec::with_capacity(rows.len());
        for r in rows {
            result.push(DispatchCandidate {
                message_id: r.try_get("message_id")?,
                client_id: r.try_get("client_id")?,
                phone: r.try_get("phone")?,
                utc_offset: r.try_get("utc_offset")?,
            });
        }
        Ok(result)
    }

    /// Marca el mensaje como enviado solo si sigue `pending`.
    /// Devuelve false si ya no existe o ya estaba enviado.
    pub async fn mark_sent(&self, message_id: &str, sent_at: DateTime<Utc>) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE messages
            SET status = 'sent',
                sent_at = ?2
            WHERE id = ?1
              AND status = 'pending'
            "#,
        )
        .bind(message_id)
        .bind(sent_at.to_rfc3339())
        .execute(&self.db_pool)
        .await
        .context("Fallo al marcar mensaje como enviado")?;

        Ok(res.rows_affected() == 1)
    }
}

/// Reconciliación completa sobre una conexión (normalmente una transacción).
pub(crate) async fn reconcile_on(
    conn: &mut SqliteConnection,
    campaign_id: &str,
) -> Result<ReconcileOutcome> {
    if !campaign_exists(&mut *conn, campaign_id).await? {
        return Err(ServiceError::not_found("campaign", campaign_id).into());
    }

    let filters = fetch_filters(&mut *conn, campaign_id).await?;
    let audience = resolve_audience(&mut *conn, &filters).await?;
    let targeted = targeted_clients(&mut *conn, campaign_id).await?;

    let now = Utc::now();
    let mut outcome = ReconcileOutcome::default();

    for client_id in audience.difference(&targeted) {
        outcome.inserted += insert_pending(&mut *conn, campaign_id, client_id, now).await?;
    }
    for client_id in targeted.difference(&audience) {
        outcome.deleted += delete_pending_for_client(&mut *conn, campaign_id, client_id).await?;
    }

    Ok(outcome)
}

/// Clientes que ya tienen mensaje (pending o sent) en la campaña.
async fn targeted_clients(
    conn: &mut SqliteConnection,
    campaign_id: &str,
) -> Result<HashSet<String>> {
    let rows = sqlx::query("SELECT client_id FROM messages WHERE campaign_id = ?1")
        .bind(campaign_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|r| r.try_get::<String, _>("client_id").map_err(Into::into))
        .collect()
}

async fn insert_pending(
    conn: &mut SqliteConnection,
    campaign_id: &str,
    client_id: &str,
    now: DateTime<Utc>,
) -> Result<u64> {
    let res = sqlx::query(
        r#"
        INSERT OR IGNORE INTO messages (id, campaign_id, client_id, status, sent_at, created_at)
        VALUES (?1, ?2, ?3, 'pending', NULL, ?4)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(campaign_id)
    .bind(client_id)
    .bind(now.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Fallo al insertar mensaje")?;

    Ok(res.rows_affected())
}

/// Un mensaje ya enviado no se borra: el DELETE simplemente no lo alcanza.
async fn delete_pending_for_client(
    conn: &mut SqliteConnection,
    campaign_id: &str,
    client_id: &str,
) -> Result<u64> {
    let res = sqlx::query(
        r#"
        DELETE FROM messages
        WHERE campaign_id = ?1
          AND client_id = ?2
          AND status = 'pending'
        "#,
    )
    .bind(campaign_id)
    .bind(client_id)
    .execute(&mut *conn)
    .await
    .context("Fallo al borrar mensaje pendiente")?;

    if res.rows_affected() == 0 {
        log::debug!(
            "(delete_pending_for_client) campaign={} client={} sin pendiente (enviado o inexistente)",
            campaign_id,
            client_id
        );
    }
    Ok(res.rows_affected())
}

fn message_from_row(row: &SqliteRow) -> Result<MessageRecord> {
    let status: String = row.try_get("status")?;
    let sent_at: Option<String> = row.try_get("sent_at")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(MessageRecord {
        id: row.try_get("id")?,
        campaign_id: row.try_get("campaign_id")?,
        client_id: row.try_get("client_id")?,
        status: MessageStatus::parse(&status)
            .with_context(|| format!("Estado de mensaje desconocido en DB: {}", status))?,
        sent_at: sent_at.map(|s| s.parse::<DateTime<Utc>>()).transpose()?,
        created_at: created_at.parse()?,
    })
}
