use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::campaign_model::{
    CampaignRecord, CampaignResponse, CreateCampaignRequest, FilterCriterion, FilterKind,
    FilterRequest, UpdateCampaignRequest,
};
use crate::services::message_service::reconcile_on;

/// Persistencia de campañas y de sus filtros.
/// La reconciliación de mensajes vive en `MessageService`; el alta la usa
/// dentro de su propia transacción.
#[derive(Clone, Debug)]
pub struct CampaignService {
    db_pool: Pool<Sqlite>,
}

impl CampaignService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        CampaignService { db_pool }
    }

    /// Inserta la campaña, sus filtros iniciales y los mensajes de su audiencia
    /// en una sola transacción: o queda todo o no queda nada.
    pub async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<CampaignResponse> {
        req.validate()?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db_pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO campaigns (id, start_at, end_at, text, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(req.start_at.to_rfc3339())
        .bind(req.end_at.to_rfc3339())
        .bind(&req.text)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Fallo al insertar campaign")?;

        let mut filters = Vec::with_capacity(req.filters.len());
        for f in &req.filters {
            filters.push(insert_filter(&mut *tx, &id, f).await?);
        }

        let outcome = reconcile_on(&mut *tx, &id).await?;

        tx.commit().await.context("Fallo al confirmar campaign")?;

        log::info!(
            "(create_campaign) Campaña creada id={} con {} filtros y {} mensajes",
            id,
            filters.len(),
            outcome.inserted
        );

        Ok(CampaignResponse {
            campaign: CampaignRecord {
                id,
                start_at: req.start_at,
                end_at: req.end_at,
                text: req.text,
                created_at: now,
                updated_at: now,
            },
            filters,
        })
    }

    pub async fn find_campaign(&self, id: &str) -> Result<Option<CampaignRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, start_at, end_at, text, created_at, updated_at
            FROM campaigns
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await
        .context("Fallo al consultar campaign")?;

        row.as_ref().map(campaign_from_row).transpose()
    }

    pub async fn get_campaign(&self, id: &str) -> Result<CampaignRecord> {
        self.find_campaign(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("campaign", id).into())
    }

    pub async fn get_campaign_with_filters(&self, id: &str) -> Result<CampaignResponse> {
        let campaign = self.get_campaign(id).await?;
        let filters = self.list_filters(id).await?;
        Ok(CampaignResponse { campaign, filters })
    }

    pub async fn list_campaigns(&self) -> Result<Vec<CampaignRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, start_at, end_at, text, created_at, updated_at
            FROM campaigns
            ORDER BY start_at
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        rows.iter().map(campaign_from_row).collect()
    }

    /// Campañas cuyo fin todavía no llegó (se re-programan al arrancar).
    pub async fn list_active_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<CampaignRecord>> {
        let all = self.list_campaigns().await?;
        Ok(all.into_iter().filter(|c| !c.has_ended(now)).collect())
    }

    pub async fn update_campaign(
        &self,
        id: &str,
        req: UpdateCampaignRequest,
    ) -> Result<CampaignRecord> {
        let current = self.get_campaign(id).await?;
        let (start_at, end_at, text) = req.merge_with(&current)?;

        sqlx::query(
            r#"
            UPDATE campaigns
            SET start_at = ?2,
                end_at = ?3,
                text = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(start_at.to_rfc3339())
        .bind(end_at.to_rfc3339())
        .bind(&text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db_pool)
        .await
        .context("Fallo al actualizar campaign")?;

        self.get_campaign(id).await
    }

    /// Borra la campaña; filtros y mensajes caen en cascada.
    pub async fn delete_campaign(&self, id: &str) -> Result<()> {
        let res = sqlx::query("DELETE FROM campaigns WHERE id = ?1")
            .bind(id)
            .execute(&self.db_pool)
            .await
            .context("Fallo al borrar campaign")?;

        if res.rows_affected() == 0 {
            return Err(ServiceError::not_found("campaign", id).into());
        }
        log::info!("(delete_campaign) Campaña {} borrada", id);
        Ok(())
    }

    pub async fn list_filters(&self, campaign_id: &str) -> Result<Vec<FilterCriterion>> {
        let mut conn = self.db_pool.acquire().await?;
        fetch_filters(&mut *conn, campaign_id).await
    }
}

pub(crate) async fn insert_filter(
    conn: &mut SqliteConnection,
    campaign_id: &str,
    req: &FilterRequest,
) -> Result<FilterCriterion> {
    req.validate()?;
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO campaign_filters (id, campaign_id, kind, value)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&id)
    .bind(campaign_id)
    .bind(req.kind.as_str())
    .bind(&req.value)
    .execute(&mut *conn)
    .await
    .context("Fallo al insertar filtro")?;

    Ok(FilterCriterion {
        id,
        campaign_id: campaign_id.to_string(),
        kind: req.kind,
        value: req.value.clone(),
    })
}

pub(crate) async fn fetch_filters(
    conn: &mut SqliteConnection,
    campaign_id: &str,
) -> Result<Vec<FilterCriterion>> {
    let rows = sqlx::query(
        r#"
        SELECT id, campaign_id, kind, value
        FROM campaign_filters
        WHERE campaign_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(campaign_id)
    .fetch_all(&mut *conn)
    .await
    .context("Fallo al listar filtros")?;

    rows.iter().map(filter_from_row).collect()
}

pub(crate) async fn campaign_exists(conn: &mut SqliteConnection, campaign_id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM campaigns WHERE id = ?1")
        .bind(campaign_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

fn campaign_from_row(row: &SqliteRow) -> Result<CampaignRecord> {
    let start_at: String = row.try_get("start_at")?;
    let end_at: String = row.try_get("end_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(CampaignRecord {
        id: row.try_get("id")?,
        start_at: start_at.parse()?,
        end_at: end_at.parse()?,
        text: row.try_get("text")?,
        created_at: created_at.parse()?,
        updated_at: updated_at.parse()?,
    })
}

fn filter_from_row(row: &SqliteRow) -> Result<FilterCriterion> {
    let kind: String = row.try_get("kind")?;
    Ok(FilterCriterion {
        id: row.try_get("id")?,
        campaign_id: row.try_get("campaign_id")?,
        kind: FilterKind::parse(&kind)
            .with_context(|| format!("Tipo de filtro desconocido en DB: {}", kind))?,
        value: row.try_get("value")?,
    })
}
