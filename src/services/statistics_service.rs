use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

use crate::errors::ServiceError;
use crate::models::statistics_model::CampaignStatistics;
use crate::services::campaign_service::{campaign_exists, fetch_filters};

#[derive(Clone, Debug)]
pub struct StatisticsService {
    db_pool: Pool<Sqlite>,
}

impl StatisticsService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        StatisticsService { db_pool }
    }

    /// Conteos por estado y segundos entre el primer y el último envío.
    pub async fn stats(&self, campaign_id: &str) -> Result<CampaignStatistics> {
        let mut conn = self.db_pool.acquire().await?;

        if !campaign_exists(&mut *conn, campaign_id).await? {
            return Err(ServiceError::not_found("campaign", campaign_id).into());
        }

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(CASE WHEN status = 'sent' THEN 1 END) AS sent,
                COUNT(CASE WHEN status = 'pending' THEN 1 END) AS pending,
                COUNT(*) AS total
            FROM messages
            WHERE campaign_id = ?1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&mut *conn)
        .await
        .context("Fallo al contar mensajes")?;

        let sent_times = sqlx::query(
            r#"
            SELECT sent_at
            FROM messages
            WHERE campaign_id = ?1
              AND status = 'sent'
              AND sent_at IS NOT NULL
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&mut *conn)
        .await
        .context("Fallo al leer tiempos de envío")?;

        let mut times = Vec::with_capacity(sent_times.len());
        for r in &sent_times {
            let raw: String = r.try_get("sent_at")?;
            times.push(raw.parse::<DateTime<Utc>>()?);
        }

        let filters = fetch_filters(&mut *conn, campaign_id).await?;

        Ok(CampaignStatistics {
            campaign_id: campaign_id.to_string(),
            sent_count: row.try_get("sent")?,
            pending_count: row.try_get("pending")?,
            total_count: row.try_get("total")?,
            duration_seconds: sending_duration_seconds(&times),
            filters,
        })
    }
}

/// Diferencia entre el envío más temprano y el más tardío; 0 con menos de dos.
pub fn sending_duration_seconds(sent_times: &[DateTime<Utc>]) -> i64 {
    let (Some(first), Some(last)) = (sent_times.iter().min(), sent_times.iter().max()) else {
        return 0;
    };
    (*last - *first).num_seconds()
}
