//! services/audience_service.rs
//! Resolución de audiencia: filtros -> conjunto de ids de clientes.

use std::collections::HashSet;

use anyhow::{Context, Result};
use sqlx::{Pool, Row, Sqlite, SqliteConnection};

use crate::models::campaign_model::{FilterCriterion, FilterKind};

#[derive(Clone, Debug)]
pub struct AudienceService {
    db_pool: Pool<Sqlite>,
}

impl AudienceService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        AudienceService { db_pool }
    }

    /// Unión de los clientes que cumplen cada filtro, sin duplicados.
    pub async fn resolve(&self, criteria: &[FilterCriterion]) -> Result<HashSet<String>> {
        let mut conn = self.db_pool.acquire().await?;
        resolve_audience(&mut *conn, criteria).await
    }
}

pub(crate) async fn resolve_audience(
    conn: &mut SqliteConnection,
    criteria: &[FilterCriterion],
) -> Result<HashSet<String>> {
    let mut audience = HashSet::new();
    for criterion in criteria {
        audience.extend(match_criterion(&mut *conn, criterion.kind, &criterion.value).await?);
    }
    Ok(audience)
}

/// Clientes cuyo atributo (`tag` o `code`) es exactamente `value`.
pub(crate) async fn match_criterion(
    conn: &mut SqliteConnection,
    kind: FilterKind,
    value: &str,
) -> Result<HashSet<String>> {
    let sql = match kind {
        FilterKind::Tag => "SELECT id FROM clients WHERE tag = ?1",
        FilterKind::Code => "SELECT id FROM clients WHERE code = ?1",
    };

    let rows = sqlx::query(sql)
        .bind(value)
        .fetch_all(&mut *conn)
        .await
        .with_context(|| format!("Fallo al resolver filtro {}={}", kind.as_str(), value))?;

    rows.iter()
        .map(|r| r.try_get::<String, _>("id").map_err(Into::into))
        .collect()
}
