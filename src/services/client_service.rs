use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::client_model::{ClientRecord, CreateClientRequest, UpdateClientRequest};

#[derive(Clone, Debug)]
pub struct ClientService {
    db_pool: Pool<Sqlite>,
}

impl ClientService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        ClientService { db_pool }
    }

    pub async fn create_client(&self, req: CreateClientRequest) -> Result<ClientRecord> {
        req.validate()?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO clients (id, phone, code, tag, utc_offset, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(&req.phone)
        .bind(&req.code)
        .bind(&req.tag)
        .bind(req.utc_offset)
        .bind(now.to_rfc3339())
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar client")?;

        log::info!("(create_client) Cliente creado id={}", id);

        Ok(ClientRecord {
            id,
            phone: req.phone,
            code: req.code,
            tag: req.tag,
            utc_offset: req.utc_offset,
            created_at: now,
        })
    }

    pub async fn get_client(&self, id: &str) -> Result<ClientRecord> {
        let row = sqlx::query(
            r#"
            SELECT id, phone, code, tag, utc_offset, created_at
            FROM clients
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await
        .context("Fallo al consultar client")?
        .ok_or_else(|| ServiceError::not_found("client", id))?;

        client_from_row(&row)
    }

    pub async fn list_clients(&self) -> Result<Vec<ClientRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, phone, code, tag, utc_offset, created_at
            FROM clients
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        rows.iter().map(client_from_row).collect()
    }

    pub async fn update_client(&self, id: &str, req: UpdateClientRequest) -> Result<ClientRecord> {
        let current = self.get_client(id).await?;
        let merged = req.merge_into(&current)?;

        sqlx::query(
            r#"
            UPDATE clients
            SET phone = ?2,
                code = ?3,
                tag = ?4,
                utc_offset = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&merged.phone)
        .bind(&merged.code)
        .bind(&merged.tag)
        .bind(merged.utc_offset)
        .execute(&self.db_pool)
        .await
        .context("Fallo al actualizar client")?;

        self.get_client(id).await
    }

    /// Borra el cliente; sus mensajes caen en cascada.
    pub async fn delete_client(&self, id: &str) -> Result<()> {
        let res = sqlx::query("DELETE FROM clients WHERE id = ?1")
            .bind(id)
            .execute(&self.db_pool)
            .await
            .context("Fallo al borrar client")?;

        if res.rows_affected() == 0 {
            return Err(ServiceError::not_found("client", id).into());
        }
        Ok(())
    }
}

fn client_from_row(row: &SqliteRow) -> Result<ClientRecord> {
    let created_at: String = row.try_get("created_at")?;
    Ok(ClientRecord {
        id: row.try_get("id")?,
        phone: row.try_get("phone")?,
        code: row.try_get("code")?,
        tag: row.try_get("tag")?,
        utc_offset: row.try_get("utc_offset")?,
        created_at: created_at.parse()?,
    })
}
