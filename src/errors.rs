//! errors.rs
//! Errores de dominio que viajan dentro de `anyhow::Error`.
//! Los handlers hacen `downcast_ref::<ServiceError>()` para elegir el status HTTP.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid request: {0}")]
    Invalid(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::Invalid(msg.into())
    }
}
