use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

pub const MIN_UTC_OFFSET: i32 = -12;
pub const MAX_UTC_OFFSET: i32 = 12;
const MAX_TAG_LEN: usize = 10;

/// Destinatario de campañas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub phone: String,
    pub code: Option<String>,
    pub tag: Option<String>,
    /// Desfase respecto a UTC en horas enteras (-12..=12).
    pub utc_offset: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientRequest {
    pub phone: String,
    pub code: Option<String>,
    pub tag: Option<String>,
    pub utc_offset: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClientRequest {
    pub phone: Option<String>,
    pub code: Option<String>,
    pub tag: Option<String>,
    pub utc_offset: Option<i32>,
}

impl CreateClientRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_phone(&self.phone)?;
        if let Some(code) = &self.code {
            validate_code(code)?;
        }
        if let Some(tag) = &self.tag {
            validate_tag(tag)?;
        }
        validate_offset(self.utc_offset)
    }
}

impl UpdateClientRequest {
    /// Aplica los campos presentes sobre el registro actual y valida el resultado.
    pub fn merge_into(self, current: &ClientRecord) -> Result<CreateClientRequest, ServiceError> {
        let merged = CreateClientRequest {
            phone: self.phone.unwrap_or_else(|| current.phone.clone()),
            code: self.code.or_else(|| current.code.clone()),
            tag: self.tag.or_else(|| current.tag.clone()),
            utc_offset: self.utc_offset.unwrap_or(current.utc_offset),
        };
        merged.validate()?;
        Ok(merged)
    }
}

fn validate_phone(phone: &str) -> Result<(), ServiceError> {
    if phone.len() != 11 || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::invalid("phone must have exactly 11 digits"));
    }
    if !phone.starts_with('7') {
        return Err(ServiceError::invalid("phone must start with 7"));
    }
    Ok(())
}

fn validate_code(code: &str) -> Result<(), ServiceError> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::invalid("code must have exactly 3 digits"));
    }
    Ok(())
}

fn validate_tag(tag: &str) -> Result<(), ServiceError> {
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(ServiceError::invalid(format!(
            "tag must have at most {} characters",
            MAX_TAG_LEN
        )));
    }
    Ok(())
}

fn validate_offset(offset: i32) -> Result<(), ServiceError> {
    if !(MIN_UTC_OFFSET..=MAX_UTC_OFFSET).contains(&offset) {
        return Err(ServiceError::invalid(format!(
            "utc_offset must be between {} and {}",
            MIN_UTC_OFFSET, MAX_UTC_OFFSET
        )));
    }
    Ok(())
}
