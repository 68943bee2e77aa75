use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Atributo del destinatario contra el que compara un filtro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Tag,
    Code,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Tag => "tag",
            FilterKind::Code => "code",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "tag" => Some(FilterKind::Tag),
            "code" => Some(FilterKind::Code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriterion {
    pub id: String,
    pub campaign_id: String,
    pub kind: FilterKind,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignRecord {
    /// El reloj local del destinatario (UTC + offset) cae dentro de [start, end].
    pub fn accepts_local_time(&self, now: DateTime<Utc>, utc_offset: i32) -> bool {
        let local = now + Duration::hours(i64::from(utc_offset));
        self.start_at <= local && local <= self.end_at
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_at < now
    }
}

/// Campaña junto con sus filtros, tal como se devuelve por la API.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignResponse {
    #[serde(flatten)]
    pub campaign: CampaignRecord,
    pub filters: Vec<FilterCriterion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterRequest {
    pub kind: FilterKind,
    pub value: String,
}

impl FilterRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.value.trim().is_empty() {
            return Err(ServiceError::invalid("filter value must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaignRequest {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub filters: Vec<FilterRequest>,
}

impl CreateCampaignRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_window(self.start_at, self.end_at)?;
        for f in &self.filters {
            f.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCampaignRequest {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub text: Option<String>,
}

impl UpdateCampaignRequest {
    /// Devuelve (start, end, text) resultantes de aplicar el parche.
    pub fn merge_with(
        self,
        current: &CampaignRecord,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>, String), ServiceError> {
        let start = self.start_at.unwrap_or(current.start_at);
        let end = self.end_at.unwrap_or(current.end_at);
        validate_window(start, end)?;
        Ok((start, end, self.text.unwrap_or_else(|| current.text.clone())))
    }
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ServiceError> {
    if end <= start {
        return Err(ServiceError::invalid("end_at must be after start_at"));
    }
    Ok(())
}
