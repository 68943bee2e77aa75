use serde::Serialize;

use crate::models::campaign_model::FilterCriterion;

#[derive(Debug, Clone, Serialize)]
pub struct CampaignStatistics {
    pub campaign_id: String,
    #[serde(rename = "sent")]
    pub sent_count: i64,
    #[serde(rename = "not_sent")]
    pub pending_count: i64,
    #[serde(rename = "total")]
    pub total_count: i64,
    /// Segundos entre el primer y el último envío exitoso.
    pub duration_seconds: i64,
    pub filters: Vec<FilterCriterion>,
}
