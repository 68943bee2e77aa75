use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Estado de un mensaje. Solo existe la transición pending -> sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
}

impl MessageStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(MessageStatus::Pending),
            "sent" => Some(MessageStatus::Sent),
            _ => None,
        }
    }
}

/// Obligación de envío de una campaña a un destinatario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub campaign_id: String,
    pub client_id: String,
    pub status: MessageStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Mensaje pendiente con los datos del destinatario necesarios para enviarlo.
#[derive(Debug, Clone)]
pub struct DispatchCandidate {
    pub message_id: String,
    pub client_id: String,
    pub phone: String,
    pub utc_offset: i32,
}

/// Cuerpo enviado al endpoint externo.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryPayload<'a> {
    pub id: &'a str,
    pub phone: &'a str,
    pub text: &'a str,
}

/// Resumen de una ejecución del loop de envío.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub attempts: u64,
    pub sent: u64,
    pub failed: u64,
}
