//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod audience_service;
pub mod campaign_service;
pub mod client_service;
pub mod dispatch_service;
pub mod message_service;
pub mod scheduler_service;
pub mod statistics_service;
