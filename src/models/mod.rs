//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod campaign_model;
pub mod client_model;
pub mod message_model;
pub mod statistics_model;
