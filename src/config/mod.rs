//! config/mod.rs
//! Configuración de la aplicación (variables de entorno).

pub mod app_config;
