//! config/app_config.rs
//! Configuración global leída del entorno (.env incluido vía dotenv).

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Parámetros del envío de mensajes al endpoint externo.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Base del endpoint; el id del mensaje se concatena tal cual.
    pub send_api_url: String,
    pub send_token: String,
    pub request_timeout: Duration,
    /// Pausa después de un envío fallido antes de volver a seleccionar.
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_host: String,
    pub bind_port: u16,
    pub dispatch: DispatchConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/campaigns.db".to_string());
        let bind_host = env::var("BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let bind_port = parse_var("BIND_PORT", 5022u16)?;

        let send_api_url =
            env::var("SEND_API_URL").map_err(|_| anyhow!("No se definió SEND_API_URL"))?;
        let send_token = env::var("SEND_TOKEN").unwrap_or_default();
        if send_token.is_empty() {
            log::warn!("(AppConfig::from_env) SEND_TOKEN vacío, los envíos irán sin token válido");
        }

        let timeout_secs = parse_var("SEND_TIMEOUT_SECS", 10u64)?;
        let retry_ms = parse_var("DISPATCH_RETRY_DELAY_MS", 1000u64)?;

        Ok(AppConfig {
            database_url,
            bind_host,
            bind_port,
            dispatch: DispatchConfig {
                send_api_url,
                send_token,
                request_timeout: Duration::from_secs(timeout_secs),
                retry_delay: Duration::from_millis(retry_ms),
            },
        })
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Valor inválido para {}: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}
