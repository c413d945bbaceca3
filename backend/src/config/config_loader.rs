use std::str::FromStr;

use anyhow::{Context, Result};
use vtc_core::payments::stripe_client::{DEFAULT_API_BASE, DEFAULT_WEBHOOK_TOLERANCE_SECS};

use super::config_model::{BackendServer, Database, DotEnvyConfig, Stripe};

const DEFAULT_PORT: u16 = 4001;
const DEFAULT_BODY_LIMIT_MIB: u64 = 2;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup. Blank values count as unset; every
/// integration secret is optional and only disables its feature when missing.
pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    let backend_server = BackendServer {
        port: parse_or(var("SERVER_PORT"), "SERVER_PORT", DEFAULT_PORT)?,
        body_limit: parse_or(
            var("SERVER_BODY_LIMIT"),
            "SERVER_BODY_LIMIT",
            DEFAULT_BODY_LIMIT_MIB,
        )?,
        timeout: parse_or(var("SERVER_TIMEOUT"), "SERVER_TIMEOUT", DEFAULT_TIMEOUT_SECS)?,
    };

    let stripe = Stripe {
        secret_key: var("STRIPE_SECRET_KEY"),
        webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
        api_base: var("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        webhook_tolerance_secs: parse_or(
            var("STRIPE_WEBHOOK_TOLERANCE_SECS"),
            "STRIPE_WEBHOOK_TOLERANCE_SECS",
            DEFAULT_WEBHOOK_TOLERANCE_SECS,
        )?,
    };

    let database = Database {
        url: var("DATABASE_URL"),
    };

    Ok(DotEnvyConfig {
        backend_server,
        stripe,
        database,
    })
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}
